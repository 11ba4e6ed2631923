use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use geo::MultiPolygon;

use crate::cli::{Cli, HarmonizeArgs};
use crate::clip::{assign_by_interior_point, clip_to_boundary};
use crate::error::PrepError;
use crate::pipeline::containers_from_store;
use crate::rules::ExclusionRules;
use crate::schema::{AttrValue, Field, FieldKind, Schema};
use crate::store::{self, FeatureStore, Geometry};
use crate::types::HucLevel;

/// Harmonize the raw hydrography into tagged base layers: one store per HUC
/// level plus lakes, rivers, and catchments, all in one CRS, clipped to the
/// region boundary, with HUC codes stamped on by centroid containment.
pub fn run(cli: &Cli, args: &HarmonizeArgs) -> Result<()> {
    let rules = match &args.rules {
        Some(path) => ExclusionRules::from_path(path)?,
        None => ExclusionRules::default(),
    };

    let boundary = load_boundary(&args.boundary, args.epsg)?;

    let mut huc8s = Vec::new();
    let mut huc10s = Vec::new();
    let mut huc12s = Vec::new();
    let mut lakes = Vec::new();
    let mut rivers = Vec::new();
    let mut catchments = Vec::new();

    for region_dir in watershed_dirs(&args.data_dir)? {
        let region = region_dir
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("region")
            .to_string();
        if cli.verbose > 0 {
            eprintln!("[harmonize] loading region {region}");
        }

        let load_region = |store: FeatureStore| -> Result<FeatureStore> {
            store
                .with_const_column(Field::new("region", FieldKind::Str), AttrValue::Str(region.clone()))?
                .reproject(args.epsg)
        };

        huc8s.push(load_region(load_coded(
            &region_dir.join("WBDHU8.shp"),
            &["huc8", "HUC8", "HUC_8"],
            "huc8",
        )?)?);
        huc10s.push(load_region(load_coded(
            &region_dir.join("WBDHU10.shp"),
            &["huc10", "HUC10", "HUC_10"],
            "huc10",
        )?)?);
        huc12s.push(load_region(load_coded(
            &region_dir.join("WBDHU12.shp"),
            &["huc12", "HUC12", "HUC_12"],
            "huc12",
        )?)?);

        let water_schema = Schema::new(vec![
            Field::new("COMID", FieldKind::Int),
            Field::new("FTYPE", FieldKind::Str),
        ])?;
        lakes.push(load_region(store::load(&region_dir.join("NHDWaterbody.shp"), &water_schema)?)?);
        rivers.push(load_region(store::load(&region_dir.join("NHDFlowline.shp"), &water_schema)?)?);

        catchments.push(load_region(load_coded_int(
            &region_dir.join("Catchment.shp"),
            &["GRIDCODE", "GridCode", "gridcode"],
            "gridcode",
        )?)?);
    }

    let huc8 = clip_to_boundary(&FeatureStore::concat(&huc8s)?, &boundary)?;
    let huc10 = clip_to_boundary(&FeatureStore::concat(&huc10s)?, &boundary)?;
    let huc12 = clip_to_boundary(&FeatureStore::concat(&huc12s)?, &boundary)?;
    let lakes = clip_to_boundary(&rules.apply(&FeatureStore::concat(&lakes)?), &boundary)?;
    let rivers = clip_to_boundary(&rules.apply(&FeatureStore::concat(&rivers)?), &boundary)?;
    let catchments = clip_to_boundary(&rules.apply(&FeatureStore::concat(&catchments)?), &boundary)?;

    // HUC containers for centroid tagging. Parent references are not needed
    // here; each level is queried independently.
    let huc8_containers = containers_from_store(&huc8, "huc8", HucLevel::Huc8, None)?;
    let huc10_containers = containers_from_store(&huc10, "huc10", HucLevel::Huc10, None)?;
    let huc12_containers = containers_from_store(&huc12, "huc12", HucLevel::Huc12, None)?;

    let tag_all = |store: &FeatureStore| -> Result<FeatureStore> {
        let tagged = assign_by_interior_point(store, &huc8_containers, HucLevel::Huc8)?;
        let tagged = assign_by_interior_point(&tagged, &huc10_containers, HucLevel::Huc10)?;
        assign_by_interior_point(&tagged, &huc12_containers, HucLevel::Huc12)
    };

    if cli.verbose > 0 {
        eprintln!("[harmonize] tagging lakes, rivers, and catchments with HUC codes");
    }
    let lakes = tag_all(&lakes)?;
    let rivers = tag_all(&rivers)?;
    let catchments = tag_all(&catchments)?;

    for (name, layer) in [
        ("huc8", &huc8),
        ("huc10", &huc10),
        ("huc12", &huc12),
        ("lakes", &lakes),
        ("rivers", &rivers),
        ("catchments", &catchments),
    ] {
        let path = args.out.join(format!("{name}.shp"));
        layer.write(&path).with_context(|| format!("persisting {name} layer"))?;
        if cli.verbose > 0 {
            eprintln!("[harmonize] {name}: {} features -> {}", layer.len(), path.display());
        }
    }

    println!("Harmonized base layers -> {}", args.out.display());
    Ok(())
}

/// Subdirectories of `data_dir` holding a WBDHU8 shapefile, sorted by name.
/// A flat layout (shapefiles directly in `data_dir`) is treated as one region.
fn watershed_dirs(data_dir: &Path) -> Result<Vec<PathBuf>> {
    if data_dir.join("WBDHU8.shp").exists() {
        return Ok(vec![data_dir.to_path_buf()]);
    }
    let mut dirs: Vec<PathBuf> = fs::read_dir(data_dir)
        .with_context(|| format!("reading {}", data_dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_dir() && path.join("WBDHU8.shp").exists())
        .collect();
    dirs.sort();
    if dirs.is_empty() {
        return Err(PrepError::Format(format!(
            "no watershed directories with WBDHU8.shp under {}",
            data_dir.display()
        ))
        .into());
    }
    Ok(dirs)
}

/// Load a layer keyed by a string code column whose DBF name varies by
/// source vintage, normalizing it to `canonical`.
fn load_coded(path: &Path, candidates: &[&str], canonical: &str) -> Result<FeatureStore> {
    let mut last_err = anyhow::anyhow!("no candidate column names given");
    for name in candidates {
        let schema = Schema::new(vec![Field::new(name, FieldKind::Str)])?;
        match store::load(path, &schema) {
            Ok(loaded) => return loaded.rename_column(name, canonical),
            Err(err) => last_err = err,
        }
    }
    Err(last_err).with_context(|| format!("no code column {candidates:?} in {}", path.display()))
}

/// Same, for integer-coded layers (catchment grid codes).
fn load_coded_int(path: &Path, candidates: &[&str], canonical: &str) -> Result<FeatureStore> {
    let mut last_err = anyhow::anyhow!("no candidate column names given");
    for name in candidates {
        let schema = Schema::new(vec![Field::new(name, FieldKind::Int)])?;
        match store::load(path, &schema) {
            Ok(loaded) => return loaded.rename_column(name, canonical),
            Err(err) => last_err = err,
        }
    }
    Err(last_err).with_context(|| format!("no code column {candidates:?} in {}", path.display()))
}

/// Load the region boundary and collapse it to one multipolygon in the
/// working CRS.
fn load_boundary(path: &Path, epsg: u32) -> Result<MultiPolygon<f64>> {
    let store = store::load(path, &Schema::empty())?.reproject(epsg)?;
    let mut polygons = Vec::new();
    for feature in store.iter() {
        match &feature.geometry {
            Geometry::Polygons(mp) => polygons.extend(mp.0.iter().cloned()),
            other => {
                return Err(PrepError::Geometry(format!(
                    "boundary {} contains a non-polygon feature: {other:?}",
                    path.display()
                ))
                .into())
            }
        }
    }
    if polygons.is_empty() {
        return Err(PrepError::Geometry(format!("boundary {} is empty", path.display())).into());
    }
    Ok(MultiPolygon(polygons))
}
