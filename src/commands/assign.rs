use anyhow::{Context, Result};

use crate::cli::{AssignArgs, Cli};
use crate::pipeline::{self, containers_from_store, HierarchyLevel, PipelineConfig};
use crate::schema::{Field, FieldKind, Schema};
use crate::store::{self, FeatureStore};
use crate::types::HucLevel;

/// Run the hierarchical assignment pipeline: clip the source layer through
/// HUC8, HUC10, HUC12, and catchments, stamping each level's code onto the
/// fragments. Levels run top-down so each level's tag scopes the next.
pub fn run(cli: &Cli, args: &AssignArgs) -> Result<()> {
    let source_schema = Schema::new(vec![Field::new(&args.value_field, FieldKind::Float)])?;
    let mut source = store::load(&args.source, &source_schema)?;
    if args.drop_zero {
        let col = 0; // single-column schema
        let before = source.len();
        source = source.filter(|_, f| f.attrs[col].as_f64() != Some(0.0));
        if cli.verbose > 0 {
            eprintln!("[assign] dropped {} zero-valued features", before - source.len());
        }
    }

    let load_base = |name: &str, fields: Vec<Field>| -> Result<FeatureStore> {
        let path = args.base_dir.join(format!("{name}.shp"));
        store::load(&path, &Schema::new(fields)?)
            .with_context(|| format!("loading harmonized layer {name:?}"))?
            .reproject(args.epsg)
    };

    // HUC levels are keyed by their code column; catchments are keyed by
    // grid code, with the parent read from the stamped huc12 tag.
    let mut levels = Vec::new();
    for level in HucLevel::order() {
        let (layer, fields, code_field, parent_field) = match level {
            HucLevel::Catchment => (
                "catchments",
                vec![Field::new("gridcode", FieldKind::Int), Field::new("huc12", FieldKind::Str)],
                "gridcode",
                Some("huc12"),
            ),
            other => (other.tag(), vec![Field::new(other.tag(), FieldKind::Str)], other.tag(), None),
        };
        let base = load_base(layer, fields)?;
        levels.push(HierarchyLevel {
            name: format!("landcover_{}", level.tag()),
            level,
            containers: containers_from_store(&base, code_field, level, parent_field)?,
            parent_tag: level.parent().map(|p| p.tag().to_string()),
        });
    }

    let config = PipelineConfig { out_dir: args.out.clone(), target_epsg: args.epsg };
    let tagged = pipeline::run(&config, &source, &levels)?;

    println!(
        "Assigned {} fragments across {} levels -> {}",
        tagged.len(),
        levels.len(),
        args.out.display()
    );
    Ok(())
}
