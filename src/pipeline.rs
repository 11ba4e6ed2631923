use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::clip::{clip_level, Container};
use crate::error::PrepError;
use crate::store::{FeatureStore, Geometry};
use crate::types::{HucCode, HucLevel};

/// Explicit run configuration; the driver holds no process-global state.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Directory receiving one persisted store per completed level.
    pub out_dir: PathBuf,
    /// CRS every store must be in before any spatial comparison.
    pub target_epsg: u32,
}

impl PipelineConfig {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self { out_dir: out_dir.into(), target_epsg: 4326 }
    }
}

/// One hierarchy level, ordered coarse to fine by the caller.
#[derive(Debug, Clone)]
pub struct HierarchyLevel {
    pub name: String,
    pub level: HucLevel,
    pub containers: Vec<Container>,
    /// Column of the previous level's tag, used to scope candidates.
    pub parent_tag: Option<String>,
}

/// Sequence the hierarchy levels, threading each level's tagged output into
/// the next. Each intermediate is persisted to `<out_dir>/<name>.shp` only
/// after its level completes in full; the final tagged collection (carrying
/// every level's tag column) is returned.
///
/// Any level failure aborts the whole run — downstream levels depend on
/// correctly tagged parent identifiers, and the inputs are static, so a
/// retry would reproduce the same failure.
pub fn run(
    config: &PipelineConfig,
    source: &FeatureStore,
    levels: &[HierarchyLevel],
) -> Result<FeatureStore> {
    let mut current = source
        .reproject(config.target_epsg)
        .context("harmonizing source CRS before assignment")?;

    for spec in levels {
        log::info!("assigning level {} ({} containers)", spec.name, spec.containers.len());
        current = clip_level(&current, &spec.containers, spec.level, spec.parent_tag.as_deref())
            .with_context(|| format!("assignment pipeline failed at level {:?}", spec.name))?;

        let out_path = config.out_dir.join(format!("{}.shp", spec.name));
        current
            .write(&out_path)
            .with_context(|| format!("persisting level {:?}", spec.name))?;
    }

    Ok(current)
}

/// Build level containers from a harmonized polygon store. Codes come from
/// `code_field`; parents are derived by prefix truncation for HUC levels,
/// or read from `parent_field` (a previously stamped tag column) when given.
pub fn containers_from_store(
    store: &FeatureStore,
    code_field: &str,
    level: HucLevel,
    parent_field: Option<&str>,
) -> Result<Vec<Container>> {
    let code_col = store
        .schema()
        .index(code_field)
        .ok_or_else(|| PrepError::Format(format!("missing code column {code_field:?}")))?;
    let parent_col = match parent_field {
        Some(name) => Some(store.schema().index(name).ok_or_else(|| {
            PrepError::Format(format!("missing parent column {name:?}"))
        })?),
        None => None,
    };

    let mut seen = ahash::AHashSet::with_capacity(store.len());
    let mut containers = Vec::with_capacity(store.len());

    for (idx, feature) in store.iter().enumerate() {
        let code_str = feature.attrs[code_col].as_str().map(str::to_string).or_else(|| {
            // Catchment grid codes are numeric in the source data.
            feature.attrs[code_col].as_i64().map(|n| n.to_string())
        });
        let Some(code_str) = code_str else {
            return Err(PrepError::Format(format!(
                "feature {idx}: column {code_field:?} is not a code value"
            ))
            .into());
        };
        if !seen.insert(code_str.clone()) {
            return Err(PrepError::Format(format!(
                "duplicate {} code {code_str:?}",
                level.tag()
            ))
            .into());
        }

        let polygon = match &feature.geometry {
            Geometry::Polygons(mp) => mp.clone(),
            other => {
                return Err(PrepError::Geometry(format!(
                    "container feature {idx} is not a polygon: {other:?}"
                ))
                .into())
            }
        };

        let code = HucCode::new(level, &code_str);
        let parent = match parent_col {
            Some(col) => feature.attrs[col]
                .as_str()
                .map(|s| HucCode::new(level.parent().unwrap_or(level), s)),
            None => level.parent().and_then(|p| code.to_parent(p)),
        };

        containers.push(Container::new(code, parent, polygon));
    }

    Ok(containers)
}
