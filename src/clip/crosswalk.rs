use anyhow::Result;
use geo::{BoundingRect, Contains};
use rstar::{RTree, AABB};

use crate::clip::Container;
use crate::error::PrepError;
use crate::schema::{AttrValue, Field, FieldKind};
use crate::store::{Feature, FeatureStore, IndexedBounds};
use crate::types::HucLevel;

/// Assign each source feature to the container holding its interior point and
/// stamp the container's code under the level's tag column. The feature
/// geometry is kept whole (no clipping) — this is how lakes, rivers, and
/// catchments receive their HUC codes.
///
/// Features whose interior point falls outside every container are dropped
/// and excluded from all subsequent levels.
pub fn assign_by_interior_point(
    source: &FeatureStore,
    containers: &[Container],
    level: HucLevel,
) -> Result<FeatureStore> {
    let tree: RTree<IndexedBounds> = RTree::bulk_load(
        containers
            .iter()
            .enumerate()
            .filter_map(|(i, c)| c.polygon.bounding_rect().map(|r| IndexedBounds::new(i, r)))
            .collect(),
    );

    let out_schema = source.schema().with_field(Field::new(level.tag(), FieldKind::Str))?;
    let mut features = Vec::with_capacity(source.len());
    let mut dropped = 0usize;

    for (idx, feature) in source.iter().enumerate() {
        let point = feature.geometry.interior_point().ok_or_else(|| {
            PrepError::Geometry(format!("feature {idx} has no interior point (empty/degenerate)"))
        })?;

        // Query the container R-tree with a degenerate AABB at the point,
        // then pick the candidate that actually contains it.
        let envelope = AABB::from_corners([point.x(), point.y()], [point.x(), point.y()]);
        let hit = tree
            .locate_in_envelope_intersecting(&envelope)
            .map(|b| b.idx())
            .find(|&j| containers[j].polygon.contains(&point));

        match hit {
            Some(j) => {
                let mut attrs = feature.attrs.clone();
                attrs.push(AttrValue::Str(containers[j].code.as_str().to_string()));
                features.push(Feature { geometry: feature.geometry.clone(), attrs });
            }
            None => dropped += 1,
        }
    }

    if dropped > 0 {
        log::debug!("{} {} features fell outside every container", dropped, level.tag());
    }
    Ok(FeatureStore::from_parts(out_schema, source.epsg(), features))
}
