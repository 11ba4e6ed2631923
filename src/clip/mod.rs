mod crosswalk;

pub use crosswalk::assign_by_interior_point;

use anyhow::Result;
use geo::{BooleanOps, BoundingRect, Contains, MultiPolygon, Validation};
use rayon::prelude::*;
use rstar::AABB;

use crate::error::PrepError;
use crate::schema::{AttrValue, Field, FieldKind};
use crate::store::{Feature, FeatureStore, Geometry};
use crate::types::{HucCode, HucLevel};

/// One container polygon at a hierarchy level, with an optional back-reference
/// to its parent's code for candidate scoping.
#[derive(Debug, Clone)]
pub struct Container {
    pub code: HucCode,
    pub parent: Option<HucCode>,
    pub polygon: MultiPolygon<f64>,
}

impl Container {
    pub fn new(code: HucCode, parent: Option<HucCode>, polygon: MultiPolygon<f64>) -> Self {
        Self { code, parent, polygon }
    }
}

/// Clip every candidate source feature against every container at one level
/// and stamp the container's code onto the clipped result under the level's
/// tag column.
///
/// When `parent_tag` names a column, each container only considers features
/// whose value in that column equals the container's parent code. This keeps
/// the full hierarchy near-linear instead of O(features x all containers),
/// which is why levels run top-down.
///
/// A feature straddling several containers yields one fragment per container
/// it intersects; fragments are never merged or deduplicated. Empty
/// intersections are dropped silently.
pub fn clip_level(
    source: &FeatureStore,
    containers: &[Container],
    level: HucLevel,
    parent_tag: Option<&str>,
) -> Result<FeatureStore> {
    for container in containers {
        if container.polygon.0.is_empty() || !container.polygon.is_valid() {
            return Err(PrepError::Geometry(format!(
                "container {} has an empty or invalid polygon",
                container.code
            ))
            .into());
        }
    }

    let parent_col = match parent_tag {
        Some(tag) => Some(source.schema().index(tag).ok_or_else(|| {
            PrepError::Format(format!("source store has no parent tag column {tag:?}"))
        })?),
        None => None,
    };

    let out_schema = source.schema().with_field(Field::new(level.tag(), FieldKind::Str))?;
    let tree = source.bbox_tree();

    // Per-container clips are independent; fan out and concatenate once, in
    // container order, so the output is deterministic.
    let batches: Vec<Vec<Feature>> = containers
        .par_iter()
        .map(|container| {
            let Some(rect) = container.polygon.bounding_rect() else {
                return Ok(Vec::new());
            };
            let envelope = AABB::from_corners(rect.min().into(), rect.max().into());

            let mut fragments = Vec::new();
            let mut candidates: Vec<usize> =
                tree.locate_in_envelope_intersecting(&envelope).map(|b| b.idx()).collect();
            candidates.sort_unstable();

            for idx in candidates {
                let feature = &source.features()[idx];
                if let (Some(col), Some(parent)) = (parent_col, &container.parent) {
                    if feature.attrs[col].as_str() != Some(parent.as_str()) {
                        continue;
                    }
                }

                let Some(clipped) = clip_geometry(&feature.geometry, &container.polygon, idx)?
                else {
                    continue;
                };

                let mut attrs = feature.attrs.clone();
                attrs.push(AttrValue::Str(container.code.as_str().to_string()));
                fragments.push(Feature { geometry: clipped, attrs });
            }
            Ok(fragments)
        })
        .collect::<Result<_>>()?;

    let features: Vec<Feature> = batches.into_iter().flatten().collect();
    log::info!(
        "level {}: {} containers, {} source features -> {} fragments",
        level.tag(),
        containers.len(),
        source.len(),
        features.len()
    );
    Ok(FeatureStore::from_parts(out_schema, source.epsg(), features))
}

/// Intersection of one source geometry with a container polygon.
/// `None` when the intersection is empty (normal outcome, not an error).
fn clip_geometry(
    geometry: &Geometry,
    container: &MultiPolygon<f64>,
    idx: usize,
) -> Result<Option<Geometry>> {
    Ok(match geometry {
        Geometry::Point(p) => container.contains(p).then(|| Geometry::Point(*p)),
        Geometry::Lines(ls) => {
            let clipped = container.clip(ls, false);
            let nonempty = clipped.0.iter().any(|line| line.0.len() >= 2);
            nonempty.then(|| Geometry::Lines(clipped))
        }
        Geometry::Polygons(mp) => {
            if !mp.is_valid() {
                return Err(PrepError::Geometry(format!(
                    "source feature {idx} has an invalid polygon"
                ))
                .into());
            }
            let clipped = mp.intersection(container);
            (!clipped.0.is_empty()).then(|| Geometry::Polygons(clipped))
        }
    })
}

/// Clip every feature of a store to a single boundary polygon, keeping
/// attributes unchanged. Used to restrict layers to the region of interest
/// before any tagging happens.
pub fn clip_to_boundary(source: &FeatureStore, boundary: &MultiPolygon<f64>) -> Result<FeatureStore> {
    if boundary.0.is_empty() || !boundary.is_valid() {
        return Err(PrepError::Geometry("boundary polygon is empty or invalid".into()).into());
    }

    let mut out = FeatureStore::new(source.schema().clone(), source.epsg());
    for (idx, feature) in source.iter().enumerate() {
        if let Some(clipped) = clip_geometry(&feature.geometry, boundary, idx)? {
            out.push(Feature { geometry: clipped, attrs: feature.attrs.clone() })?;
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Schema;
    use approx::assert_relative_eq;
    use geo::{polygon, Area, Point};

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> MultiPolygon<f64> {
        MultiPolygon(vec![polygon![
            (x: x0, y: y0),
            (x: x1, y: y0),
            (x: x1, y: y1),
            (x: x0, y: y1),
        ]])
    }

    fn polygon_store(shapes: &[MultiPolygon<f64>]) -> FeatureStore {
        let schema = Schema::new(vec![Field::new("name", FieldKind::Str)]).unwrap();
        let mut store = FeatureStore::new(schema, Some(4326));
        for (i, shape) in shapes.iter().enumerate() {
            store
                .push(Feature {
                    geometry: Geometry::Polygons(shape.clone()),
                    attrs: vec![AttrValue::Str(format!("f{i}"))],
                })
                .unwrap();
        }
        store
    }

    fn total_area(store: &FeatureStore) -> f64 {
        store
            .iter()
            .map(|f| match &f.geometry {
                Geometry::Polygons(mp) => mp.unsigned_area(),
                _ => 0.0,
            })
            .sum()
    }

    #[test]
    fn straddling_feature_fragments_once_per_container() {
        // One 2x1 polygon straddling two unit containers.
        let source = polygon_store(&[rect(0.0, 0.0, 2.0, 1.0)]);
        let containers = vec![
            Container::new(HucCode::new(HucLevel::Huc8, "10000000"), None, rect(0., 0., 1., 1.)),
            Container::new(HucCode::new(HucLevel::Huc8, "20000000"), None, rect(1., 0., 2., 1.)),
        ];

        let out = clip_level(&source, &containers, HucLevel::Huc8, None).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out.attr(0, "huc8").unwrap().as_str(), Some("10000000"));
        assert_eq!(out.attr(1, "huc8").unwrap().as_str(), Some("20000000"));
        // Fragments partition the source area.
        assert_relative_eq!(total_area(&out), 2.0, epsilon = 1e-9);
        // Source attributes carry through to every fragment.
        assert_eq!(out.attr(0, "name").unwrap().as_str(), Some("f0"));
        assert_eq!(out.attr(1, "name").unwrap().as_str(), Some("f0"));
    }

    #[test]
    fn feature_outside_all_containers_yields_nothing() {
        let source = polygon_store(&[rect(10.0, 10.0, 11.0, 11.0)]);
        let containers = vec![Container::new(
            HucCode::new(HucLevel::Huc8, "10000000"),
            None,
            rect(0., 0., 1., 1.),
        )];
        let out = clip_level(&source, &containers, HucLevel::Huc8, None).unwrap();
        assert_eq!(out.len(), 0);
    }

    #[test]
    fn parent_tag_scopes_candidates() {
        // Two features already tagged with different huc8 parents, overlapping
        // the same huc10 container. Only the matching parent's feature clips.
        let schema = Schema::new(vec![
            Field::new("name", FieldKind::Str),
            Field::new("huc8", FieldKind::Str),
        ])
        .unwrap();
        let mut source = FeatureStore::new(schema, Some(4326));
        for (name, huc8) in [("a", "10000000"), ("b", "20000000")] {
            source
                .push(Feature {
                    geometry: Geometry::Polygons(rect(0., 0., 1., 1.)),
                    attrs: vec![AttrValue::Str(name.into()), AttrValue::Str(huc8.into())],
                })
                .unwrap();
        }

        let containers = vec![Container::new(
            HucCode::new(HucLevel::Huc10, "1000000001"),
            Some(HucCode::new(HucLevel::Huc8, "10000000")),
            rect(0., 0., 1., 1.),
        )];

        let out = clip_level(&source, &containers, HucLevel::Huc10, Some("huc8")).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out.attr(0, "name").unwrap().as_str(), Some("a"));
        assert_eq!(out.attr(0, "huc10").unwrap().as_str(), Some("1000000001"));
    }

    #[test]
    fn missing_parent_tag_column_is_a_format_error() {
        let source = polygon_store(&[rect(0., 0., 1., 1.)]);
        let containers = vec![Container::new(
            HucCode::new(HucLevel::Huc10, "1000000001"),
            None,
            rect(0., 0., 1., 1.),
        )];
        let err = clip_level(&source, &containers, HucLevel::Huc10, Some("huc8")).unwrap_err();
        assert!(matches!(err.downcast_ref::<PrepError>(), Some(PrepError::Format(_))));
    }

    #[test]
    fn empty_container_is_a_geometry_error() {
        let source = polygon_store(&[rect(0., 0., 1., 1.)]);
        let containers = vec![Container::new(
            HucCode::new(HucLevel::Huc8, "10000000"),
            None,
            MultiPolygon(vec![]),
        )];
        let err = clip_level(&source, &containers, HucLevel::Huc8, None).unwrap_err();
        assert!(matches!(err.downcast_ref::<PrepError>(), Some(PrepError::Geometry(_))));
    }

    #[test]
    fn clipping_is_idempotent() {
        let source = polygon_store(&[rect(0.0, 0.0, 2.0, 1.0), rect(0.5, 0.2, 0.8, 0.9)]);
        let containers = vec![
            Container::new(HucCode::new(HucLevel::Huc8, "10000000"), None, rect(0., 0., 1., 1.)),
            Container::new(HucCode::new(HucLevel::Huc8, "20000000"), None, rect(1., 0., 2., 1.)),
        ];

        let once = clip_level(&source, &containers, HucLevel::Huc8, None).unwrap();
        let twice = clip_level(&source, &containers, HucLevel::Huc8, None).unwrap();
        assert_eq!(once.len(), twice.len());
        for (a, b) in once.iter().zip(twice.iter()) {
            assert_eq!(a.attrs, b.attrs);
            assert_eq!(a.geometry, b.geometry);
        }
    }

    #[test]
    fn lines_and_points_clip_by_kind() {
        let schema = Schema::empty();
        let mut source = FeatureStore::new(schema, Some(4326));
        source
            .push(Feature {
                geometry: Geometry::Lines(geo::MultiLineString(vec![geo::LineString(vec![
                    geo::Coord { x: -0.5, y: 0.5 },
                    geo::Coord { x: 1.5, y: 0.5 },
                ])])),
                attrs: vec![],
            })
            .unwrap();
        source
            .push(Feature { geometry: Geometry::Point(Point::new(0.5, 0.5)), attrs: vec![] })
            .unwrap();
        source
            .push(Feature { geometry: Geometry::Point(Point::new(5.0, 5.0)), attrs: vec![] })
            .unwrap();

        let containers = vec![Container::new(
            HucCode::new(HucLevel::Huc8, "10000000"),
            None,
            rect(0., 0., 1., 1.),
        )];
        let out = clip_level(&source, &containers, HucLevel::Huc8, None).unwrap();

        // The crossing line survives truncated; the inside point survives;
        // the outside point is dropped.
        assert_eq!(out.len(), 2);
        match &out.features()[0].geometry {
            Geometry::Lines(ls) => {
                let len: f64 = ls.0.iter().map(|l| l.0.len() as f64).sum();
                assert!(len >= 2.0);
            }
            other => panic!("expected clipped line, got {other:?}"),
        }
    }

    #[test]
    fn boundary_clip_keeps_attrs_and_drops_outside() {
        let source = polygon_store(&[rect(0., 0., 2., 1.), rect(10., 10., 11., 11.)]);
        let boundary = rect(0., 0., 1., 1.);
        let out = clip_to_boundary(&source, &boundary).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out.attr(0, "name").unwrap().as_str(), Some("f0"));
        assert_relative_eq!(total_area(&out), 1.0, epsilon = 1e-9);
    }
}
