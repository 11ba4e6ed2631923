// End-to-end assignment pipeline scenarios over synthetic hydrologic units:
// a HUC8 containing two HUC10s, land-cover polygons straddling and escaping
// the hierarchy, and persistence of every completed level.

use approx::assert_relative_eq;
use geo::{polygon, Area, MultiPolygon};

use hydroprep::{
    clip_level, run, AttrValue, Container, Feature, FeatureStore, Field, FieldKind, Geometry,
    HierarchyLevel, HucCode, HucLevel, PipelineConfig, Schema,
};

fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> MultiPolygon<f64> {
    MultiPolygon(vec![polygon![
        (x: x0, y: y0),
        (x: x1, y: y0),
        (x: x1, y: y1),
        (x: x0, y: y1),
    ]])
}

fn landcover(shapes: &[(f64, MultiPolygon<f64>)]) -> FeatureStore {
    let schema = Schema::new(vec![Field::new("raster_val", FieldKind::Float)]).unwrap();
    let mut store = FeatureStore::new(schema, Some(4326));
    for (value, shape) in shapes {
        store
            .push(Feature {
                geometry: Geometry::Polygons(shape.clone()),
                attrs: vec![AttrValue::Float(*value)],
            })
            .unwrap();
    }
    store
}

/// HUC8 "07090002" spans x in [0, 2]; its two HUC10 children split it at x=1.
fn two_level_hierarchy() -> Vec<HierarchyLevel> {
    vec![
        HierarchyLevel {
            name: "huc8".into(),
            level: HucLevel::Huc8,
            containers: vec![Container::new(
                HucCode::new(HucLevel::Huc8, "07090002"),
                None,
                rect(0., 0., 2., 1.),
            )],
            parent_tag: None,
        },
        HierarchyLevel {
            name: "huc10".into(),
            level: HucLevel::Huc10,
            containers: vec![
                Container::new(
                    HucCode::new(HucLevel::Huc10, "0709000205"),
                    Some(HucCode::new(HucLevel::Huc8, "07090002")),
                    rect(0., 0., 1., 1.),
                ),
                Container::new(
                    HucCode::new(HucLevel::Huc10, "0709000206"),
                    Some(HucCode::new(HucLevel::Huc8, "07090002")),
                    rect(1., 0., 2., 1.),
                ),
            ],
            parent_tag: Some("huc8".into()),
        },
    ]
}

fn area_of(store: &FeatureStore, idx: usize) -> f64 {
    match &store.features()[idx].geometry {
        Geometry::Polygons(mp) => mp.unsigned_area(),
        other => panic!("expected polygons, got {other:?}"),
    }
}

#[test]
fn straddling_polygon_partitions_into_two_tagged_fragments() {
    // One land-cover polygon straddling both HUC10s.
    let source = landcover(&[(4.0, rect(0.25, 0.25, 1.75, 0.75))]);
    let dir = tempfile::tempdir().unwrap();
    let config = PipelineConfig::new(dir.path());

    let out = run(&config, &source, &two_level_hierarchy()).unwrap();

    assert_eq!(out.len(), 2);
    let mut tags: Vec<(String, String)> = (0..2)
        .map(|i| {
            (
                out.attr(i, "huc8").unwrap().as_str().unwrap().to_string(),
                out.attr(i, "huc10").unwrap().as_str().unwrap().to_string(),
            )
        })
        .collect();
    tags.sort();
    assert_eq!(
        tags,
        vec![
            ("07090002".to_string(), "0709000205".to_string()),
            ("07090002".to_string(), "0709000206".to_string()),
        ]
    );

    // The two fragments partition the original polygon's intersection with
    // the HUC8 (which contains it entirely): 1.5 x 0.5.
    let total: f64 = area_of(&out, 0) + area_of(&out, 1);
    assert_relative_eq!(total, 0.75, epsilon = 1e-9);

    // Source attributes survive on every fragment.
    assert_eq!(out.attr(0, "raster_val").unwrap().as_f64(), Some(4.0));
    assert_eq!(out.attr(1, "raster_val").unwrap().as_f64(), Some(4.0));
}

#[test]
fn every_completed_level_is_persisted() {
    let source = landcover(&[(4.0, rect(0.25, 0.25, 1.75, 0.75))]);
    let dir = tempfile::tempdir().unwrap();
    let config = PipelineConfig::new(dir.path());

    run(&config, &source, &two_level_hierarchy()).unwrap();

    for name in ["huc8", "huc10"] {
        let path = dir.path().join(format!("{name}.shp"));
        assert!(path.exists(), "missing persisted level {name}");
        assert!(path.with_extension("dbf").exists());
    }
}

#[test]
fn feature_outside_the_hierarchy_never_reappears() {
    // Second polygon entirely outside the HUC8.
    let source = landcover(&[
        (4.0, rect(0.25, 0.25, 0.75, 0.75)),
        (9.0, rect(10.0, 10.0, 11.0, 11.0)),
    ]);
    let dir = tempfile::tempdir().unwrap();
    let config = PipelineConfig::new(dir.path());

    let out = run(&config, &source, &two_level_hierarchy()).unwrap();

    assert_eq!(out.len(), 1);
    assert_eq!(out.attr(0, "raster_val").unwrap().as_f64(), Some(4.0));
    assert_eq!(out.attr(0, "huc10").unwrap().as_str(), Some("0709000205"));
}

#[test]
fn containment_is_consistent_across_levels() {
    // Several land-cover polygons; every HUC10 fragment must carry the HUC8
    // tag that is the prefix of its HUC10 tag.
    let source = landcover(&[
        (1.0, rect(0.1, 0.1, 0.9, 0.9)),
        (2.0, rect(0.5, 0.0, 1.5, 1.0)),
        (3.0, rect(1.2, 0.3, 1.9, 0.8)),
    ]);
    let dir = tempfile::tempdir().unwrap();
    let config = PipelineConfig::new(dir.path());

    let out = run(&config, &source, &two_level_hierarchy()).unwrap();

    assert!(out.len() >= 4); // the middle polygon fragments into both HUC10s
    for i in 0..out.len() {
        let huc10 = out.attr(i, "huc10").unwrap().as_str().unwrap();
        let huc8 = out.attr(i, "huc8").unwrap().as_str().unwrap();
        assert_eq!(&huc10[..8], huc8, "fragment {i} tagged inconsistently");
    }
}

#[test]
fn failing_level_is_named_in_the_error() {
    let source = landcover(&[(4.0, rect(0.25, 0.25, 0.75, 0.75))]);
    let dir = tempfile::tempdir().unwrap();
    let config = PipelineConfig::new(dir.path());

    let mut levels = two_level_hierarchy();
    // Sabotage the second level with an empty container polygon.
    levels[1].containers[0].polygon = MultiPolygon(vec![]);

    let err = run(&config, &source, &levels).unwrap_err();
    let rendered = format!("{err:#}");
    assert!(rendered.contains("huc10"), "error does not name the level: {rendered}");

    // The run aborted: the completed first level exists, the failed one doesn't.
    assert!(dir.path().join("huc8.shp").exists());
    assert!(!dir.path().join("huc10.shp").exists());
}

#[test]
fn fragment_union_matches_direct_intersection() {
    // Union of a container's fragments equals the direct clip of all
    // candidates against that container.
    let source = landcover(&[
        (1.0, rect(0.0, 0.0, 2.0, 1.0)),
        (2.0, rect(0.4, 0.2, 0.6, 0.8)),
    ]);
    let container = Container::new(
        HucCode::new(HucLevel::Huc8, "07090002"),
        None,
        rect(0., 0., 1., 1.),
    );

    let out = clip_level(&source, &[container], HucLevel::Huc8, None).unwrap();
    assert_eq!(out.len(), 2);

    // Direct intersections: 1x1 for the big polygon, 0.2x0.6 for the small.
    assert_relative_eq!(area_of(&out, 0), 1.0, epsilon = 1e-9);
    assert_relative_eq!(area_of(&out, 1), 0.12, epsilon = 1e-9);
}
