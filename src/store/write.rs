use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use shapefile::dbase::{FieldName, FieldValue, Record, TableWriterBuilder};

use crate::error::PrepError;
use crate::schema::{AttrValue, FieldKind};
use crate::store::{FeatureStore, Geometry};

impl FeatureStore {
    /// Persist the store as an ESRI shapefile (`.shp`/`.shx`/`.dbf`), plus a
    /// `.prj` sidecar when the CRS is one we can name in WKT. The collection
    /// must be geometrically homogeneous; shapefiles cannot mix shape types.
    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create dir {}", parent.display()))?;
        }

        let mut builder = TableWriterBuilder::new();
        for field in self.schema().fields() {
            let name = FieldName::try_from(field.name.as_str())
                .map_err(|e| PrepError::Format(format!("bad column name {:?}: {e:?}", field.name)))?;
            builder = match field.kind {
                FieldKind::Str => builder.add_character_field(name, 64),
                FieldKind::Int => builder.add_numeric_field(name, 20, 0),
                FieldKind::Float => builder.add_numeric_field(name, 24, 8),
            };
        }

        let mut writer = shapefile::Writer::from_path(path, builder)
            .map_err(|e| PrepError::Format(format!("failed to create {}: {e}", path.display())))?;

        for feature in self.iter() {
            let mut record = Record::default();
            for (field, value) in self.schema().fields().iter().zip(&feature.attrs) {
                record.insert(field.name.clone(), attr_to_field_value(value, field.kind));
            }
            match &feature.geometry {
                Geometry::Point(p) => {
                    writer.write_shape_and_record(&shapefile::Point::new(p.x(), p.y()), &record)
                }
                Geometry::Lines(ls) => {
                    writer.write_shape_and_record(&lines_to_shp(ls), &record)
                }
                Geometry::Polygons(mp) => {
                    writer.write_shape_and_record(&polygons_to_shp(mp), &record)
                }
            }
            .map_err(|e| PrepError::Format(format!("failed to write {}: {e}", path.display())))?;
        }

        match self.epsg() {
            Some(epsg) => match wkt_for_epsg(epsg) {
                Some(wkt) => {
                    fs::write(path.with_extension("prj"), wkt)
                        .with_context(|| format!("write .prj sidecar for {}", path.display()))?;
                }
                None => log::warn!(
                    "no WKT for EPSG:{epsg}; {} written without a .prj sidecar",
                    path.display()
                ),
            },
            None => log::warn!("store has no CRS tag; {} written without a .prj sidecar", path.display()),
        }

        log::debug!("wrote {} features to {}", self.len(), path.display());
        Ok(())
    }
}

fn attr_to_field_value(value: &AttrValue, kind: FieldKind) -> FieldValue {
    match value {
        AttrValue::Str(s) => FieldValue::Character(Some(s.clone())),
        AttrValue::Int(n) => FieldValue::Numeric(Some(*n as f64)),
        AttrValue::Float(n) => FieldValue::Numeric(Some(*n)),
        AttrValue::Null => match kind {
            FieldKind::Str => FieldValue::Character(None),
            FieldKind::Int | FieldKind::Float => FieldValue::Numeric(None),
        },
    }
}

fn lines_to_shp(ls: &geo::MultiLineString<f64>) -> shapefile::Polyline {
    shapefile::Polyline::with_parts(
        ls.0.iter()
            .map(|line| line.points().map(|p| shapefile::Point::new(p.x(), p.y())).collect())
            .collect(),
    )
}

/// Convert geo::MultiPolygon<f64> to shapefile::Polygon.
/// Shapefile ring ordering: exterior CW, then its holes CCW.
fn polygons_to_shp(mp: &geo::MultiPolygon<f64>) -> shapefile::Polygon {
    fn ensure_closed(pts: &mut Vec<shapefile::Point>) {
        if !pts.is_empty() {
            let (first, last) = (pts[0], pts[pts.len() - 1]);
            if first.x != last.x || first.y != last.y {
                pts.push(first);
            }
        }
    }

    fn signed_area(pts: &[shapefile::Point]) -> f64 {
        let mut a = 0.0;
        for w in pts.windows(2) {
            a += w[0].x * w[1].y - w[1].x * w[0].y;
        }
        a / 2.0
    }

    let mut rings: Vec<shapefile::PolygonRing<shapefile::Point>> = Vec::new();
    for poly in &mp.0 {
        let mut ext_pts: Vec<shapefile::Point> = poly
            .exterior()
            .points()
            .map(|c| shapefile::Point::new(c.x(), c.y()))
            .collect();
        ensure_closed(&mut ext_pts);
        if signed_area(&ext_pts) > 0.0 {
            ext_pts.reverse(); // make CW
        }
        rings.push(shapefile::PolygonRing::Outer(ext_pts));

        for hole in poly.interiors() {
            let mut hole_pts: Vec<shapefile::Point> =
                hole.points().map(|c| shapefile::Point::new(c.x(), c.y())).collect();
            ensure_closed(&mut hole_pts);
            if signed_area(&hole_pts) < 0.0 {
                hole_pts.reverse(); // make CCW
            }
            rings.push(shapefile::PolygonRing::Inner(hole_pts));
        }
    }

    shapefile::Polygon::with_rings(rings)
}

/// Minimal WKT for the coordinate systems this pipeline emits; the trailing
/// AUTHORITY entry names the full CRS for readers that sniff it back.
fn wkt_for_epsg(epsg: u32) -> Option<&'static str> {
    match epsg {
        4326 => Some(
            r#"GEOGCS["GCS_WGS_1984",DATUM["D_WGS_1984",SPHEROID["WGS_1984",6378137.0,298.257223563]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433],AUTHORITY["EPSG","4326"]]"#,
        ),
        4269 => Some(
            r#"GEOGCS["GCS_North_American_1983",DATUM["D_North_American_1983",SPHEROID["GRS_1980",6378137.0,298.257222101]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433],AUTHORITY["EPSG","4269"]]"#,
        ),
        // Wisconsin Transverse Mercator (NAD83/HARN)
        3071 => Some(
            r#"PROJCS["NAD_1983_HARN_Wisconsin_TM",GEOGCS["GCS_North_American_1983_HARN",DATUM["D_North_American_1983_HARN",SPHEROID["GRS_1980",6378137.0,298.257222101]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]],PROJECTION["Transverse_Mercator"],PARAMETER["False_Easting",520000.0],PARAMETER["False_Northing",-4480000.0],PARAMETER["Central_Meridian",-90.0],PARAMETER["Scale_Factor",0.9996],PARAMETER["Latitude_Of_Origin",0.0],UNIT["Meter",1.0],AUTHORITY["EPSG","3071"]]"#,
        ),
        // CONUS Albers Equal Area (NAD83)
        5070 => Some(
            r#"PROJCS["NAD_1983_Contiguous_USA_Albers",GEOGCS["GCS_North_American_1983",DATUM["D_North_American_1983",SPHEROID["GRS_1980",6378137.0,298.257222101]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]],PROJECTION["Albers"],PARAMETER["False_Easting",0.0],PARAMETER["False_Northing",0.0],PARAMETER["Central_Meridian",-96.0],PARAMETER["Standard_Parallel_1",29.5],PARAMETER["Standard_Parallel_2",45.5],PARAMETER["Latitude_Of_Origin",23.0],UNIT["Meter",1.0],AUTHORITY["EPSG","5070"]]"#,
        ),
        _ => None,
    }
}
