use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use shapefile::dbase::{FieldValue, Record};
use shapefile::Shape;

use crate::error::PrepError;
use crate::schema::{AttrValue, FieldKind, Schema};
use crate::store::{Feature, FeatureStore, Geometry};

/// Read a shapefile into a store, taking only the columns named by `schema`
/// and validating their kinds. The CRS tag is sniffed from the `.prj`
/// sidecar when present.
pub fn load(path: &Path, schema: &Schema) -> Result<FeatureStore> {
    let mut reader = shapefile::Reader::from_path(path)
        .map_err(|e| PrepError::Format(format!("failed to open {}: {e}", path.display())))?;

    let epsg = epsg_from_prj(path);
    let mut store = FeatureStore::new(schema.clone(), epsg);

    for result in reader.iter_shapes_and_records() {
        let (shape, record) =
            result.map_err(|e| PrepError::Format(format!("{}: {e}", path.display())))?;
        let geometry = shape_to_geometry(shape)?;
        let attrs = schema
            .fields()
            .iter()
            .map(|field| attr_from_record(&record, &field.name, field.kind))
            .collect::<Result<Vec<_>>>()
            .with_context(|| format!("reading attributes from {}", path.display()))?;
        store.push(Feature { geometry, attrs })?;
    }

    log::debug!("loaded {} features from {}", store.len(), path.display());
    Ok(store)
}

/// Extract and coerce one DBF field. Missing fields and kind mismatches are
/// format errors; explicit DBF nulls become `AttrValue::Null`.
fn attr_from_record(record: &Record, name: &str, kind: FieldKind) -> Result<AttrValue> {
    let value = record
        .get(name)
        .ok_or_else(|| PrepError::Format(format!("missing attribute column: {name}")))?;

    let parsed = match (value, kind) {
        (FieldValue::Character(Some(s)), FieldKind::Str) => AttrValue::Str(s.trim().to_string()),
        (FieldValue::Character(None), _) => AttrValue::Null,
        (FieldValue::Numeric(Some(n)), FieldKind::Float) => AttrValue::Float(*n),
        (FieldValue::Numeric(Some(n)), FieldKind::Int) if n.fract() == 0.0 => {
            AttrValue::Int(*n as i64)
        }
        (FieldValue::Numeric(None), _) => AttrValue::Null,
        (FieldValue::Integer(n), FieldKind::Int) => AttrValue::Int(*n as i64),
        (FieldValue::Integer(n), FieldKind::Float) => AttrValue::Float(*n as f64),
        (FieldValue::Double(n), FieldKind::Float) => AttrValue::Float(*n),
        (FieldValue::Float(Some(n)), FieldKind::Float) => AttrValue::Float(*n as f64),
        (FieldValue::Float(None), _) => AttrValue::Null,
        (other, kind) => {
            return Err(PrepError::Format(format!(
                "column {name:?} expects {kind:?}, got {other:?}"
            ))
            .into())
        }
    };
    Ok(parsed)
}

/// Convert a shapefile shape to our geometry enum. Measured/3D variants are
/// flattened to 2D; unsupported shape kinds are a format error.
fn shape_to_geometry(shape: Shape) -> Result<Geometry> {
    Ok(match shape {
        Shape::Point(p) => Geometry::Point(geo::Point::new(p.x, p.y)),
        Shape::PointM(p) => Geometry::Point(geo::Point::new(p.x, p.y)),
        Shape::PointZ(p) => Geometry::Point(geo::Point::new(p.x, p.y)),
        Shape::Polyline(line) => Geometry::Lines(parts_to_geo(
            line.parts().iter().map(|part| part.iter().map(|p| (p.x, p.y))),
        )),
        Shape::PolylineM(line) => Geometry::Lines(parts_to_geo(
            line.parts().iter().map(|part| part.iter().map(|p| (p.x, p.y))),
        )),
        Shape::PolylineZ(line) => Geometry::Lines(parts_to_geo(
            line.parts().iter().map(|part| part.iter().map(|p| (p.x, p.y))),
        )),
        Shape::Polygon(polygon) => Geometry::Polygons(polygon_to_geo(&polygon)),
        other => {
            return Err(PrepError::Format(format!(
                "unsupported shape type: {}",
                other.shapetype()
            ))
            .into())
        }
    })
}

fn parts_to_geo<I, P>(parts: I) -> geo::MultiLineString<f64>
where
    I: Iterator<Item = P>,
    P: Iterator<Item = (f64, f64)>,
{
    geo::MultiLineString(
        parts
            .map(|part| geo::LineString(part.map(|(x, y)| geo::Coord { x, y }).collect()))
            .collect(),
    )
}

/// Convert shapefile::Polygon to geo::MultiPolygon<f64>.
/// Shapefile stores each exterior ring (CW) followed by its holes (CCW).
fn polygon_to_geo(p: &shapefile::Polygon) -> geo::MultiPolygon<f64> {
    fn ensure_closed(coords: &mut Vec<geo::Coord<f64>>) {
        if !coords.is_empty() && coords[0] != coords[coords.len() - 1] {
            coords.push(coords[0]);
        }
    }

    fn signed_area(pts: &[geo::Coord<f64>]) -> f64 {
        let mut a = 0.0;
        for w in pts.windows(2) {
            a += w[0].x * w[1].y - w[1].x * w[0].y;
        }
        a / 2.0
    }

    let mut polys: Vec<geo::Polygon<f64>> = Vec::new();
    let mut current_exterior: Option<geo::LineString<f64>> = None;
    let mut current_holes: Vec<geo::LineString<f64>> = Vec::new();

    for ring in p.rings() {
        let mut coords: Vec<geo::Coord<f64>> =
            ring.points().iter().map(|pt| geo::Coord { x: pt.x, y: pt.y }).collect();
        ensure_closed(&mut coords);
        let ls = geo::LineString(coords);
        let is_exterior = signed_area(&ls.0) < 0.0; // CW => exterior in shapefile

        if is_exterior {
            if let Some(ext) = current_exterior.take() {
                polys.push(geo::Polygon::new(ext, std::mem::take(&mut current_holes)));
            }
            current_exterior = Some(ls);
        } else {
            current_holes.push(ls);
        }
    }
    if let Some(ext) = current_exterior {
        polys.push(geo::Polygon::new(ext, current_holes));
    }

    geo::MultiPolygon(polys)
}

/// Best-effort EPSG from the `.prj` WKT sidecar. `None` when the sidecar is
/// absent or unrecognized.
pub fn epsg_from_prj(shp_path: &Path) -> Option<u32> {
    let prj_path = shp_path.with_extension("prj");
    let wkt = fs::read_to_string(prj_path).ok()?;
    epsg_from_wkt(&wkt)
}

/// Prefers an explicit EPSG authority code; falls back to datum keywords
/// only for geographic (`GEOGCS`) roots. A `PROJCS` without an authority
/// stays `None` — a projected file must not be mistaken for degrees.
fn epsg_from_wkt(wkt: &str) -> Option<u32> {
    if let Some(code) = last_epsg_authority(wkt) {
        return Some(code);
    }
    if !wkt.trim_start().starts_with("GEOGCS") {
        return None;
    }
    if wkt.contains("NAD_1983") || wkt.contains("NAD83") {
        return Some(4269);
    }
    if wkt.contains("WGS_1984") || wkt.contains("WGS 84") || wkt.contains("WGS84") {
        return Some(4326);
    }
    None
}

/// Last `AUTHORITY["EPSG","<code>"]` in the WKT names the full CRS.
fn last_epsg_authority(wkt: &str) -> Option<u32> {
    let mut code = None;
    let mut rest = wkt;
    while let Some(pos) = rest.find("\"EPSG\"") {
        rest = &rest[pos + "\"EPSG\"".len()..];
        let digits: String = rest
            .chars()
            .skip_while(|c| !c.is_ascii_digit())
            .take_while(|c| c.is_ascii_digit())
            .collect();
        if let Ok(parsed) = digits.parse() {
            code = Some(parsed);
        }
    }
    code
}
