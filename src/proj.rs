use anyhow::{Context, Result};
use geo::Coord;
use proj4rs::{proj::Proj, transform::transform};

use crate::error::PrepError;
use crate::store::{Feature, FeatureStore};

/// PROJ.4 definition for the coordinate systems this pipeline handles:
/// the geographic systems the source hydrography ships in, plus the
/// projected systems the study area uses for metric work.
fn proj4_def(epsg: u32) -> Result<&'static str> {
    match epsg {
        // Geographic
        4326 => Ok("+proj=longlat +datum=WGS84 +no_defs +type=crs"),
        4269 => Ok("+proj=longlat +datum=NAD83 +no_defs +type=crs"),
        // Wisconsin Transverse Mercator (NAD83/HARN), meters
        3071 => Ok("+proj=tmerc +lat_0=0 +lon_0=-90 +k=0.9996 +x_0=520000 +y_0=-4480000 +datum=NAD83 +units=m +no_defs +type=crs"),
        // CONUS Albers Equal Area (NAD83), meters
        5070 => Ok("+proj=aea +lat_1=29.5 +lat_2=45.5 +lat_0=23 +lon_0=-96 +x_0=0 +y_0=0 +datum=NAD83 +units=m +no_defs +type=crs"),
        other => Err(PrepError::Projection(format!("no PROJ.4 definition for EPSG:{other}")).into()),
    }
}

/// Whether coordinates in this system are degrees (proj4rs wants radians).
#[inline]
fn is_geographic(epsg: u32) -> bool {
    matches!(epsg, 4326 | 4269)
}

impl FeatureStore {
    /// Returns a new store with every geometry transformed to `target_epsg`.
    /// Fails with a projection error if the source CRS is unset or either
    /// system is unknown.
    pub fn reproject(&self, target_epsg: u32) -> Result<FeatureStore> {
        let source_epsg = self.epsg().ok_or_else(|| {
            PrepError::Projection("source store has no CRS tag; cannot reproject".into())
        })?;

        if source_epsg == target_epsg {
            return Ok(self.clone());
        }

        let from = Proj::from_proj_string(proj4_def(source_epsg)?)
            .with_context(|| format!("failed to build source projection EPSG:{source_epsg}"))?;
        let to = Proj::from_proj_string(proj4_def(target_epsg)?)
            .with_context(|| format!("failed to build target projection EPSG:{target_epsg}"))?;

        let (deg_in, deg_out) = (is_geographic(source_epsg), is_geographic(target_epsg));

        let features = self
            .iter()
            .map(|feature| {
                let geometry = feature.geometry.try_map_coords(|coord: Coord<f64>| {
                    let mut point = if deg_in {
                        (coord.x.to_radians(), coord.y.to_radians(), 0.0)
                    } else {
                        (coord.x, coord.y, 0.0)
                    };
                    transform(&from, &to, &mut point).map_err(|e| {
                        PrepError::Projection(format!(
                            "transform EPSG:{source_epsg} -> EPSG:{target_epsg} failed: {e}"
                        ))
                    })?;
                    Ok::<_, PrepError>(if deg_out {
                        Coord { x: point.0.to_degrees(), y: point.1.to_degrees() }
                    } else {
                        Coord { x: point.0, y: point.1 }
                    })
                })?;
                Ok(Feature { geometry, attrs: feature.attrs.clone() })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(FeatureStore::from_parts(self.schema().clone(), Some(target_epsg), features))
    }
}
