//! Water-quality site preparation: merge monitoring-station locations with
//! total-phosphorus observation tables and map them to point features for
//! the hot-spot engine.

use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use polars::frame::DataFrame;
use polars::io::SerReader;
use polars::prelude::{CsvReader, DataFrameJoinOps, DataType};

use crate::error::PrepError;
use crate::schema::{AttrValue, Field, FieldKind, Schema};
use crate::store::{Feature, FeatureStore, Geometry};

/// Column joining stations to their observations (Water Quality Portal key).
pub const SITE_KEY: &str = "MonitoringLocationIdentifier";

/// Reads a CSV file from `path` into a Polars DataFrame.
pub fn read_csv(path: &Path) -> Result<DataFrame> {
    let file = File::open(path)
        .with_context(|| format!("failed to open CSV file: {}", path.display()))?;
    CsvReader::new(file)
        .finish()
        .with_context(|| format!("failed to read CSV from {}", path.display()))
}

/// Stack the observation tables and inner-join them onto the station table
/// by `MonitoringLocationIdentifier`. One station joins to many observations,
/// so the result has one row per observation with station columns attached.
pub fn join_observations(stations: &DataFrame, results: &[DataFrame]) -> Result<DataFrame> {
    let mut observations = results
        .first()
        .ok_or_else(|| PrepError::Format("no observation tables provided".into()))?
        .clone();
    for extra in &results[1..] {
        observations = observations
            .vstack(extra)
            .context("observation tables have incompatible columns")?;
    }

    stations
        .inner_join(&observations, [SITE_KEY], [SITE_KEY])
        .context("joining stations to observations")
}

/// Build a point store from a joined table: one point per row, carrying the
/// station identifier and the analysis field value. Rows with missing
/// coordinates or values are dropped.
pub fn to_point_store(
    df: &DataFrame,
    lon_col: &str,
    lat_col: &str,
    value_col: &str,
    epsg: u32,
) -> Result<FeatureStore> {
    let column_f64 = |name: &str| -> Result<Vec<Option<f64>>> {
        Ok(df
            .column(name)
            .map_err(|_| PrepError::Format(format!("missing column {name:?}")))?
            .cast(&DataType::Float64)
            .map_err(|_| PrepError::Format(format!("column {name:?} is not numeric")))?
            .f64()?
            .into_iter()
            .collect())
    };

    let ids: Vec<Option<String>> = df
        .column(SITE_KEY)
        .map_err(|_| PrepError::Format(format!("missing column {SITE_KEY:?}")))?
        .cast(&DataType::String)?
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect();
    let lons = column_f64(lon_col)?;
    let lats = column_f64(lat_col)?;
    let values = column_f64(value_col)?;

    let schema = Schema::new(vec![
        Field::new("site_id", FieldKind::Str),
        Field::new("value", FieldKind::Float),
    ])?;
    let mut store = FeatureStore::new(schema, Some(epsg));

    let mut skipped = 0usize;
    for i in 0..df.height() {
        match (&ids[i], lons[i], lats[i], values[i]) {
            (Some(id), Some(lon), Some(lat), Some(value)) => {
                store.push(Feature {
                    geometry: Geometry::Point(geo::Point::new(lon, lat)),
                    attrs: vec![AttrValue::Str(id.clone()), AttrValue::Float(value)],
                })?;
            }
            _ => skipped += 1,
        }
    }
    if skipped > 0 {
        log::warn!("{skipped} observation rows lacked coordinates or a value; dropped");
    }

    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::Column;

    fn stations() -> DataFrame {
        DataFrame::new(vec![
            Column::new(SITE_KEY.into(), &["WIDNR-133", "USGS-05427718"]),
            Column::new("LongitudeMeasure".into(), &[-89.40, -89.36]),
            Column::new("LatitudeMeasure".into(), &[43.08, 43.10]),
        ])
        .unwrap()
    }

    fn observations(values: &[f64], sites: &[&str]) -> DataFrame {
        DataFrame::new(vec![
            Column::new(SITE_KEY.into(), sites),
            Column::new("ResultMeasureValue".into(), values),
        ])
        .unwrap()
    }

    #[test]
    fn join_is_one_to_many() {
        let results = vec![
            observations(&[0.12, 0.31], &["WIDNR-133", "WIDNR-133"]),
            observations(&[0.08], &["USGS-05427718"]),
        ];
        let joined = join_observations(&stations(), &results).unwrap();
        assert_eq!(joined.height(), 3);
        assert!(joined.column("LongitudeMeasure").is_ok());
        assert!(joined.column("ResultMeasureValue").is_ok());
    }

    #[test]
    fn unmatched_observations_are_dropped_by_inner_join() {
        let results = vec![observations(&[0.5], &["NOWHERE-1"])];
        let joined = join_observations(&stations(), &results).unwrap();
        assert_eq!(joined.height(), 0);
    }

    #[test]
    fn point_store_carries_site_and_value() {
        let results = vec![observations(&[0.12], &["WIDNR-133"])];
        let joined = join_observations(&stations(), &results).unwrap();
        let store = to_point_store(
            &joined,
            "LongitudeMeasure",
            "LatitudeMeasure",
            "ResultMeasureValue",
            4326,
        )
        .unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.attr(0, "site_id").unwrap().as_str(), Some("WIDNR-133"));
        assert_eq!(store.attr(0, "value").unwrap().as_f64(), Some(0.12));
        assert_eq!(store.epsg(), Some(4326));
    }

    #[test]
    fn missing_value_column_is_a_format_error() {
        let joined = join_observations(&stations(), &[observations(&[0.1], &["WIDNR-133"])]).unwrap();
        let err =
            to_point_store(&joined, "LongitudeMeasure", "LatitudeMeasure", "NoSuch", 4326)
                .unwrap_err();
        assert!(matches!(err.downcast_ref::<PrepError>(), Some(PrepError::Format(_))));
    }
}
