//! Hot-spot statistics over monitoring-site point features.
//!
//! The licensed desktop toolbox that produced the study's published maps is
//! reached through the [`HotSpotEngine`] seam; [`GiStarEngine`] is a local
//! Getis-Ord Gi* implementation with a fixed distance band for environments
//! without that toolbox.

use anyhow::Result;

use crate::error::PrepError;
use crate::schema::{AttrValue, Field, FieldKind};
use crate::store::{Feature, FeatureStore, Geometry};

#[derive(Debug, Clone)]
pub struct HotSpotOptions {
    /// Fixed distance band, in the store's CRS units. Neighbors at or within
    /// this distance get unit weight.
    pub distance_band: f64,
}

/// Per-feature cluster statistic.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HotSpotStat {
    pub z_score: f64,
    pub p_value: f64,
}

/// Seam for the spatial autocorrelation engine. Implementations receive point
/// features and an analysis field and return one statistic per feature.
pub trait HotSpotEngine {
    fn compute(
        &self,
        features: &FeatureStore,
        field: &str,
        options: &HotSpotOptions,
    ) -> Result<Vec<HotSpotStat>>;
}

/// Getis-Ord Gi* with binary weights inside a fixed distance band (the focal
/// feature counts as its own neighbor). z-scores are standard normal under
/// the randomization null; p-values are two-sided.
pub struct GiStarEngine;

impl HotSpotEngine for GiStarEngine {
    fn compute(
        &self,
        features: &FeatureStore,
        field: &str,
        options: &HotSpotOptions,
    ) -> Result<Vec<HotSpotStat>> {
        if options.distance_band <= 0.0 {
            return Err(PrepError::Format("distance band must be positive".into()).into());
        }
        let col = features.schema().index(field).ok_or_else(|| {
            PrepError::Format(format!("missing analysis field {field:?}"))
        })?;

        let mut points = Vec::with_capacity(features.len());
        let mut values = Vec::with_capacity(features.len());
        for (idx, feature) in features.iter().enumerate() {
            let Geometry::Point(p) = &feature.geometry else {
                return Err(PrepError::Geometry(format!(
                    "hot-spot analysis expects point features; feature {idx} is not a point"
                ))
                .into());
            };
            let value = feature.attrs[col].as_f64().ok_or_else(|| {
                PrepError::Format(format!("feature {idx}: field {field:?} is not numeric"))
            })?;
            points.push(*p);
            values.push(value);
        }

        let n = values.len();
        if n < 3 {
            return Err(PrepError::Format(format!(
                "hot-spot analysis needs at least 3 features, got {n}"
            ))
            .into());
        }

        if features.epsg().is_some_and(|e| matches!(e, 4326 | 4269)) {
            log::warn!(
                "hot-spot distance band interpreted in degrees; reproject to a metric CRS first"
            );
        }

        let nf = n as f64;
        let mean = values.iter().sum::<f64>() / nf;
        let s = (values.iter().map(|x| x * x).sum::<f64>() / nf - mean * mean).sqrt();

        let band_sq = options.distance_band * options.distance_band;
        let stats = (0..n)
            .map(|i| {
                // Binary weights: all sites within the band, self included.
                let mut w_sum = 0.0f64;
                let mut wx_sum = 0.0f64;
                for j in 0..n {
                    let dx = points[i].x() - points[j].x();
                    let dy = points[i].y() - points[j].y();
                    if dx * dx + dy * dy <= band_sq {
                        w_sum += 1.0;
                        wx_sum += values[j];
                    }
                }

                let numerator = wx_sum - mean * w_sum;
                let denominator =
                    s * ((nf * w_sum - w_sum * w_sum) / (nf - 1.0)).max(0.0).sqrt();
                let z = if denominator > 0.0 { numerator / denominator } else { 0.0 };
                HotSpotStat { z_score: z, p_value: two_sided_p(z) }
            })
            .collect();

        Ok(stats)
    }
}

/// Attach the statistics as `gi_z`/`gi_p` columns on a new store.
pub fn attach_stats(features: &FeatureStore, stats: &[HotSpotStat]) -> Result<FeatureStore> {
    if stats.len() != features.len() {
        return Err(PrepError::Format(format!(
            "{} statistics for {} features",
            stats.len(),
            features.len()
        ))
        .into());
    }
    let schema = features
        .schema()
        .with_field(Field::new("gi_z", FieldKind::Float))?
        .with_field(Field::new("gi_p", FieldKind::Float))?;

    let out = features
        .iter()
        .zip(stats)
        .map(|(feature, stat)| {
            let mut attrs = feature.attrs.clone();
            attrs.push(AttrValue::Float(stat.z_score));
            attrs.push(AttrValue::Float(stat.p_value));
            Feature { geometry: feature.geometry.clone(), attrs }
        })
        .collect();

    Ok(FeatureStore::from_parts(schema, features.epsg(), out))
}

/// Two-sided normal p-value via the Abramowitz & Stegun 7.1.26 erf
/// approximation (max error ~1.5e-7, plenty for significance flags).
fn two_sided_p(z: f64) -> f64 {
    let x = z.abs() / std::f64::consts::SQRT_2;
    let t = 1.0 / (1.0 + 0.3275911 * x);
    let poly = t
        * (0.254829592
            + t * (-0.284496736 + t * (1.421413741 + t * (-1.453152027 + t * 1.061405429))));
    let erf = 1.0 - poly * (-x * x).exp();
    (1.0 - erf).clamp(0.0, 1.0)
}
