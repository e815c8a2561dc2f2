//! Descriptive and spatial statistics over a document's Point features.
//!
//! Distances are WGS84 geodesic meters. Features whose geometry is not a
//! Point are ignored.

use foundation::wgs84_distance_m;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::geojson::{Feature, GeoJsonDocument, GeoPoint, Geometry};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StatsError {
    #[error("document has no point features")]
    NoPoints,
    #[error("need at least two point features, found {0}")]
    TooFewPoints(usize),
    #[error("feature {index} has no {name:?} property")]
    MissingAttribute { index: usize, name: String },
    #[error("feature {index} property {name:?} is not numeric: {value}")]
    NonNumeric {
        index: usize,
        name: String,
        value: String,
    },
    #[error("property {0:?} has the same value on every feature")]
    ZeroVariance(String),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistanceSummary {
    /// Unordered pairs of distinct positions.
    pub pairs: usize,
    pub min_m: f64,
    pub max_m: f64,
    pub mean_m: f64,
    pub total_m: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Summary {
    pub features: usize,
    pub points: usize,
    pub centroid: Option<GeoPoint>,
    pub distances: Option<DistanceSummary>,
}

/// `(feature index, position, feature)` for every Point feature.
pub fn point_features(doc: &GeoJsonDocument) -> impl Iterator<Item = (usize, GeoPoint, &Feature)> {
    doc.features
        .iter()
        .enumerate()
        .filter_map(|(i, f)| match &f.geometry {
            Some(Geometry::Point(p)) => Some((i, *p, f)),
            _ => None,
        })
}

pub fn summarize(doc: &GeoJsonDocument) -> Summary {
    let positions: Vec<GeoPoint> = point_features(doc).map(|(_, p, _)| p).collect();
    Summary {
        features: doc.len(),
        points: positions.len(),
        centroid: centroid_of(&positions),
        distances: distances_of(&positions),
    }
}

/// Arithmetic mean of the point positions.
pub fn centroid(doc: &GeoJsonDocument) -> Option<GeoPoint> {
    let positions: Vec<GeoPoint> = point_features(doc).map(|(_, p, _)| p).collect();
    centroid_of(&positions)
}

pub fn distance_summary(doc: &GeoJsonDocument) -> Option<DistanceSummary> {
    let positions: Vec<GeoPoint> = point_features(doc).map(|(_, p, _)| p).collect();
    distances_of(&positions)
}

fn centroid_of(positions: &[GeoPoint]) -> Option<GeoPoint> {
    if positions.is_empty() {
        return None;
    }
    let n = positions.len() as f64;
    let (lon, lat) = positions
        .iter()
        .fold((0.0, 0.0), |(lon, lat), p| (lon + p.lon_deg, lat + p.lat_deg));
    Some(GeoPoint::new(lon / n, lat / n))
}

fn distances_of(positions: &[GeoPoint]) -> Option<DistanceSummary> {
    let mut pairs = 0usize;
    let mut min_m = f64::INFINITY;
    let mut max_m = 0.0f64;
    let mut total_m = 0.0;
    for (i, a) in positions.iter().enumerate() {
        for b in &positions[i + 1..] {
            if a == b {
                continue;
            }
            let d = distance(a, b);
            pairs += 1;
            min_m = min_m.min(d);
            max_m = max_m.max(d);
            total_m += d;
        }
    }
    (pairs > 0).then(|| DistanceSummary {
        pairs,
        min_m,
        max_m,
        mean_m: total_m / pairs as f64,
        total_m,
    })
}

fn distance(a: &GeoPoint, b: &GeoPoint) -> f64 {
    wgs84_distance_m(a.lon_deg, a.lat_deg, b.lon_deg, b.lat_deg)
}

/// Numeric values of `name` on every Point feature. Numeric strings count.
pub fn attribute_values(
    doc: &GeoJsonDocument,
    name: &str,
) -> Result<Vec<(GeoPoint, f64)>, StatsError> {
    point_features(doc)
        .map(|(index, position, feature)| {
            let value = feature.properties.get(name).ok_or_else(|| {
                StatsError::MissingAttribute {
                    index,
                    name: name.to_string(),
                }
            })?;
            let number = match value {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().parse::<f64>().ok(),
                _ => None,
            };
            number
                .filter(|v| v.is_finite())
                .map(|v| (position, v))
                .ok_or_else(|| StatsError::NonNumeric {
                    index,
                    name: name.to_string(),
                    value: value.to_string(),
                })
        })
        .collect()
}

/// Inverse-distance weight `1 / (1 + d)`, with `d` in meters.
fn weight(a: &GeoPoint, b: &GeoPoint) -> f64 {
    1.0 / (1.0 + distance(a, b))
}

struct Deviations {
    samples: Vec<(GeoPoint, f64)>,
    mean: f64,
    sum_sq: f64,
}

fn deviations(doc: &GeoJsonDocument, attribute: &str) -> Result<Deviations, StatsError> {
    let samples = attribute_values(doc, attribute)?;
    if samples.len() < 2 {
        return Err(StatsError::TooFewPoints(samples.len()));
    }
    let n = samples.len() as f64;
    let mean = samples.iter().map(|(_, v)| v).sum::<f64>() / n;
    let sum_sq = samples.iter().map(|(_, v)| (v - mean).powi(2)).sum::<f64>();
    if sum_sq == 0.0 {
        return Err(StatsError::ZeroVariance(attribute.to_string()));
    }
    Ok(Deviations {
        samples,
        mean,
        sum_sq,
    })
}

/// Moran's I for `attribute` with `1 / (1 + d)` weights over all i != j.
///
/// Positive values mean similar values sit close together.
pub fn morans_i(doc: &GeoJsonDocument, attribute: &str) -> Result<f64, StatsError> {
    let Deviations {
        samples,
        mean,
        sum_sq,
    } = deviations(doc, attribute)?;
    let n = samples.len() as f64;
    let mut weights_sum = 0.0;
    let mut cross = 0.0;
    for (i, (pi, xi)) in samples.iter().enumerate() {
        for (j, (pj, xj)) in samples.iter().enumerate() {
            if i == j {
                continue;
            }
            let w = weight(pi, pj);
            weights_sum += w;
            cross += w * (xi - mean) * (xj - mean);
        }
    }
    let value = n / weights_sum * (cross / sum_sq);
    debug!(attribute, value, "morans i");
    Ok(value)
}

/// Geary's C for `attribute` with the same weights as [`morans_i`].
///
/// Below 1 means positive spatial autocorrelation, above 1 negative.
pub fn gearys_c(doc: &GeoJsonDocument, attribute: &str) -> Result<f64, StatsError> {
    let Deviations {
        samples, sum_sq, ..
    } = deviations(doc, attribute)?;
    let n = samples.len() as f64;
    let mut weights_sum = 0.0;
    let mut squared_diffs = 0.0;
    for (i, (pi, xi)) in samples.iter().enumerate() {
        for (j, (pj, xj)) in samples.iter().enumerate() {
            if i == j {
                continue;
            }
            let w = weight(pi, pj);
            weights_sum += w;
            squared_diffs += w * (xi - xj).powi(2);
        }
    }
    let value = (n - 1.0) * squared_diffs / (2.0 * weights_sum * sum_sq);
    debug!(attribute, value, "gearys c");
    Ok(value)
}

/// Inverse-distance-weighted estimate of `property` at `target` (power 1).
///
/// A known point exactly at `target` returns its own value.
pub fn idw(doc: &GeoJsonDocument, property: &str, target: GeoPoint) -> Result<f64, StatsError> {
    let samples = attribute_values(doc, property)?;
    if samples.is_empty() {
        return Err(StatsError::NoPoints);
    }
    let mut numerator = 0.0;
    let mut denominator = 0.0;
    for (position, value) in &samples {
        let d = distance(position, &target);
        if d == 0.0 {
            return Ok(*value);
        }
        numerator += value / d;
        denominator += 1.0 / d;
    }
    Ok(numerator / denominator)
}
