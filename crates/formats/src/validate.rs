//! Structural checks for FeatureCollections produced by the conversion tools.
//!
//! Stricter than [`crate::GeoJsonDocument`] parsing: every feature must carry a
//! non-empty `properties` object, and coordinates are checked per geometry type.

use serde_json::Value;
use thiserror::Error;

use crate::geojson::is_geometry_type;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationIssue {
    #[error("document must be an object with a features array")]
    NotAFeatureCollection,
    #[error("document has no features")]
    NoFeatures,
    #[error("feature {index} has no type field")]
    MissingType { index: usize },
    #[error("feature {index} has no properties")]
    MissingProperties { index: usize },
    #[error("feature {index} has no geometry")]
    MissingGeometry { index: usize },
    #[error("feature {index} geometry has no type")]
    MissingGeometryType { index: usize },
    #[error("feature {index} geometry type {ty:?} is not a GeoJSON geometry type")]
    UnknownGeometryType { index: usize, ty: String },
    #[error("feature {index} has no coordinates")]
    MissingCoordinates { index: usize },
    #[error("feature {index} point has fewer than two coordinate values")]
    PointTooShort { index: usize },
    #[error("feature {index} has no coordinate positions")]
    EmptyCoordinates { index: usize },
    #[error("feature {index} contains a non-numeric coordinate: {value}")]
    NonNumeric { index: usize, value: String },
}

/// Outer error is a JSON syntax error; inner is the first structural issue found.
pub fn validate_geojson_str(
    payload: &str,
) -> Result<Result<(), ValidationIssue>, serde_json::Error> {
    let value: Value = serde_json::from_str(payload)?;
    Ok(validate_feature_collection(&value))
}

pub fn validate_feature_collection(value: &Value) -> Result<(), ValidationIssue> {
    let features = value
        .get("features")
        .and_then(Value::as_array)
        .ok_or(ValidationIssue::NotAFeatureCollection)?;
    if features.is_empty() {
        return Err(ValidationIssue::NoFeatures);
    }

    for (index, feature) in features.iter().enumerate() {
        validate_feature(index, feature)?;
    }
    Ok(())
}

fn validate_feature(index: usize, feature: &Value) -> Result<(), ValidationIssue> {
    if !is_truthy(feature.get("type")) {
        return Err(ValidationIssue::MissingType { index });
    }
    if !is_truthy(feature.get("properties")) {
        return Err(ValidationIssue::MissingProperties { index });
    }
    let Some(geometry) = feature.get("geometry").filter(|g| is_truthy(Some(*g))) else {
        return Err(ValidationIssue::MissingGeometry { index });
    };

    let ty = match geometry.get("type") {
        Some(Value::String(s)) if !s.is_empty() => s.as_str(),
        Some(other) if is_truthy(Some(other)) => {
            return Err(ValidationIssue::UnknownGeometryType {
                index,
                ty: other.to_string(),
            });
        }
        _ => return Err(ValidationIssue::MissingGeometryType { index }),
    };
    if !is_geometry_type(ty) {
        return Err(ValidationIssue::UnknownGeometryType {
            index,
            ty: ty.to_string(),
        });
    }

    let coords = geometry.get("coordinates");
    if !is_truthy(coords) {
        return Err(ValidationIssue::MissingCoordinates { index });
    }
    let coords = coords.and_then(Value::as_array).ok_or_else(|| {
        ValidationIssue::NonNumeric {
            index,
            value: coords.map(Value::to_string).unwrap_or_default(),
        }
    })?;

    if ty == "Point" {
        if coords.len() < 2 {
            return Err(ValidationIssue::PointTooShort { index });
        }
        for c in coords {
            require_number(index, c)?;
        }
        return Ok(());
    }

    match coords.first().and_then(Value::as_array) {
        Some(first) if !first.is_empty() => {}
        _ => return Err(ValidationIssue::EmptyCoordinates { index }),
    }

    match ty {
        "LineString" => {
            for pair in coords {
                require_pair(index, pair)?;
            }
        }
        "Polygon" => {
            for ring in coords {
                let ring = ring.as_array().ok_or_else(|| ValidationIssue::NonNumeric {
                    index,
                    value: ring.to_string(),
                })?;
                for pair in ring {
                    require_pair(index, pair)?;
                }
            }
        }
        _ => {}
    }
    Ok(())
}

/// Mirrors JSON-ish truthiness: missing, null, false, 0, "" and empty containers fail.
fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|v| v != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(a)) => !a.is_empty(),
        Some(Value::Object(o)) => !o.is_empty(),
    }
}

fn require_pair(index: usize, pair: &Value) -> Result<(), ValidationIssue> {
    let non_numeric = || ValidationIssue::NonNumeric {
        index,
        value: pair.to_string(),
    };
    let arr = pair.as_array().ok_or_else(non_numeric)?;
    if arr.len() < 2 {
        return Err(non_numeric());
    }
    require_number(index, &arr[0])?;
    require_number(index, &arr[1])
}

// Numeric strings count as numbers.
fn require_number(index: usize, value: &Value) -> Result<(), ValidationIssue> {
    let ok = match value {
        Value::Number(_) => true,
        Value::String(s) => s.trim().parse::<f64>().is_ok(),
        _ => false,
    };
    if ok {
        Ok(())
    } else {
        Err(ValidationIssue::NonNumeric {
            index,
            value: value.to_string(),
        })
    }
}
