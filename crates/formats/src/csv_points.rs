use std::io::Read;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use thiserror::Error;

use crate::geojson::{Feature, GeoJsonDocument, GeoPoint, Geometry};

/// Header names recognized as the x (longitude/easting) column.
pub const X_COLUMNS: [&str; 10] = [
    "lng",
    "longitude",
    "long",
    "lon",
    "x",
    "X",
    "X coordinate",
    "x coordinate",
    "easting",
    "Easting",
];

/// Header names recognized as the y (latitude/northing) column.
pub const Y_COLUMNS: [&str; 8] = [
    "lat",
    "latitude",
    "y",
    "Y",
    "Y Coordinate",
    "y coordinate",
    "northing",
    "Northing",
];

#[derive(Debug, Error)]
pub enum CsvError {
    #[error("csv: {0}")]
    Csv(#[from] csv::Error),
    #[error("no {axis} coordinate column found in header")]
    MissingCoordinateColumn { axis: &'static str },
    #[error("row {row}: column {column:?} is not a number: {value:?}")]
    InvalidCoordinate {
        row: usize,
        column: String,
        value: String,
    },
}

/// Converts point rows to a FeatureCollection.
///
/// The header row selects the coordinate columns (the last matching header
/// wins when several match). Every other column becomes a string property,
/// in header order.
pub fn csv_to_feature_collection(reader: impl Read) -> Result<GeoJsonDocument, CsvError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);
    let headers = rdr.headers()?.clone();

    let x_col = find_column(&headers, &X_COLUMNS)
        .ok_or(CsvError::MissingCoordinateColumn { axis: "x" })?;
    let y_col = find_column(&headers, &Y_COLUMNS)
        .ok_or(CsvError::MissingCoordinateColumn { axis: "y" })?;

    let mut features = Vec::new();
    for (i, record) in rdr.records().enumerate() {
        let record = record?;
        // 1-based, counting the header as row 1.
        let row = i + 2;
        let lon = parse_coordinate(&record, &headers, x_col, row)?;
        let lat = parse_coordinate(&record, &headers, y_col, row)?;

        let mut properties = Map::new();
        for (col, name) in headers.iter().enumerate() {
            if col == x_col || col == y_col {
                continue;
            }
            let value = record.get(col).unwrap_or_default();
            properties.insert(name.to_string(), Value::from(value));
        }

        features.push(Feature {
            id: None,
            properties,
            geometry: Some(Geometry::Point(GeoPoint::new(lon, lat))),
        });
    }

    tracing::debug!(features = features.len(), "converted csv rows");
    Ok(GeoJsonDocument::new(features))
}

/// Appends `.geojson` unless the name already carries it.
pub fn geojson_output_path(name: impl AsRef<Path>) -> PathBuf {
    let name = name.as_ref();
    if name.extension().is_some_and(|ext| ext == "geojson") {
        name.to_path_buf()
    } else {
        let mut s = name.as_os_str().to_owned();
        s.push(".geojson");
        PathBuf::from(s)
    }
}

fn find_column(headers: &csv::StringRecord, names: &[&str]) -> Option<usize> {
    headers
        .iter()
        .enumerate()
        .filter(|(_, h)| names.contains(&h.trim()))
        .map(|(i, _)| i)
        .last()
}

fn parse_coordinate(
    record: &csv::StringRecord,
    headers: &csv::StringRecord,
    col: usize,
    row: usize,
) -> Result<f64, CsvError> {
    let raw = record.get(col).unwrap_or_default();
    raw.trim()
        .parse::<f64>()
        .map_err(|_| CsvError::InvalidCoordinate {
            row,
            column: headers.get(col).unwrap_or_default().to_string(),
            value: raw.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::{CsvError, csv_to_feature_collection, geojson_output_path};
    use crate::geojson::{GeoPoint, Geometry};
    use crate::validate::validate_feature_collection;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    const QUAKES: &str = "\
time,latitude,longitude,mag,place
2015-09-16T22:54:32Z,-31.57,-71.67,8.3,Chile
2015-09-17T04:10:28Z,-31.52,-71.80,7.0,Chile
";

    #[test]
    fn converts_rows_to_points() {
        let doc = csv_to_feature_collection(QUAKES.as_bytes()).expect("convert");
        assert_eq!(doc.len(), 2);
        assert_eq!(
            doc.features[0].geometry,
            Some(Geometry::Point(GeoPoint::new(-71.67, -31.57)))
        );
        let keys: Vec<&str> = doc.features[0]
            .properties
            .keys()
            .map(String::as_str)
            .collect();
        assert_eq!(keys, vec!["time", "mag", "place"]);
        assert_eq!(doc.features[1].properties["mag"], "7.0");
        assert_eq!(validate_feature_collection(&doc.to_geojson_value()), Ok(()));
    }

    #[test]
    fn last_matching_header_picks_the_axis() {
        let doc = csv_to_feature_collection("lon,x,lat,name\n1,2,3,depot\n".as_bytes())
            .expect("convert");
        assert_eq!(
            doc.features[0].geometry,
            Some(Geometry::Point(GeoPoint::new(2.0, 3.0)))
        );
        let keys: Vec<&str> = doc.features[0]
            .properties
            .keys()
            .map(String::as_str)
            .collect();
        assert_eq!(keys, vec!["lon", "name"]);
        assert_eq!(doc.features[0].properties["lon"], "1");
    }

    #[test]
    fn missing_coordinate_column_is_an_error() {
        let err = csv_to_feature_collection("name,lat\nx,1\n".as_bytes()).unwrap_err();
        assert!(matches!(
            err,
            CsvError::MissingCoordinateColumn { axis: "x" }
        ));
    }

    #[test]
    fn bad_coordinate_names_row() {
        let err = csv_to_feature_collection("lon,lat\n1,2\nnorth,3\n".as_bytes()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "row 3: column \"lon\" is not a number: \"north\""
        );
    }

    #[test]
    fn output_path_gets_suffix_once() {
        assert_eq!(
            geojson_output_path("out/quakes"),
            PathBuf::from("out/quakes.geojson")
        );
        assert_eq!(
            geojson_output_path("quakes.geojson"),
            PathBuf::from("quakes.geojson")
        );
    }
}
