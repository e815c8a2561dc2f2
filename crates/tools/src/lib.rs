//! File-level operations behind the `mapview` binary.

use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use formats::stats::{self, DistanceSummary};
use formats::{
    CsvError, DocumentError, GeoJsonDocument, GeoPoint, KmlError, StatsError, ValidationIssue,
    csv_to_feature_collection, geojson_output_path, kml_to_feature_collection,
    validate_geojson_str,
};
use layers::popup_lines;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("read {path:?}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("write {path:?}: {source}")]
    Write { path: PathBuf, source: io::Error },
    #[error("{path:?} is not JSON: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("{path:?} is not valid GeoJSON: {issue}")]
    Invalid {
        path: PathBuf,
        issue: ValidationIssue,
    },
    #[error("{path:?}: {source}")]
    Document {
        path: PathBuf,
        source: DocumentError,
    },
    #[error("{path:?}: {source}")]
    Csv { path: PathBuf, source: CsvError },
    #[error("{path:?}: {source}")]
    Kml { path: PathBuf, source: KmlError },
    #[error("{path:?}: {source}")]
    Stats { path: PathBuf, source: StatsError },
}

fn read_to_string(path: &Path) -> Result<String, ToolError> {
    fs::read_to_string(path).map_err(|source| ToolError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// Checks a FeatureCollection file against the overlay rules.
pub fn validate_file(path: &Path) -> Result<(), ToolError> {
    let payload = read_to_string(path)?;
    let verdict = validate_geojson_str(&payload).map_err(|source| ToolError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    verdict.map_err(|issue| ToolError::Invalid {
        path: path.to_path_buf(),
        issue,
    })
}

/// Converts a point CSV and writes pretty GeoJSON; returns the path written.
pub fn convert_csv(input: &Path, output: &Path) -> Result<PathBuf, ToolError> {
    let file = fs::File::open(input).map_err(|source| ToolError::Read {
        path: input.to_path_buf(),
        source,
    })?;
    let doc = csv_to_feature_collection(io::BufReader::new(file)).map_err(|source| {
        ToolError::Csv {
            path: input.to_path_buf(),
            source,
        }
    })?;

    write_document(&doc, output)
}

/// Converts the Placemarks of a KML file and writes pretty GeoJSON.
pub fn convert_kml(input: &Path, output: &Path) -> Result<PathBuf, ToolError> {
    let payload = read_to_string(input)?;
    let doc = kml_to_feature_collection(&payload).map_err(|source| ToolError::Kml {
        path: input.to_path_buf(),
        source,
    })?;
    write_document(&doc, output)
}

fn write_document(doc: &GeoJsonDocument, output: &Path) -> Result<PathBuf, ToolError> {
    let out = geojson_output_path(output);
    let text = doc
        .to_geojson_string_pretty()
        .map_err(|source| ToolError::Json {
            path: out.clone(),
            source,
        })?;
    if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| ToolError::Write {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    fs::write(&out, text).map_err(|source| ToolError::Write {
        path: out.clone(),
        source,
    })?;
    info!(features = doc.len(), output = ?out, "wrote geojson");
    Ok(out)
}

fn read_document(path: &Path) -> Result<GeoJsonDocument, ToolError> {
    let payload = read_to_string(path)?;
    let doc = GeoJsonDocument::from_geojson_str(&payload).map_err(|source| {
        ToolError::Document {
            path: path.to_path_buf(),
            source,
        }
    })?;
    debug!(features = doc.len(), "parsed document");
    Ok(doc)
}

pub fn inspect_file(path: &Path) -> Result<String, ToolError> {
    Ok(inspect_report(&read_document(path)?))
}

/// What `stats` computes beyond the summary.
#[derive(Debug, Clone, Default)]
pub struct StatsRequest {
    /// Property for Moran's I and Geary's C.
    pub attribute: Option<String>,
    /// Target position and property for an IDW estimate.
    pub idw: Option<(GeoPoint, String)>,
}

pub fn stats_file(path: &Path, request: &StatsRequest) -> Result<String, ToolError> {
    let doc = read_document(path)?;
    stats_report(&doc, request).map_err(|source| ToolError::Stats {
        path: path.to_path_buf(),
        source,
    })
}

/// Point summary, then the requested attribute statistics. Distances in meters.
pub fn stats_report(doc: &GeoJsonDocument, request: &StatsRequest) -> Result<String, StatsError> {
    let summary = stats::summarize(doc);
    let mut out = String::new();
    let _ = writeln!(out, "features: {}", summary.features);
    let _ = writeln!(out, "points: {}", summary.points);
    match summary.centroid {
        Some(c) => {
            let _ = writeln!(out, "centroid: lon={:.6} lat={:.6}", c.lon_deg, c.lat_deg);
        }
        None => out.push_str("centroid: none\n"),
    }
    match summary.distances {
        Some(DistanceSummary {
            pairs,
            min_m,
            max_m,
            mean_m,
            total_m,
        }) => {
            let _ = writeln!(
                out,
                "distances: pairs={pairs} min={min_m:.3} max={max_m:.3} mean={mean_m:.3} total={total_m:.3}"
            );
        }
        None => out.push_str("distances: none\n"),
    }
    if let Some(attribute) = &request.attribute {
        let moran = stats::morans_i(doc, attribute)?;
        let geary = stats::gearys_c(doc, attribute)?;
        let _ = writeln!(out, "moran's i ({attribute}): {moran:.6}");
        let _ = writeln!(out, "geary's c ({attribute}): {geary:.6}");
    }
    if let Some((target, property)) = &request.idw {
        let estimate = stats::idw(doc, property, *target)?;
        let _ = writeln!(
            out,
            "idw ({property}) at {},{}: {estimate:.6}",
            target.lon_deg, target.lat_deg
        );
    }
    Ok(out)
}

/// Feature count, bounds, then each feature's popup lines.
pub fn inspect_report(doc: &GeoJsonDocument) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "features: {}", doc.len());
    match doc.bounds() {
        Some(b) => {
            let _ = writeln!(
                out,
                "bounds: west={} south={} east={} north={}",
                b.west(),
                b.south(),
                b.east(),
                b.north()
            );
        }
        None => out.push_str("bounds: none\n"),
    }
    for (i, feature) in doc.features.iter().enumerate() {
        let kind = feature
            .geometry
            .as_ref()
            .map_or("no geometry", |g| g.type_name());
        let _ = writeln!(out, "[{i}] {kind}");
        for (name, value) in popup_lines(&feature.properties) {
            let _ = writeln!(out, "  {name}: {value}");
        }
    }
    out
}
