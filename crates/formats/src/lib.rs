pub mod csv_points;
pub mod geojson;
pub mod kml;
pub mod stats;
pub mod validate;

pub use csv_points::*;
pub use geojson::*;
pub use kml::{KmlError, kml_to_feature_collection};
pub use stats::StatsError;
pub use validate::*;
