use std::path::PathBuf;

use clap::{Parser, Subcommand};
use formats::GeoPoint;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Check, convert and inspect GeoJSON overlays")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check that a FeatureCollection can be shown as an overlay
    Validate {
        /// GeoJSON file
        file: PathBuf,
    },

    /// Convert a CSV of points to a FeatureCollection
    Csv2geojson {
        /// CSV with a header row naming lon/lat (or x/y, easting/northing) columns
        input: PathBuf,

        /// Output path; `.geojson` is appended when missing
        output: PathBuf,
    },

    /// Print feature count, bounds and popup lines
    Inspect {
        /// GeoJSON file
        file: PathBuf,
    },

    /// Point statistics: centroid, WGS84 distances, autocorrelation and IDW
    Stats {
        /// GeoJSON file
        file: PathBuf,

        /// Numeric property for Moran's I and Geary's C
        #[arg(long)]
        attribute: Option<String>,

        /// Estimate `--property` at this `lon,lat` by inverse distance weighting
        #[arg(long, value_parser = parse_lon_lat, requires = "property", allow_hyphen_values = true)]
        idw: Option<GeoPoint>,

        /// Numeric property to interpolate
        #[arg(long, requires = "idw")]
        property: Option<String>,
    },

    /// Convert the Placemarks of a KML file to a FeatureCollection
    Kml2geojson {
        /// KML file
        input: PathBuf,

        /// Output path; `.geojson` is appended when missing
        output: PathBuf,
    },
}

fn parse_lon_lat(raw: &str) -> Result<GeoPoint, String> {
    let (lon, lat) = raw
        .split_once(',')
        .ok_or_else(|| format!("expected lon,lat, got {raw:?}"))?;
    let parse = |v: &str| {
        v.trim()
            .parse::<f64>()
            .map_err(|e| format!("{v:?} is not a number: {e}"))
    };
    Ok(GeoPoint::new(parse(lon)?, parse(lat)?))
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(Args::parse()) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<(), tools::ToolError> {
    match args.command {
        Command::Validate { file } => {
            tools::validate_file(&file)?;
            println!("{}: valid", file.display());
        }
        Command::Csv2geojson { input, output } => {
            let written = tools::convert_csv(&input, &output)?;
            println!("{}", written.display());
        }
        Command::Inspect { file } => {
            print!("{}", tools::inspect_file(&file)?);
        }
        Command::Stats {
            file,
            attribute,
            idw,
            property,
        } => {
            let request = tools::StatsRequest {
                attribute,
                idw: idw.zip(property),
            };
            print!("{}", tools::stats_file(&file, &request)?);
        }
        Command::Kml2geojson { input, output } => {
            let written = tools::convert_kml(&input, &output)?;
            println!("{}", written.display());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{Args, Command, parse_lon_lat};
    use clap::Parser;
    use formats::GeoPoint;
    use pretty_assertions::assert_eq;

    #[test]
    fn lon_lat_argument() {
        assert_eq!(parse_lon_lat("-122.6, 45.5"), Ok(GeoPoint::new(-122.6, 45.5)));
        assert!(parse_lon_lat("-122.6").is_err());
        assert!(parse_lon_lat("west,45").is_err());
    }

    #[test]
    fn idw_needs_a_property() {
        assert!(Args::try_parse_from(["mapview", "stats", "p.geojson", "--idw", "1,2"]).is_err());
        let args = Args::try_parse_from([
            "mapview", "stats", "p.geojson", "--idw", "-1,2", "--property", "depth",
        ])
        .expect("parse");
        match args.command {
            Command::Stats { idw, property, .. } => {
                assert_eq!(idw, Some(GeoPoint::new(-1.0, 2.0)));
                assert_eq!(property.as_deref(), Some("depth"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
