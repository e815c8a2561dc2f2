//! KML to GeoJSON.
//!
//! Every `Placemark` with at least one geometry becomes a feature. Tags are
//! matched by local name, so `gx:Track` and `Track` read the same.

use roxmltree::{Document, Node};
use serde_json::{Map, Value, json};
use thiserror::Error;
use tracing::debug;

use crate::geojson::{Feature, GeoJsonDocument, GeoPoint, Geometry};

#[derive(Debug, Error)]
pub enum KmlError {
    #[error("invalid KML: {0}")]
    Xml(#[from] roxmltree::Error),
    #[error("placemark {placemark}: bad coordinate {value:?}")]
    Coordinate { placemark: usize, value: String },
}

/// Converts a KML document into one FeatureCollection.
pub fn kml_to_feature_collection(text: &str) -> Result<GeoJsonDocument, KmlError> {
    let document = Document::parse(text)?;
    let mut features = Vec::new();
    let mut skipped = 0usize;
    for (index, placemark) in named(document.root(), "Placemark").enumerate() {
        let feature = placemark_feature(placemark)
            .map_err(|value| KmlError::Coordinate {
                placemark: index,
                value,
            })?;
        match feature {
            Some(feature) => features.push(feature),
            None => skipped += 1,
        }
    }
    debug!(features = features.len(), skipped, "kml converted");
    Ok(GeoJsonDocument::new(features))
}

fn named<'a, 'input>(
    node: Node<'a, 'input>,
    name: &'static str,
) -> impl Iterator<Item = Node<'a, 'input>> {
    node.descendants()
        .skip(1)
        .filter(move |n| n.is_element() && n.tag_name().name() == name)
}

fn first<'a, 'input>(node: Node<'a, 'input>, name: &'static str) -> Option<Node<'a, 'input>> {
    named(node, name).next()
}

fn text<'a>(node: Option<Node<'a, '_>>) -> &'a str {
    node.and_then(|n| n.text()).unwrap_or("")
}

fn number(node: Option<Node<'_, '_>>) -> Option<f64> {
    text(node).trim().parse().ok()
}

/// `lon,lat[,alt]`. Errors carry the offending text.
fn tuple(raw: &str) -> Result<GeoPoint, String> {
    let values = raw
        .split(',')
        .map(|v| v.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| raw.to_string())?;
    match values.as_slice() {
        [lon, lat, ..] => Ok(GeoPoint::new(*lon, *lat)),
        _ => Err(raw.to_string()),
    }
}

fn tuples(raw: &str) -> Result<Vec<GeoPoint>, String> {
    raw.split_whitespace().map(tuple).collect()
}

/// `gx:coord` holds `lon lat alt` separated by spaces.
fn track_coord(raw: &str) -> Result<GeoPoint, String> {
    let values = raw
        .split_whitespace()
        .map(str::parse::<f64>)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| raw.to_string())?;
    match values.as_slice() {
        [lon, lat, ..] => Ok(GeoPoint::new(*lon, *lat)),
        _ => Err(raw.to_string()),
    }
}

struct Geometries {
    shapes: Vec<Geometry>,
    times: Vec<Value>,
}

fn placemark_geometries(placemark: Node<'_, '_>) -> Result<Geometries, String> {
    let mut shapes = Vec::new();
    let mut times = Vec::new();
    for polygon in named(placemark, "Polygon") {
        let rings = named(polygon, "LinearRing")
            .map(|ring| tuples(text(first(ring, "coordinates"))))
            .collect::<Result<Vec<_>, _>>()?;
        shapes.push(Geometry::Polygon(rings));
    }
    for line in named(placemark, "LineString") {
        shapes.push(Geometry::LineString(tuples(text(first(line, "coordinates")))?));
    }
    for point in named(placemark, "Point") {
        // A point's single tuple may be spread over whitespace.
        let compact: String = text(first(point, "coordinates"))
            .split_whitespace()
            .collect();
        shapes.push(Geometry::Point(tuple(&compact)?));
    }
    for track in named(placemark, "Track") {
        let coords = named(track, "coord")
            .map(|c| track_coord(text(Some(c))))
            .collect::<Result<Vec<_>, _>>()?;
        shapes.push(Geometry::LineString(coords));
        let when: Vec<Value> = named(track, "when")
            .map(|w| Value::String(text(Some(w)).to_string()))
            .collect();
        if !when.is_empty() {
            times.push(Value::Array(when));
        }
    }
    Ok(Geometries { shapes, times })
}

fn placemark_feature(placemark: Node<'_, '_>) -> Result<Option<Feature>, String> {
    let Geometries { mut shapes, mut times } = placemark_geometries(placemark)?;
    if shapes.is_empty() {
        return Ok(None);
    }

    let mut properties = Map::new();
    if let Some(name) = first(placemark, "name") {
        properties.insert("name".into(), json!(text(Some(name))));
    }
    let description = text(first(placemark, "description"));
    if !description.is_empty() {
        properties.insert("description".into(), json!(description));
    }
    if let Some(style_url) = first(placemark, "styleUrl") {
        let style_url = text(Some(style_url));
        let style_url = if style_url.starts_with('#') {
            style_url.to_string()
        } else {
            format!("#{style_url}")
        };
        properties.insert("styleUrl".into(), json!(style_url));
    }
    style_properties(placemark, &mut properties);
    if let Some(extended) = first(placemark, "ExtendedData") {
        for data in named(extended, "Data") {
            let key = data.attribute("name").unwrap_or_default();
            properties.insert(key.into(), json!(text(first(data, "value"))));
        }
        for data in named(extended, "SimpleData") {
            let key = data.attribute("name").unwrap_or_default();
            properties.insert(key.into(), json!(text(Some(data))));
        }
    }
    if let Some(span) = first(placemark, "TimeSpan") {
        properties.insert(
            "timeSpan".into(),
            json!({"begin": text(first(span, "begin")), "end": text(first(span, "end"))}),
        );
    }
    match times.len() {
        0 => {}
        1 => {
            properties.insert("times".into(), times.remove(0));
        }
        _ => {
            properties.insert("times".into(), Value::Array(times));
        }
    }

    let geometry = if shapes.len() == 1 {
        shapes.remove(0)
    } else {
        Geometry::GeometryCollection(shapes)
    };
    Ok(Some(Feature {
        id: placemark.attribute("id").map(|id| json!(id)),
        properties,
        geometry: Some(geometry),
    }))
}

/// Inline `PolyStyle` and `LineStyle` as simplestyle keys.
fn style_properties(placemark: Node<'_, '_>, properties: &mut Map<String, Value>) {
    if let Some(poly) = first(placemark, "PolyStyle") {
        let color = text(first(poly, "color")).trim();
        if !color.is_empty() {
            let (rgb, opacity) = rgb_and_opacity(color);
            properties.insert("fill".into(), json!(rgb));
            properties.insert("fill-opacity".into(), json!(opacity));
            properties.insert("stroke".into(), json!(rgb));
            properties.insert("stroke-opacity".into(), json!(opacity));
            properties.insert("stroke-width".into(), json!(1));
        }
        toggle(properties, "fill-opacity", number(first(poly, "fill")));
        toggle(properties, "stroke-opacity", number(first(poly, "outline")));
    }
    if let Some(line) = first(placemark, "LineStyle") {
        let color = text(first(line, "color")).trim();
        if !color.is_empty() {
            let (rgb, opacity) = rgb_and_opacity(color);
            properties.insert("stroke".into(), json!(rgb));
            properties.insert("stroke-opacity".into(), json!(opacity));
        }
        if let Some(width) = number(first(line, "width")).filter(|w| *w != 0.0) {
            properties.insert("stroke-width".into(), json!(width));
        }
    }
}

/// `<fill>0</fill>` hides; `1` shows only when no color set an opacity.
fn toggle(properties: &mut Map<String, Value>, key: &str, flag: Option<f64>) {
    match flag {
        Some(v) if v == 0.0 => {
            properties.insert(key.into(), json!(0.0));
        }
        Some(v) if v == 1.0 && !properties.contains_key(key) => {
            properties.insert(key.into(), json!(1.0));
        }
        _ => {}
    }
}

/// KML `aabbggrr` to `#rrggbb` and an opacity rounded to two places.
pub fn rgb_and_opacity(kml: &str) -> (String, f64) {
    let s = kml.strip_prefix('#').unwrap_or(kml);
    if !s.is_ascii() {
        return ("#000000".to_string(), 1.0);
    }
    match s.len() {
        8 => {
            let opacity = u8::from_str_radix(&s[0..2], 16)
                .map(|a| (f64::from(a) / 256.0 * 100.0).round() / 100.0)
                .unwrap_or(1.0);
            (format!("#{}{}{}", &s[6..8], &s[4..6], &s[2..4]), opacity)
        }
        6 => (format!("#{}{}{}", &s[4..6], &s[2..4], &s[0..2]), 1.0),
        3 => (format!("#{}", s.chars().rev().collect::<String>()), 1.0),
        _ => ("#000000".to_string(), 1.0),
    }
}

#[cfg(test)]
mod tests {
    use super::{KmlError, kml_to_feature_collection, rgb_and_opacity};
    use crate::geojson::{GeoPoint, Geometry};
    use pretty_assertions::assert_eq;
    use serde_json::{Value, json};

    const HEADER: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<kml xmlns="http://www.opengis.net/kml/2.2" xmlns:gx="http://www.google.com/kml/ext/2.2">
<Document>
  <name>Trip</name>"#;
    const FOOTER: &str = "</Document></kml>";

    fn wrap(body: &str) -> String {
        format!("{HEADER}{body}{FOOTER}")
    }

    #[test]
    fn placemarks_become_features() {
        let kml = wrap(
            r##"
  <Placemark id="depot">
    <name>Depot</name>
    <description><![CDATA[<i>main</i>]]></description>
    <styleUrl>pin</styleUrl>
    <ExtendedData>
      <Data name="capacity"><value>12</value></Data>
      <SchemaData schemaUrl="#s"><SimpleData name="owner">city</SimpleData></SchemaData>
    </ExtendedData>
    <Point><coordinates> -112.2, 36.0, 2357 </coordinates></Point>
  </Placemark>
  <Placemark>
    <name>Park</name>
    <Style><PolyStyle><color>ee001122</color><outline>0</outline></PolyStyle></Style>
    <Polygon><outerBoundaryIs><LinearRing><coordinates>
      0,0,0 1,0,0 1,1,0 0,0,0
    </coordinates></LinearRing></outerBoundaryIs></Polygon>
  </Placemark>
  <Placemark><name>Nothing here</name></Placemark>
"##,
        );
        let doc = kml_to_feature_collection(&kml).expect("convert");
        assert_eq!(doc.len(), 2);

        let depot = &doc.features[0];
        assert_eq!(depot.id, Some(json!("depot")));
        assert_eq!(
            Value::Object(depot.properties.clone()),
            json!({
                "name": "Depot",
                "description": "<i>main</i>",
                "styleUrl": "#pin",
                "capacity": "12",
                "owner": "city"
            })
        );
        assert_eq!(
            depot.geometry,
            Some(Geometry::Point(GeoPoint::new(-112.2, 36.0)))
        );

        let park = &doc.features[1];
        assert_eq!(park.id, None);
        assert_eq!(
            Value::Object(park.properties.clone()),
            json!({
                "name": "Park",
                "fill": "#221100",
                "fill-opacity": 0.93,
                "stroke": "#221100",
                "stroke-opacity": 0.0,
                "stroke-width": 1
            })
        );
        let square = vec![
            GeoPoint::new(0.0, 0.0),
            GeoPoint::new(1.0, 0.0),
            GeoPoint::new(1.0, 1.0),
            GeoPoint::new(0.0, 0.0),
        ];
        assert_eq!(park.geometry, Some(Geometry::Polygon(vec![square])));
    }

    #[test]
    fn tracks_carry_their_times() {
        let kml = wrap(
            r#"
  <Placemark>
    <gx:Track>
      <when>2020-01-01T00:00:00Z</when>
      <when>2020-01-01T00:01:00Z</when>
      <gx:coord>-122.2 37.4 150</gx:coord>
      <gx:coord>-122.3 37.5 160</gx:coord>
    </gx:Track>
  </Placemark>
"#,
        );
        let doc = kml_to_feature_collection(&kml).expect("convert");
        let track = &doc.features[0];
        assert_eq!(
            track.geometry,
            Some(Geometry::LineString(vec![
                GeoPoint::new(-122.2, 37.4),
                GeoPoint::new(-122.3, 37.5)
            ]))
        );
        assert_eq!(
            track.properties.get("times"),
            Some(&json!(["2020-01-01T00:00:00Z", "2020-01-01T00:01:00Z"]))
        );
    }

    #[test]
    fn multigeometry_becomes_a_collection() {
        let kml = wrap(
            r#"
  <Placemark>
    <TimeSpan><begin>2021</begin><end>2022</end></TimeSpan>
    <Style><LineStyle><color>ff0000ff</color><width>3</width></LineStyle></Style>
    <MultiGeometry>
      <Point><coordinates>5,6</coordinates></Point>
      <LineString><coordinates>0,0 1,1</coordinates></LineString>
    </MultiGeometry>
  </Placemark>
"#,
        );
        let doc = kml_to_feature_collection(&kml).expect("convert");
        let feature = &doc.features[0];
        assert_eq!(
            feature.geometry,
            Some(Geometry::GeometryCollection(vec![
                Geometry::LineString(vec![GeoPoint::new(0.0, 0.0), GeoPoint::new(1.0, 1.0)]),
                Geometry::Point(GeoPoint::new(5.0, 6.0)),
            ]))
        );
        assert_eq!(
            Value::Object(feature.properties.clone()),
            json!({
                "stroke": "#ff0000",
                "stroke-opacity": 1.0,
                "stroke-width": 3.0,
                "timeSpan": {"begin": "2021", "end": "2022"}
            })
        );
    }

    #[test]
    fn bad_input_is_reported() {
        let kml = wrap(
            r#"
  <Placemark><Point><coordinates>0,0</coordinates></Point></Placemark>
  <Placemark><LineString><coordinates>0,0 east,1</coordinates></LineString></Placemark>
"#,
        );
        match kml_to_feature_collection(&kml) {
            Err(KmlError::Coordinate { placemark, value }) => {
                assert_eq!((placemark, value.as_str()), (1, "east,1"));
            }
            other => panic!("expected a coordinate error, got {other:?}"),
        }
        assert!(matches!(
            kml_to_feature_collection("<kml><Placemark>"),
            Err(KmlError::Xml(_))
        ));
    }

    #[test]
    fn colors_swap_byte_order() {
        assert_eq!(rgb_and_opacity("ee001122"), ("#221100".to_string(), 0.93));
        assert_eq!(rgb_and_opacity("#001122"), ("#221100".to_string(), 1.0));
        assert_eq!(rgb_and_opacity("abc"), ("#cba".to_string(), 1.0));
        assert_eq!(rgb_and_opacity("nope"), ("#000000".to_string(), 1.0));
    }
}
