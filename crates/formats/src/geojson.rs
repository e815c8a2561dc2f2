use foundation::Aabb2;
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub lon_deg: f64,
    pub lat_deg: f64,
}

impl GeoPoint {
    pub fn new(lon_deg: f64, lat_deg: f64) -> Self {
        Self { lon_deg, lat_deg }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Point(GeoPoint),
    MultiPoint(Vec<GeoPoint>),
    LineString(Vec<GeoPoint>),
    MultiLineString(Vec<Vec<GeoPoint>>),
    Polygon(Vec<Vec<GeoPoint>>),
    MultiPolygon(Vec<Vec<Vec<GeoPoint>>>),
    GeometryCollection(Vec<Geometry>),
}

impl Geometry {
    pub fn type_name(&self) -> &'static str {
        match self {
            Geometry::Point(_) => "Point",
            Geometry::MultiPoint(_) => "MultiPoint",
            Geometry::LineString(_) => "LineString",
            Geometry::MultiLineString(_) => "MultiLineString",
            Geometry::Polygon(_) => "Polygon",
            Geometry::MultiPolygon(_) => "MultiPolygon",
            Geometry::GeometryCollection(_) => "GeometryCollection",
        }
    }

    pub fn for_each_point(&self, f: &mut impl FnMut(&GeoPoint)) {
        match self {
            Geometry::Point(p) => f(p),
            Geometry::MultiPoint(ps) | Geometry::LineString(ps) => ps.iter().for_each(f),
            Geometry::MultiLineString(lines) | Geometry::Polygon(lines) => {
                lines.iter().flatten().for_each(f)
            }
            Geometry::MultiPolygon(polys) => polys.iter().flatten().flatten().for_each(f),
            Geometry::GeometryCollection(geoms) => {
                for g in geoms {
                    g.for_each_point(f);
                }
            }
        }
    }

    pub fn bounds(&self) -> Option<Aabb2> {
        let mut out: Option<Aabb2> = None;
        self.for_each_point(&mut |p| match &mut out {
            Some(b) => b.extend(p.lon_deg, p.lat_deg),
            None => out = Some(Aabb2::from_point(p.lon_deg, p.lat_deg)),
        });
        out
    }

    pub fn to_geojson_value(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("type".to_string(), Value::from(self.type_name()));
        match self {
            Geometry::Point(p) => {
                obj.insert("coordinates".to_string(), point_coords(p));
            }
            Geometry::MultiPoint(ps) | Geometry::LineString(ps) => {
                obj.insert("coordinates".to_string(), points_coords(ps));
            }
            Geometry::MultiLineString(lines) | Geometry::Polygon(lines) => {
                let coords = lines.iter().map(|l| points_coords(l)).collect();
                obj.insert("coordinates".to_string(), Value::Array(coords));
            }
            Geometry::MultiPolygon(polys) => {
                let coords = polys
                    .iter()
                    .map(|poly| Value::Array(poly.iter().map(|r| points_coords(r)).collect()))
                    .collect();
                obj.insert("coordinates".to_string(), Value::Array(coords));
            }
            Geometry::GeometryCollection(geoms) => {
                let geoms = geoms.iter().map(Geometry::to_geojson_value).collect();
                obj.insert("geometries".to_string(), Value::Array(geoms));
            }
        }
        Value::Object(obj)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub id: Option<Value>,
    /// Free-form properties in document order. Absent or `null` maps to empty.
    pub properties: Map<String, Value>,
    /// `None` for features whose geometry is `null`.
    pub geometry: Option<Geometry>,
}

impl Feature {
    pub fn from_geometry(geometry: Geometry) -> Self {
        Self {
            id: None,
            properties: Map::new(),
            geometry: Some(geometry),
        }
    }

    pub fn bounds(&self) -> Option<Aabb2> {
        self.geometry.as_ref().and_then(Geometry::bounds)
    }

    pub fn to_geojson_value(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("type".to_string(), Value::from("Feature"));
        if let Some(id) = &self.id {
            obj.insert("id".to_string(), id.clone());
        }
        obj.insert(
            "properties".to_string(),
            Value::Object(self.properties.clone()),
        );
        obj.insert(
            "geometry".to_string(),
            self.geometry
                .as_ref()
                .map(Geometry::to_geojson_value)
                .unwrap_or(Value::Null),
        );
        Value::Object(obj)
    }
}

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("expected a GeoJSON object, found {0}")]
    NotAnObject(&'static str),
    #[error("unsupported GeoJSON type: {0}")]
    UnsupportedType(String),
    #[error("GeoJSON object missing type")]
    MissingType,
    #[error("FeatureCollection missing features array")]
    MissingFeatures,
    #[error("invalid feature at index {index}: {reason}")]
    InvalidFeature { index: usize, reason: String },
}

/// A parsed GeoJSON payload, normalized to a list of features.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeoJsonDocument {
    pub features: Vec<Feature>,
}

impl GeoJsonDocument {
    pub fn new(features: Vec<Feature>) -> Self {
        Self { features }
    }

    /// Accepts a FeatureCollection, a single Feature or a bare geometry.
    pub fn from_geojson_str(payload: &str) -> Result<Self, DocumentError> {
        let value: Value = serde_json::from_str(payload)?;
        Self::from_geojson_value(value)
    }

    pub fn from_geojson_value(value: Value) -> Result<Self, DocumentError> {
        let obj = match value {
            Value::Object(obj) => obj,
            other => return Err(DocumentError::NotAnObject(json_kind(&other))),
        };
        let ty = obj
            .get("type")
            .and_then(Value::as_str)
            .ok_or(DocumentError::MissingType)?;

        match ty {
            "FeatureCollection" => {
                let features_val = obj
                    .get("features")
                    .and_then(Value::as_array)
                    .ok_or(DocumentError::MissingFeatures)?;
                let mut features = Vec::with_capacity(features_val.len());
                for (index, feat_val) in features_val.iter().enumerate() {
                    let feature = parse_feature(feat_val)
                        .map_err(|reason| DocumentError::InvalidFeature { index, reason })?;
                    features.push(feature);
                }
                Ok(Self { features })
            }
            "Feature" => {
                let feature = parse_feature_object(&obj)
                    .map_err(|reason| DocumentError::InvalidFeature { index: 0, reason })?;
                Ok(Self {
                    features: vec![feature],
                })
            }
            _ if is_geometry_type(ty) => {
                let geometry = parse_geometry_object(&obj)
                    .map_err(|reason| DocumentError::InvalidFeature { index: 0, reason })?;
                Ok(Self {
                    features: vec![Feature::from_geometry(geometry)],
                })
            }
            other => Err(DocumentError::UnsupportedType(other.to_string())),
        }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Bounds over every coordinate in the document, or `None` when nothing has a position.
    pub fn bounds(&self) -> Option<Aabb2> {
        self.features
            .iter()
            .filter_map(Feature::bounds)
            .reduce(Aabb2::union)
    }

    pub fn to_geojson_value(&self) -> Value {
        let mut root = Map::new();
        root.insert("type".to_string(), Value::from("FeatureCollection"));
        root.insert(
            "features".to_string(),
            Value::Array(self.features.iter().map(Feature::to_geojson_value).collect()),
        );
        Value::Object(root)
    }

    pub fn to_geojson_string_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.to_geojson_value())
    }
}

pub const GEOMETRY_TYPES: [&str; 7] = [
    "Point",
    "LineString",
    "Polygon",
    "MultiPoint",
    "MultiLineString",
    "MultiPolygon",
    "GeometryCollection",
];

pub fn is_geometry_type(ty: &str) -> bool {
    GEOMETRY_TYPES.contains(&ty)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn parse_feature(value: &Value) -> Result<Feature, String> {
    let obj = value
        .as_object()
        .ok_or("feature must be an object".to_string())?;
    parse_feature_object(obj)
}

fn parse_feature_object(obj: &Map<String, Value>) -> Result<Feature, String> {
    let ty = obj
        .get("type")
        .and_then(Value::as_str)
        .ok_or("feature missing type".to_string())?;
    if ty != "Feature" {
        return Err(format!("unexpected feature type: {ty}"));
    }

    let id = obj.get("id").filter(|v| !v.is_null()).cloned();

    let properties = obj
        .get("properties")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();

    let geometry = match obj.get("geometry") {
        None => return Err("feature missing geometry".to_string()),
        Some(Value::Null) => None,
        Some(Value::Object(g)) => Some(parse_geometry_object(g)?),
        Some(_) => return Err("geometry must be an object or null".to_string()),
    };

    Ok(Feature {
        id,
        properties,
        geometry,
    })
}

fn parse_geometry_object(obj: &Map<String, Value>) -> Result<Geometry, String> {
    let ty = obj
        .get("type")
        .and_then(Value::as_str)
        .ok_or("geometry missing type".to_string())?;

    if ty == "GeometryCollection" {
        let geoms = obj
            .get("geometries")
            .and_then(Value::as_array)
            .ok_or("GeometryCollection missing geometries".to_string())?;
        let mut out = Vec::with_capacity(geoms.len());
        for g in geoms {
            let g = g
                .as_object()
                .ok_or("geometry must be an object".to_string())?;
            out.push(parse_geometry_object(g)?);
        }
        return Ok(Geometry::GeometryCollection(out));
    }

    let coords = obj
        .get("coordinates")
        .ok_or("geometry missing coordinates".to_string())?;

    match ty {
        "Point" => Ok(Geometry::Point(parse_point(coords)?)),
        "MultiPoint" => Ok(Geometry::MultiPoint(parse_points(coords)?)),
        "LineString" => Ok(Geometry::LineString(parse_points(coords)?)),
        "MultiLineString" => Ok(Geometry::MultiLineString(parse_rings(coords)?)),
        "Polygon" => Ok(Geometry::Polygon(parse_rings(coords)?)),
        "MultiPolygon" => Ok(Geometry::MultiPolygon(parse_multi_polygon(coords)?)),
        other => Err(format!("unsupported geometry type: {other}")),
    }
}

fn parse_point(coords: &Value) -> Result<GeoPoint, String> {
    let arr = coords
        .as_array()
        .ok_or("position must be an array".to_string())?;
    // A third element (altitude) is allowed and ignored.
    if arr.len() < 2 {
        return Err("position must have [lon, lat]".to_string());
    }
    let lon = arr[0]
        .as_f64()
        .ok_or("position lon must be a number".to_string())?;
    let lat = arr[1]
        .as_f64()
        .ok_or("position lat must be a number".to_string())?;
    Ok(GeoPoint::new(lon, lat))
}

fn parse_points(coords: &Value) -> Result<Vec<GeoPoint>, String> {
    let arr = coords
        .as_array()
        .ok_or("coordinates must be an array of positions".to_string())?;
    arr.iter().map(parse_point).collect()
}

fn parse_rings(coords: &Value) -> Result<Vec<Vec<GeoPoint>>, String> {
    let arr = coords
        .as_array()
        .ok_or("coordinates must be an array of position lists".to_string())?;
    arr.iter().map(parse_points).collect()
}

fn parse_multi_polygon(coords: &Value) -> Result<Vec<Vec<Vec<GeoPoint>>>, String> {
    let polys = coords
        .as_array()
        .ok_or("MultiPolygon coordinates must be an array of polygons".to_string())?;
    polys.iter().map(parse_rings).collect()
}

fn point_coords(p: &GeoPoint) -> Value {
    Value::Array(vec![Value::from(p.lon_deg), Value::from(p.lat_deg)])
}

fn points_coords(ps: &[GeoPoint]) -> Value {
    Value::Array(ps.iter().map(point_coords).collect())
}

#[cfg(test)]
mod tests {
    use super::{DocumentError, GeoJsonDocument, GeoPoint, Geometry};
    use foundation::Aabb2;
    use pretty_assertions::assert_eq;

    const TWO_FEATURES: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {"type": "Feature", "properties": {"name": "a", "rank": 1},
             "geometry": {"type": "Point", "coordinates": [-0.12, 51.5]}},
            {"type": "Feature", "properties": null,
             "geometry": {"type": "LineString", "coordinates": [[2.35, 48.85, 35.0], [4.9, 52.37]]}}
        ]
    }"#;

    #[test]
    fn parses_feature_collection() {
        let doc = GeoJsonDocument::from_geojson_str(TWO_FEATURES).expect("parse");
        assert_eq!(doc.len(), 2);
        assert_eq!(
            doc.features[0].geometry,
            Some(Geometry::Point(GeoPoint::new(-0.12, 51.5)))
        );
        assert!(doc.features[1].properties.is_empty());
        assert_eq!(
            doc.bounds(),
            Some(Aabb2::new([-0.12, 48.85], [4.9, 52.37]))
        );
    }

    #[test]
    fn keeps_property_order() {
        let doc = GeoJsonDocument::from_geojson_str(
            r#"{"type":"Feature","properties":{"zeta":1,"alpha":2,"mid":3},"geometry":null}"#,
        )
        .expect("parse");
        let keys: Vec<&str> = doc.features[0]
            .properties
            .keys()
            .map(String::as_str)
            .collect();
        assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
        assert!(doc.features[0].geometry.is_none());
        assert!(doc.bounds().is_none());
    }

    #[test]
    fn bare_geometry_becomes_one_feature() {
        let doc = GeoJsonDocument::from_geojson_str(
            r#"{"type":"GeometryCollection","geometries":[
                {"type":"Point","coordinates":[1,1]},
                {"type":"Polygon","coordinates":[[[0,0],[3,0],[3,2],[0,0]]]}
            ]}"#,
        )
        .expect("parse");
        assert_eq!(doc.len(), 1);
        assert!(doc.features[0].properties.is_empty());
        assert_eq!(doc.bounds(), Some(Aabb2::new([0.0, 0.0], [3.0, 2.0])));
    }

    #[test]
    fn rejects_non_geojson() {
        assert!(matches!(
            GeoJsonDocument::from_geojson_str("not json"),
            Err(DocumentError::Json(_))
        ));
        assert!(matches!(
            GeoJsonDocument::from_geojson_str("[1, 2]"),
            Err(DocumentError::NotAnObject(_))
        ));
        assert!(matches!(
            GeoJsonDocument::from_geojson_str(r#"{"type":"Topology"}"#),
            Err(DocumentError::UnsupportedType(_))
        ));
        let err = GeoJsonDocument::from_geojson_str(
            r#"{"type":"FeatureCollection","features":[{"type":"Feature","properties":{}}]}"#,
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid feature at index 0: feature missing geometry"
        );
    }

    #[test]
    fn exports_feature_collection() {
        let doc = GeoJsonDocument::from_geojson_str(TWO_FEATURES).expect("parse");
        let reparsed = GeoJsonDocument::from_geojson_value(doc.to_geojson_value()).expect("reparse");
        assert_eq!(reparsed.features[0], doc.features[0]);
    }
}
