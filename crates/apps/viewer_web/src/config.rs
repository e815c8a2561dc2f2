use layers::LoadPolicy;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid viewer config: {0}")]
    Json(#[from] serde_json::Error),
}

/// Page-level settings. Every field has a default, so `{}` is a valid config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ViewerConfig {
    pub map_element_id: String,
    pub form_id: String,
    pub input_id: String,
    /// Optional element that receives load results; ignored when absent from the page.
    pub status_element_id: String,
    pub initial_view: InitialView,
    pub tile_layer: TileLayerConfig,
    pub locate: LocateControlOptions,
    pub load_policy: LoadPolicy,
    /// `tracing` filter directives, e.g. `info` or `info,layers=debug`.
    pub log_level: String,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            map_element_id: "map".to_string(),
            form_id: "url-input".to_string(),
            input_id: "geojson-endpoint".to_string(),
            status_element_id: "geojson-status".to_string(),
            initial_view: InitialView::default(),
            tile_layer: TileLayerConfig::default(),
            locate: LocateControlOptions::default(),
            load_policy: LoadPolicy::default(),
            log_level: "info".to_string(),
        }
    }
}

impl ViewerConfig {
    pub fn from_json(payload: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(payload)?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InitialView {
    /// `[lat, lng]`
    pub center: [f64; 2],
    pub zoom: f64,
}

impl Default for InitialView {
    fn default() -> Self {
        Self {
            center: [0.0, 0.0],
            zoom: 3.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TileLayerConfig {
    pub url_template: String,
    pub attribution: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_zoom: Option<u8>,
}

impl Default for TileLayerConfig {
    fn default() -> Self {
        Self {
            url_template: "http://{s}.tile.osm.org/{z}/{x}/{y}.png".to_string(),
            attribution:
                "&copy; <a href=\"http://osm.org/copyright\">OpenStreetMap</a> contributors"
                    .to_string(),
            max_zoom: None,
        }
    }
}

/// Options handed to the locate control plugin as-is.
///
/// Serializes to the plugin's camelCase option object. `markerClass` names a
/// Leaflet factory (`circleMarker` or `marker`) and is swapped for the
/// function itself before the control is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LocateControlOptions {
    pub position: String,
    pub draw_circle: bool,
    pub follow: bool,
    pub set_view: bool,
    pub keep_current_zoom_level: bool,
    pub stop_following_on_drag: bool,
    pub remain_active: bool,
    pub marker_class: String,
    pub circle_style: Map<String, Value>,
    pub marker_style: Map<String, Value>,
    pub follow_circle_style: Map<String, Value>,
    pub follow_marker_style: Map<String, Value>,
    pub icon: String,
    pub icon_loading: String,
    pub circle_padding: [f64; 2],
    pub metric: bool,
    pub show_popup: bool,
    pub strings: LocateStrings,
    pub locate_options: Map<String, Value>,
}

impl Default for LocateControlOptions {
    fn default() -> Self {
        Self {
            position: "topleft".to_string(),
            draw_circle: true,
            follow: false,
            set_view: true,
            keep_current_zoom_level: false,
            stop_following_on_drag: false,
            remain_active: false,
            marker_class: "circleMarker".to_string(),
            circle_style: Map::new(),
            marker_style: Map::new(),
            follow_circle_style: Map::new(),
            follow_marker_style: Map::new(),
            icon: "fa fa-map-marker".to_string(),
            icon_loading: "fa fa-spinner fa-spin".to_string(),
            circle_padding: [0.0, 0.0],
            metric: true,
            show_popup: true,
            strings: LocateStrings::default(),
            locate_options: Map::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LocateStrings {
    pub title: String,
    pub meters_unit: String,
    pub feet_unit: String,
    /// `{distance}` and `{unit}` are filled in by the plugin.
    pub popup: String,
    pub outside_map_bounds_msg: String,
}

impl Default for LocateStrings {
    fn default() -> Self {
        Self {
            title: "Show me where I am".to_string(),
            meters_unit: "meters".to_string(),
            feet_unit: "feet".to_string(),
            popup: "You are within {distance} {unit} from this point".to_string(),
            outside_map_bounds_msg: "You seem located outside the boundaries of the map"
                .to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{LocateControlOptions, ViewerConfig};
    use layers::LoadPolicy;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_object_is_default() {
        let cfg = ViewerConfig::from_json("{}").expect("parse");
        assert_eq!(cfg, ViewerConfig::default());
        assert_eq!(cfg.input_id, "geojson-endpoint");
        assert_eq!(cfg.form_id, "url-input");
        assert_eq!(cfg.initial_view.zoom, 3.0);
        assert_eq!(cfg.load_policy, LoadPolicy::LastResolved);
    }

    #[test]
    fn partial_override_keeps_other_defaults() {
        let cfg = ViewerConfig::from_json(
            r#"{
                "loadPolicy": "latest_submitted",
                "initialView": {"zoom": 11},
                "locate": {"metric": false, "strings": {"title": "Find me"}}
            }"#,
        )
        .expect("parse");
        assert_eq!(cfg.load_policy, LoadPolicy::LatestSubmitted);
        assert_eq!(cfg.initial_view.zoom, 11.0);
        assert_eq!(cfg.initial_view.center, [0.0, 0.0]);
        assert!(!cfg.locate.metric);
        assert_eq!(cfg.locate.strings.title, "Find me");
        assert_eq!(cfg.locate.strings.feet_unit, "feet");
        assert_eq!(cfg.locate.position, "topleft");
    }

    #[test]
    fn invalid_json_is_an_error() {
        let err = ViewerConfig::from_json(r#"{"initialView": {"zoom": "far"}}"#).unwrap_err();
        assert!(err.to_string().starts_with("invalid viewer config"));
    }

    #[test]
    fn locate_options_serialize_with_plugin_names() {
        let value = serde_json::to_value(LocateControlOptions::default()).expect("serialize");
        assert_eq!(value["drawCircle"], true);
        assert_eq!(value["keepCurrentZoomLevel"], false);
        assert_eq!(value["markerClass"], "circleMarker");
        assert_eq!(value["circlePadding"], serde_json::json!([0.0, 0.0]));
        assert_eq!(
            value["strings"]["outsideMapBoundsMsg"],
            "You seem located outside the boundaries of the map"
        );
        assert!(value["locateOptions"].as_object().is_some_and(|o| o.is_empty()));
    }
}
