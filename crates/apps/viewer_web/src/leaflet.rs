//! Bindings to the Leaflet global `L` and the locate-control plugin.

use foundation::Aabb2;
use js_sys::{Function, Object, Reflect};
use layers::{MapError, MapSurface, OverlayLayer};
use serde::Serialize;
use tracing::{debug, warn};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;

use crate::config::{LocateControlOptions, TileLayerConfig, ViewerConfig};

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_namespace = L, js_name = Map)]
    pub type Map;

    #[wasm_bindgen(catch, js_namespace = L, js_name = map)]
    fn new_map(element_id: &str) -> Result<Map, JsValue>;

    #[wasm_bindgen(method, js_name = setView)]
    fn set_view(this: &Map, center: &JsValue, zoom: f64) -> Map;

    #[wasm_bindgen(method, js_name = fitBounds)]
    fn fit_bounds(this: &Map, bounds: &JsValue) -> Map;

    #[wasm_bindgen(method, js_name = removeLayer)]
    fn remove_layer(this: &Map, layer: &Layer) -> Map;

    #[wasm_bindgen(js_namespace = L, js_name = Layer)]
    pub type Layer;

    #[wasm_bindgen(catch, method, js_name = addTo)]
    fn add_to(this: &Layer, map: &Map) -> Result<Layer, JsValue>;

    #[wasm_bindgen(method, js_name = bindPopup)]
    fn bind_popup(this: &Layer, content: &str) -> Layer;

    #[wasm_bindgen(js_namespace = L, js_name = FeatureGroup, extends = Layer)]
    pub type FeatureGroup;

    #[wasm_bindgen(js_namespace = L, js_name = featureGroup)]
    fn feature_group() -> FeatureGroup;

    #[wasm_bindgen(method, js_name = addLayer)]
    fn add_layer(this: &FeatureGroup, layer: &Layer) -> FeatureGroup;

    #[wasm_bindgen(js_namespace = L, js_name = LayerGroup, extends = Layer)]
    pub type LayerGroup;

    #[wasm_bindgen(js_namespace = L, js_name = layerGroup)]
    fn layer_group() -> LayerGroup;

    #[wasm_bindgen(catch, js_namespace = L, js_name = geoJSON)]
    fn geo_json(data: &JsValue) -> Result<Layer, JsValue>;

    #[wasm_bindgen(js_namespace = L, js_name = tileLayer)]
    fn tile_layer(url_template: &str, options: &JsValue) -> Layer;

    #[wasm_bindgen(js_namespace = L, js_name = Control)]
    pub type Control;

    #[wasm_bindgen(catch, js_namespace = ["L", "control"], js_name = locate)]
    fn locate_control(options: &JsValue) -> Result<Control, JsValue>;

    #[wasm_bindgen(method, js_name = addTo)]
    fn add_control_to(this: &Control, map: &Map) -> Control;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TileLayerOptions<'a> {
    attribution: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_zoom: Option<u8>,
}

/// Creates the map in `config.map_element_id` with its base layer and locate control.
pub fn create_map(config: &ViewerConfig) -> Result<Map, JsValue> {
    let map = new_map(&config.map_element_id)?;
    map.set_view(&to_js(&config.initial_view.center)?, config.initial_view.zoom);
    add_tile_layer(&map, &config.tile_layer)?;
    add_locate_control(&map, &config.locate)?;
    debug!(element = %config.map_element_id, "map created");
    Ok(map)
}

fn add_tile_layer(map: &Map, tiles: &TileLayerConfig) -> Result<(), JsValue> {
    let options = to_js(&TileLayerOptions {
        attribution: &tiles.attribution,
        max_zoom: tiles.max_zoom,
    })?;
    tile_layer(&tiles.url_template, &options).add_to(map)?;
    Ok(())
}

fn add_locate_control(map: &Map, locate: &LocateControlOptions) -> Result<(), JsValue> {
    let options = to_js(locate)?;

    match leaflet_factory(&locate.marker_class) {
        Some(factory) => {
            Reflect::set(&options, &"markerClass".into(), &factory)?;
        }
        None => {
            warn!(marker_class = %locate.marker_class, "unknown marker class, using plugin default");
            Reflect::delete_property(options.unchecked_ref::<Object>(), &"markerClass".into())?;
        }
    }
    Reflect::set(&options, &"layer".into(), &layer_group())?;

    let on_error = Closure::<dyn Fn(JsValue)>::new(|err: JsValue| {
        let message = Reflect::get(&err, &"message".into())
            .ok()
            .and_then(|m| m.as_string())
            .unwrap_or_else(|| "Location unavailable".to_string());
        warn!("locate failed: {message}");
        alert(&message);
    });
    let outside_msg = locate.strings.outside_map_bounds_msg.clone();
    let on_outside = Closure::<dyn Fn(JsValue)>::new(move |_control: JsValue| {
        alert(&outside_msg);
    });
    Reflect::set(&options, &"onLocationError".into(), on_error.as_ref())?;
    Reflect::set(&options, &"onLocationOutsideMapBounds".into(), on_outside.as_ref())?;
    // The control keeps calling these for the life of the page.
    on_error.forget();
    on_outside.forget();

    locate_control(&options)?.add_control_to(map);
    Ok(())
}

/// Looks up `L[name]` and returns it if it is callable.
fn leaflet_factory(name: &str) -> Option<JsValue> {
    let leaflet = Reflect::get(&js_sys::global(), &"L".into()).ok()?;
    let factory = Reflect::get(&leaflet, &JsValue::from_str(name)).ok()?;
    factory.is_instance_of::<Function>().then_some(factory)
}

fn alert(message: &str) {
    if let Some(window) = web_sys::window() {
        let _ = window.alert_with_message(message);
    }
}

fn to_js<T: Serialize + ?Sized>(value: &T) -> Result<JsValue, JsValue> {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(JsValue::from)
}

fn js_message(value: &JsValue) -> String {
    value
        .dyn_ref::<js_sys::Error>()
        .map(|e| String::from(e.message()))
        .or_else(|| value.as_string())
        .unwrap_or_else(|| format!("{value:?}"))
}

/// A Leaflet map as an overlay target.
///
/// Each overlay becomes one feature group holding a `L.geoJSON` layer per
/// feature, with that feature's popup bound to it.
pub struct LeafletSurface {
    map: Map,
}

impl LeafletSurface {
    pub fn new(map: Map) -> Self {
        Self { map }
    }
}

impl MapSurface for LeafletSurface {
    type Handle = FeatureGroup;

    fn attach(&mut self, layer: &OverlayLayer) -> Result<FeatureGroup, MapError> {
        let group = feature_group();
        for item in layer.features() {
            let data = to_js(&item.feature.to_geojson_value())
                .map_err(|e| MapError(js_message(&e)))?;
            let child = geo_json(&data).map_err(|e| MapError(js_message(&e)))?;
            child.bind_popup(&item.popup);
            group.add_layer(&child);
        }
        group
            .add_to(&self.map)
            .map_err(|e| MapError(js_message(&e)))?;
        Ok(group)
    }

    fn detach(&mut self, handle: FeatureGroup) {
        self.map.remove_layer(&handle);
    }

    fn fit_bounds(&mut self, bounds: Aabb2) {
        match to_js(&bounds.to_lat_lng_corners()) {
            Ok(corners) => {
                self.map.fit_bounds(&corners);
            }
            Err(e) => warn!("could not fit bounds: {}", js_message(&e)),
        }
    }
}
