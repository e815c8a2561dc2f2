use console_error_panic_hook::set_once;
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{info, warn};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;
use web_sys::{Document, Event, HtmlInputElement};

use layers::{OverlayLoader, OverlayManager};

pub mod config;
mod fetch;
mod leaflet;
mod logging;
mod status;

pub use config::{ConfigError, LocateControlOptions, ViewerConfig};
pub use status::{cleared_message, status_message};

use fetch::HttpFetcher;
use leaflet::LeafletSurface;
use status::StatusLine;

type Loader = OverlayLoader<LeafletSurface, HttpFetcher>;

struct Viewer {
    loader: Rc<Loader>,
    status: StatusLine,
}

thread_local! {
    static STATE: RefCell<Option<Viewer>> = const { RefCell::new(None) };
}

#[wasm_bindgen(start)]
pub fn start() -> Result<(), JsValue> {
    set_once();
    Ok(())
}

/// Builds the map and wires the URL form.
///
/// `config_json` is an optional [`ViewerConfig`] as JSON; omitted fields take
/// their defaults. Call once per page.
#[wasm_bindgen]
pub fn mount_viewer(config_json: Option<String>) -> Result<(), JsValue> {
    let config = match config_json.as_deref() {
        Some(json) => ViewerConfig::from_json(json),
        None => Ok(ViewerConfig::default()),
    }
    .map_err(|e| JsValue::from_str(&e.to_string()))?;
    logging::init(&config.log_level);

    let map = leaflet::create_map(&config)?;
    let manager = Rc::new(RefCell::new(OverlayManager::new(LeafletSurface::new(map))));
    let loader = Rc::new(OverlayLoader::new(manager, HttpFetcher, config.load_policy));
    let status = StatusLine::new(config.status_element_id.clone());

    wire_form(&config, Rc::clone(&loader), status.clone())?;
    info!(policy = ?loader.policy(), "viewer mounted");
    STATE.with(|state| *state.borrow_mut() = Some(Viewer { loader, status }));
    Ok(())
}

/// Loads `url` into the overlay slot, as if it had been submitted in the form.
#[wasm_bindgen]
pub fn show_overlay(url: String) -> Result<(), JsValue> {
    let (loader, status) = STATE.with(|state| {
        state
            .borrow()
            .as_ref()
            .map(|v| (Rc::clone(&v.loader), v.status.clone()))
    })
    .ok_or_else(not_mounted)?;
    spawn_load(loader, status, url);
    Ok(())
}

/// Removes the current overlay. Returns `false` when there was none.
#[wasm_bindgen]
pub fn clear_overlay() -> Result<bool, JsValue> {
    STATE.with(|state| {
        let state = state.borrow();
        let viewer = state.as_ref().ok_or_else(not_mounted)?;
        let mut manager = viewer.loader.manager().borrow_mut();
        let features = manager.current_feature_count();
        let cleared = manager.clear();
        if let Some(features) = features.filter(|_| cleared) {
            viewer.status.set_text(&cleared_message(features));
        }
        Ok(cleared)
    })
}

fn not_mounted() -> JsValue {
    JsValue::from_str("viewer not mounted; call mount_viewer first")
}

fn spawn_load(loader: Rc<Loader>, status: StatusLine, url: String) {
    spawn_local(async move {
        let result = loader.load(&url).await;
        status.report(&url, &result);
    });
}

fn document() -> Result<Document, JsValue> {
    web_sys::window()
        .and_then(|w| w.document())
        .ok_or_else(|| JsValue::from_str("no document"))
}

fn wire_form(config: &ViewerConfig, loader: Rc<Loader>, status: StatusLine) -> Result<(), JsValue> {
    let form = document()?
        .get_element_by_id(&config.form_id)
        .ok_or_else(|| JsValue::from_str(&format!("missing form #{}", config.form_id)))?;
    let input_id = config.input_id.clone();

    let on_submit = Closure::<dyn FnMut(Event)>::new(move |event: Event| {
        event.prevent_default();
        match read_input(&input_id) {
            Some(url) => {
                info!(%url, "overlay requested");
                spawn_load(Rc::clone(&loader), status.clone(), url);
            }
            None => warn!(input = %input_id, "endpoint input not found"),
        }
    });
    form.add_event_listener_with_callback("submit", on_submit.as_ref().unchecked_ref())?;
    // Lives as long as the page.
    on_submit.forget();
    Ok(())
}

fn read_input(id: &str) -> Option<String> {
    document()
        .ok()?
        .get_element_by_id(id)?
        .dyn_into::<HtmlInputElement>()
        .ok()
        .map(|input| input.value())
}
