use layers::{ApplyOutcome, LoadOutcome, OverlayError};

/// Text for the status line after a load, or `None` to leave it as is.
pub fn status_message(url: &str, result: &Result<LoadOutcome, OverlayError>) -> Option<String> {
    match result {
        Ok(LoadOutcome::Applied(ApplyOutcome::Replaced { features, .. })) => {
            let noun = if *features == 1 { "feature" } else { "features" };
            Some(format!("Loaded {features} {noun} from {url}"))
        }
        Ok(LoadOutcome::Applied(ApplyOutcome::Unchanged)) => {
            Some(format!("{url} returned no data; map unchanged"))
        }
        Ok(LoadOutcome::Superseded { .. }) => None,
        Err(e) => Some(format!("Could not load {url}: {e}")),
    }
}

pub fn cleared_message(features: usize) -> String {
    let noun = if features == 1 { "feature" } else { "features" };
    format!("Overlay cleared ({features} {noun})")
}

/// Writes to an optional page element; missing elements are ignored.
#[derive(Debug, Clone)]
pub struct StatusLine {
    element_id: String,
}

impl StatusLine {
    pub fn new(element_id: impl Into<String>) -> Self {
        Self {
            element_id: element_id.into(),
        }
    }

    pub fn report(&self, url: &str, result: &Result<LoadOutcome, OverlayError>) {
        if let Some(text) = status_message(url, result) {
            self.set_text(&text);
        }
    }

    pub fn set_text(&self, text: &str) {
        let element = web_sys::window()
            .and_then(|w| w.document())
            .and_then(|d| d.get_element_by_id(&self.element_id));
        if let Some(element) = element {
            element.set_text_content(Some(text));
        }
    }
}
