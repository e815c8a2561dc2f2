pub mod layer;
pub mod loader;
pub mod overlay;
pub mod popup;

pub use layer::*;
pub use loader::{Fetch, FetchError, LoadOutcome, LoadPolicy, OverlayLoader};
pub use overlay::{
    ApplyOutcome, MapError, MapSurface, OverlayError, OverlayFeature, OverlayLayer, OverlayManager,
};
pub use popup::{build_popup_content, popup_lines, render_value};
