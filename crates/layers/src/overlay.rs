use foundation::Aabb2;
use formats::{DocumentError, Feature, GeoJsonDocument};
use thiserror::Error;
use tracing::{debug, error, info};

use crate::layer::{Layer, LayerId};
use crate::popup::build_popup_content;

/// A feature plus the popup content bound to it.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayFeature {
    pub feature: Feature,
    pub popup: String,
}

/// The renderable form of one fetched GeoJSON document.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayLayer {
    id: LayerId,
    features: Vec<OverlayFeature>,
    bounds: Option<Aabb2>,
}

impl OverlayLayer {
    /// Features with a `null` geometry have nothing to draw and are left out.
    pub fn from_document(id: LayerId, doc: GeoJsonDocument) -> Self {
        let total = doc.features.len();
        let features: Vec<OverlayFeature> = doc
            .features
            .into_iter()
            .filter(|f| f.geometry.is_some())
            .map(|feature| {
                let popup = build_popup_content(&feature);
                OverlayFeature { feature, popup }
            })
            .collect();
        if features.len() < total {
            debug!(
                %id,
                skipped = total - features.len(),
                "skipped features without geometry"
            );
        }
        let bounds = features
            .iter()
            .filter_map(|f| f.feature.bounds())
            .reduce(Aabb2::union);
        Self {
            id,
            features,
            bounds,
        }
    }

    pub fn features(&self) -> &[OverlayFeature] {
        &self.features
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn bounds(&self) -> Option<Aabb2> {
        self.bounds
    }
}

impl Layer for OverlayLayer {
    fn id(&self) -> LayerId {
        self.id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("map rejected overlay: {0}")]
pub struct MapError(pub String);

/// The map widget as seen by the overlay manager.
///
/// Rendering, projection and popup display all live behind this seam.
pub trait MapSurface {
    /// Whatever the map hands back for an attached layer.
    type Handle;

    fn attach(&mut self, layer: &OverlayLayer) -> Result<Self::Handle, MapError>;
    fn detach(&mut self, handle: Self::Handle);
    fn fit_bounds(&mut self, bounds: Aabb2);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Empty body: nothing was touched.
    Unchanged,
    Replaced {
        layer: LayerId,
        features: usize,
        /// `false` when the layer had no positions to frame.
        fitted: bool,
    },
}

#[derive(Debug)]
struct ActiveOverlay<H> {
    id: LayerId,
    features: usize,
    handle: H,
}

/// Owns the single overlay slot on a map.
///
/// At most one overlay is attached at a time; the old one is detached before
/// the new one is attached, and the viewport is fitted only after attach.
#[derive(Debug)]
pub struct OverlayManager<M: MapSurface> {
    map: M,
    current: Option<ActiveOverlay<M::Handle>>,
    next_id: u64,
}

impl<M: MapSurface> OverlayManager<M> {
    pub fn new(map: M) -> Self {
        Self {
            map,
            current: None,
            next_id: 1,
        }
    }

    pub fn map(&self) -> &M {
        &self.map
    }

    pub fn map_mut(&mut self) -> &mut M {
        &mut self.map
    }

    pub fn current_layer(&self) -> Option<LayerId> {
        self.current.as_ref().map(|c| c.id)
    }

    pub fn current_feature_count(&self) -> Option<usize> {
        self.current.as_ref().map(|c| c.features)
    }

    /// Applies a fetched response body.
    ///
    /// A missing or zero-length body leaves everything as it was. Any other
    /// body is parsed; one that does not parse (whitespace included) is an
    /// error and also leaves everything as it was.
    pub fn apply_body(&mut self, body: Option<&str>) -> Result<ApplyOutcome, OverlayError> {
        let Some(body) = body.filter(|b| !b.is_empty()) else {
            debug!("empty response body, overlay unchanged");
            return Ok(ApplyOutcome::Unchanged);
        };
        let doc = GeoJsonDocument::from_geojson_str(body)?;
        self.replace(doc)
    }

    pub fn replace(&mut self, doc: GeoJsonDocument) -> Result<ApplyOutcome, OverlayError> {
        let id = LayerId(self.next_id);
        self.next_id += 1;
        let layer = OverlayLayer::from_document(id, doc);
        if layer.is_empty() {
            debug!(%id, "overlay has no drawable features");
        }

        if let Some(previous) = self.current.take() {
            debug!(layer = %previous.id, "detaching previous overlay");
            self.map.detach(previous.handle);
        }

        let handle = self.map.attach(&layer).map_err(|e| {
            error!(%id, "attach failed: {e}");
            e
        })?;
        self.current = Some(ActiveOverlay {
            id,
            features: layer.len(),
            handle,
        });

        let fitted = match layer.bounds() {
            Some(bounds) => {
                self.map.fit_bounds(bounds);
                true
            }
            None => false,
        };

        info!(%id, features = layer.len(), fitted, "overlay replaced");
        Ok(ApplyOutcome::Replaced {
            layer: id,
            features: layer.len(),
            fitted,
        })
    }

    /// Detaches the current overlay. Returns `false` if there was none.
    pub fn clear(&mut self) -> bool {
        match self.current.take() {
            Some(active) => {
                self.map.detach(active.handle);
                info!(layer = %active.id, "overlay cleared");
                true
            }
            None => false,
        }
    }
}

#[derive(Debug, Error)]
pub enum OverlayError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] crate::loader::FetchError),
    #[error("not a GeoJSON document: {0}")]
    Document(#[from] DocumentError),
    #[error(transparent)]
    Map(#[from] MapError),
}


#[cfg(test)]
mod tests {
    use super::testing::{MapCall, RecordingMap};
    use super::{ApplyOutcome, OverlayError, OverlayManager};
    use crate::layer::LayerId;
    use foundation::Aabb2;
    use pretty_assertions::assert_eq;

    const TWO_POINTS: &str = r#"{"type":"FeatureCollection","features":[
        {"type":"Feature","properties":{"name":"north"},"geometry":{"type":"Point","coordinates":[10.0,50.0]}},
        {"type":"Feature","properties":{"name":"south"},"geometry":{"type":"Point","coordinates":[12.5,45.0]}}
    ]}"#;

    const ONE_LINE: &str = r#"{"type":"Feature","properties":{},"geometry":{"type":"LineString","coordinates":[[0,0],[1,1]]}}"#;

    #[test]
    fn two_feature_document_is_attached_and_framed() {
        let mut mgr = OverlayManager::new(RecordingMap::default());
        let outcome = mgr.apply_body(Some(TWO_POINTS)).expect("apply");
        assert_eq!(
            outcome,
            ApplyOutcome::Replaced {
                layer: LayerId(1),
                features: 2,
                fitted: true
            }
        );

        let map = mgr.map();
        assert_eq!(map.attached.len(), 1);
        let layer = &map.attached[0];
        assert_eq!(layer.len(), 2);
        assert!(layer.features().iter().all(|f| !f.popup.is_empty()));
        assert_eq!(layer.features()[0].popup, "<b>name</b> : north<br>");
        assert_eq!(
            map.viewport,
            Some(Aabb2::new([10.0, 45.0], [12.5, 50.0]))
        );
    }

    #[test]
    fn replacing_detaches_before_attaching_and_fits_after() {
        let mut mgr = OverlayManager::new(RecordingMap::default());
        mgr.apply_body(Some(TWO_POINTS)).expect("first");
        mgr.apply_body(Some(ONE_LINE)).expect("second");

        assert_eq!(
            mgr.map().calls,
            vec![
                MapCall::Attach(LayerId(1)),
                MapCall::Fit(Aabb2::new([10.0, 45.0], [12.5, 50.0])),
                MapCall::Detach(LayerId(1)),
                MapCall::Attach(LayerId(2)),
                MapCall::Fit(Aabb2::new([0.0, 0.0], [1.0, 1.0])),
            ]
        );
        assert_eq!(mgr.map().attached.len(), 1);
        assert_eq!(mgr.current_layer(), Some(LayerId(2)));
    }

    #[test]
    fn empty_body_leaves_overlay_in_place() {
        let mut mgr = OverlayManager::new(RecordingMap::default());
        mgr.apply_body(Some(TWO_POINTS)).expect("first");
        let before = mgr.map().calls.clone();

        assert_eq!(mgr.apply_body(None).expect("none"), ApplyOutcome::Unchanged);
        assert_eq!(mgr.apply_body(Some("")).expect("empty"), ApplyOutcome::Unchanged);

        assert_eq!(mgr.map().calls, before);
        assert_eq!(mgr.current_layer(), Some(LayerId(1)));
    }

    #[test]
    fn whitespace_body_is_a_parse_failure() {
        let mut mgr = OverlayManager::new(RecordingMap::default());
        mgr.apply_body(Some(TWO_POINTS)).expect("first");
        let before = mgr.map().calls.clone();

        let err = mgr.apply_body(Some("   ")).unwrap_err();
        assert!(matches!(err, OverlayError::Document(_)));
        let err = mgr.apply_body(Some("  \n")).unwrap_err();
        assert!(matches!(err, OverlayError::Document(_)));

        assert_eq!(mgr.map().calls, before);
        assert_eq!(mgr.current_layer(), Some(LayerId(1)));
        assert_eq!(mgr.current_feature_count(), Some(2));
    }

    #[test]
    fn parse_failure_leaves_overlay_in_place() {
        let mut mgr = OverlayManager::new(RecordingMap::default());
        mgr.apply_body(Some(TWO_POINTS)).expect("first");

        let err = mgr.apply_body(Some("<html>404</html>")).unwrap_err();
        assert!(matches!(err, OverlayError::Document(_)));
        assert_eq!(mgr.map().attached.len(), 1);
        assert_eq!(mgr.current_layer(), Some(LayerId(1)));
    }

    #[test]
    fn layer_without_positions_is_attached_but_not_framed() {
        let mut mgr = OverlayManager::new(RecordingMap::default());
        let outcome = mgr
            .apply_body(Some(r#"{"type":"FeatureCollection","features":[]}"#))
            .expect("apply");
        assert_eq!(
            outcome,
            ApplyOutcome::Replaced {
                layer: LayerId(1),
                features: 0,
                fitted: false
            }
        );
        assert_eq!(mgr.map().calls, vec![MapCall::Attach(LayerId(1))]);
        assert_eq!(mgr.map().viewport, None);
    }

    #[test]
    fn null_geometry_features_are_left_out() {
        let mut mgr = OverlayManager::new(RecordingMap::default());
        mgr.apply_body(Some(
            r#"{"type":"FeatureCollection","features":[
                {"type":"Feature","properties":{"a":1},"geometry":null},
                {"type":"Feature","properties":{"b":2},"geometry":{"type":"Point","coordinates":[3,4]}}
            ]}"#,
        ))
        .expect("apply");
        assert_eq!(mgr.current_feature_count(), Some(1));
        assert_eq!(mgr.map().attached[0].features()[0].popup, "<b>b</b> : 2<br>");
    }

    #[test]
    fn attach_failure_leaves_slot_empty() {
        let mut mgr = OverlayManager::new(RecordingMap::default());
        mgr.apply_body(Some(TWO_POINTS)).expect("first");
        mgr.map_mut().reject_next_attach = true;

        let err = mgr.apply_body(Some(ONE_LINE)).unwrap_err();
        assert!(matches!(err, OverlayError::Map(_)));
        assert_eq!(mgr.current_layer(), None);
        assert!(mgr.map().attached.is_empty());
        assert_eq!(mgr.map().viewport, Some(Aabb2::new([10.0, 45.0], [12.5, 50.0])));
    }

    #[test]
    fn clear_detaches_current() {
        let mut mgr = OverlayManager::new(RecordingMap::default());
        assert!(!mgr.clear());
        mgr.apply_body(Some(ONE_LINE)).expect("apply");
        assert!(mgr.clear());
        assert!(mgr.map().attached.is_empty());
        assert_eq!(mgr.current_layer(), None);
    }
}
