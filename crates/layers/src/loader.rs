use std::cell::{Cell, RefCell};
use std::future::Future;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::overlay::{ApplyOutcome, MapSurface, OverlayError, OverlayManager};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {reason}")]
    Transport { url: String, reason: String },
    #[error("{url} answered with HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("could not read body of {url}: {reason}")]
    Body { url: String, reason: String },
}

/// Source of overlay payloads.
///
/// `Ok(None)` and `Ok(Some(""))` both mean the response carried no body.
pub trait Fetch {
    fn fetch_text(&self, url: &str) -> impl Future<Output = Result<Option<String>, FetchError>>;
}

/// Which of several in-flight loads may replace the overlay.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadPolicy {
    /// Every completed load applies, in completion order; the last to resolve wins.
    #[default]
    LastResolved,
    /// A load that completes after a newer one was submitted is dropped.
    LatestSubmitted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Applied(ApplyOutcome),
    /// Dropped under [`LoadPolicy::LatestSubmitted`].
    Superseded { ticket: u64, latest: u64 },
}

/// Drives fetch -> parse -> replace for a shared [`OverlayManager`].
///
/// Lives on one thread. The manager is only borrowed after the fetch has
/// resolved, never across an await.
pub struct OverlayLoader<M: MapSurface, F: Fetch> {
    manager: Rc<RefCell<OverlayManager<M>>>,
    fetcher: F,
    policy: LoadPolicy,
    latest_ticket: Cell<u64>,
}

impl<M: MapSurface, F: Fetch> OverlayLoader<M, F> {
    pub fn new(manager: Rc<RefCell<OverlayManager<M>>>, fetcher: F, policy: LoadPolicy) -> Self {
        Self {
            manager,
            fetcher,
            policy,
            latest_ticket: Cell::new(0),
        }
    }

    pub fn manager(&self) -> &Rc<RefCell<OverlayManager<M>>> {
        &self.manager
    }

    pub fn policy(&self) -> LoadPolicy {
        self.policy
    }

    /// Fetches `url` and, on a usable body, replaces the current overlay.
    ///
    /// Errors leave the overlay as it was.
    pub async fn load(&self, url: &str) -> Result<LoadOutcome, OverlayError> {
        let ticket = self.latest_ticket.get() + 1;
        self.latest_ticket.set(ticket);
        debug!(url, ticket, "loading overlay");

        let body = match self.fetcher.fetch_text(url).await {
            Ok(body) => body,
            Err(e) => {
                warn!(url, ticket, "{e}");
                return Err(e.into());
            }
        };

        let latest = self.latest_ticket.get();
        if self.policy == LoadPolicy::LatestSubmitted && ticket != latest {
            debug!(url, ticket, latest, "dropping superseded response");
            return Ok(LoadOutcome::Superseded { ticket, latest });
        }

        let outcome = self.manager.borrow_mut().apply_body(body.as_deref());
        match outcome {
            Ok(applied) => Ok(LoadOutcome::Applied(applied)),
            Err(e) => {
                warn!(url, ticket, "{e}");
                Err(e)
            }
        }
    }
}
