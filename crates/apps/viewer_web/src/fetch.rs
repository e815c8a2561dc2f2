use std::future::Future;

use gloo_net::http::Request;
use layers::{Fetch, FetchError};

/// GET over the browser's `fetch`.
#[derive(Debug, Default, Clone, Copy)]
pub struct HttpFetcher;

impl Fetch for HttpFetcher {
    fn fetch_text(&self, url: &str) -> impl Future<Output = Result<Option<String>, FetchError>> {
        let url = url.to_string();
        async move {
            let resp = Request::get(&url)
                .send()
                .await
                .map_err(|e| FetchError::Transport {
                    url: url.clone(),
                    reason: e.to_string(),
                })?;
            if !resp.ok() {
                return Err(FetchError::Status {
                    url,
                    status: resp.status(),
                });
            }
            let text = resp.text().await.map_err(|e| FetchError::Body {
                url: url.clone(),
                reason: e.to_string(),
            })?;
            Ok(Some(text))
        }
    }
}
