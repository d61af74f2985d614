//! Response interceptor: turns raw network events into stored captures.
//!
//! Every response event touches the store's activity clock. Events whose
//! URL carries the portal API marker each get a spawned capture unit that
//! fetches the body, decodes it, and upserts it. Units are tracked so the
//! pipeline can drain them all before reading the store; without that
//! barrier a body fetched late would silently miss the normalization.

use std::sync::Arc;

use anyhow::Result;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::browser::{NetResponseEvent, PortalSession};
use crate::capture::store::{CapturedResponse, ResponseStore};

/// Listens to a session's response events for the lifetime of one
/// operation.
pub struct ResponseInterceptor {
    units: Arc<Mutex<Vec<JoinHandle<()>>>>,
    pump: JoinHandle<()>,
}

impl ResponseInterceptor {
    /// Subscribe to the session's response stream and start capturing.
    ///
    /// Must run before the first navigation of the operation so no portal
    /// API call goes unobserved.
    pub async fn attach(
        session: Arc<dyn PortalSession>,
        store: Arc<ResponseStore>,
        api_marker: &str,
    ) -> Result<Self> {
        let mut events = session.responses().await?;
        let marker = api_marker.to_string();
        let units = Arc::new(Mutex::new(Vec::new()));
        let units_ref = Arc::clone(&units);

        let pump = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                // All traffic feeds quiet detection, captured or not.
                store.touch();
                if !event.url.contains(&marker) {
                    continue;
                }
                let Some(path) = derive_path_key(&event.url) else {
                    continue;
                };
                debug!(path = %path, status = event.status, "portal api response observed");
                let session = Arc::clone(&session);
                let store = Arc::clone(&store);
                let unit = tokio::spawn(async move {
                    capture_one(session, store, event, path).await;
                });
                units_ref.lock().await.push(unit);
            }
        });

        Ok(Self { units, pump })
    }

    /// Wait for every spawned capture unit to finish. Loops because a
    /// unit may be spawned while earlier ones are being awaited.
    pub async fn drain(&self) {
        loop {
            let pending: Vec<JoinHandle<()>> = {
                let mut units = self.units.lock().await;
                units.drain(..).collect()
            };
            if pending.is_empty() {
                return;
            }
            for unit in pending {
                if let Err(err) = unit.await {
                    if !err.is_cancelled() {
                        warn!(error = %err, "capture unit panicked");
                    }
                }
            }
        }
    }
}

impl Drop for ResponseInterceptor {
    fn drop(&mut self) {
        self.pump.abort();
    }
}

/// Fetch, decode, and store one captured response.
async fn capture_one(
    session: Arc<dyn PortalSession>,
    store: Arc<ResponseStore>,
    event: NetResponseEvent,
    path: String,
) {
    let body = match session.response_body(&event.request_id).await {
        Ok(Some(text)) => match serde_json::from_str::<Value>(&text) {
            Ok(value) => Some(value),
            Err(err) => {
                debug!(path = %path, error = %err, "captured body is not json");
                None
            }
        },
        Ok(None) => None,
        Err(err) => {
            // Body eviction or a dying tab. The path is still recorded so
            // the operation knows the endpoint fired.
            warn!(path = %path, error = %err, "failed to fetch response body");
            None
        }
    };

    let has_warning = body.as_ref().map(body_has_warning).unwrap_or(false);
    store.upsert(CapturedResponse {
        path,
        body,
        has_warning,
        status_code: event.status,
    });
}

/// Reduce a full URL to its path: origin and query string dropped, so
/// the same endpoint called with different parameters lands on one key.
fn derive_path_key(raw_url: &str) -> Option<String> {
    url::Url::parse(raw_url).ok().map(|u| u.path().to_string())
}

/// Whether a decoded payload carries a portal-side warning entry in its
/// message envelope.
fn body_has_warning(body: &Value) -> bool {
    let messages = body
        .get("messages")
        .or_else(|| body.get("Messages"))
        .and_then(Value::as_array);
    let Some(messages) = messages else {
        return false;
    };
    messages.iter().any(|m| {
        m.get("type")
            .or_else(|| m.get("Type"))
            .and_then(Value::as_str)
            .map(|t| t.eq_ignore_ascii_case("warning"))
            .unwrap_or(false)
    })
}
