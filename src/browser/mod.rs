//! Browser abstraction for portal sessions.
//!
//! Defines the `BrowserFactory` and `PortalSession` traits that abstract
//! over the browser engine (currently Chromium via chromiumoxide). The
//! pipeline only ever talks to these traits, so tests drive it with
//! scripted sessions and no browser at all.

pub mod chromium;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// A network response observed by the page, before any filtering.
#[derive(Debug, Clone)]
pub struct NetResponseEvent {
    /// Engine-assigned id used to fetch the response body.
    pub request_id: String,
    /// Full request URL.
    pub url: String,
    /// HTTP status code.
    pub status: u16,
}

/// Per-session browser settings.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub viewport: (u32, u32),
    pub user_agent: String,
}

impl SessionOptions {
    pub fn from_config(config: &crate::config::PortalConfig) -> Self {
        Self {
            viewport: config.viewport,
            user_agent: config.user_agent.clone(),
        }
    }
}

/// A browser engine that can open isolated portal sessions.
#[async_trait]
pub trait BrowserFactory: Send + Sync {
    /// Open a fresh session with no cookies or storage from earlier
    /// operations.
    async fn session(&self, options: &SessionOptions) -> Result<std::sync::Arc<dyn PortalSession>>;
}

/// One live page scoped to a single portal operation.
///
/// The response event stream starts buffering when the session is
/// created, so subscribing via [`responses`](Self::responses) before the
/// first navigation observes every request the page ever makes.
#[async_trait]
pub trait PortalSession: Send + Sync {
    /// Navigate the page and wait for the load to commit.
    async fn navigate(&self, url: &str) -> Result<()>;

    /// Current page URL.
    async fn current_url(&self) -> Result<String>;

    /// Execute a JavaScript expression in the page and return its value.
    async fn evaluate(&self, script: &str) -> Result<serde_json::Value>;

    /// Take the session's network response event stream. Yields every
    /// response the page observed since creation. May be taken once;
    /// later calls fail.
    async fn responses(&self) -> Result<mpsc::Receiver<NetResponseEvent>>;

    /// Fetch a response body by request id. `None` when the engine no
    /// longer holds the body.
    async fn response_body(&self, request_id: &str) -> Result<Option<String>>;

    /// Tear the session down. Must be called on every exit path; the
    /// session holds a real browser tab.
    async fn close(&self) -> Result<()>;
}
