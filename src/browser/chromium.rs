//! Chromium-backed portal sessions via chromiumoxide.
//!
//! One headless Chromium process is launched lazily and shared by the
//! whole OS process; each operation gets its own fresh page with cookies
//! cleared, so no portal session outlives the operation that created it.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use base64::Engine as _;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::network::{
    ClearBrowserCookiesParams, EventResponseReceived, GetResponseBodyParams,
};
use chromiumoxide::page::Page;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::{BrowserFactory, NetResponseEvent, PortalSession, SessionOptions};

/// Upper bound for one page navigation, DNS to load event.
const NAVIGATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Grace period for the load event after a committed navigation. Hash
/// route changes inside the SPA never fire one, so this stays short.
const LOAD_EVENT_GRACE: Duration = Duration::from_secs(5);

/// Buffered network events between page and interceptor.
const EVENT_BUFFER: usize = 512;

/// Find the Chromium binary path.
pub fn find_chromium() -> Option<PathBuf> {
    // 1. PORTICO_CHROMIUM_PATH env
    if let Ok(p) = std::env::var("PORTICO_CHROMIUM_PATH") {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    // 2. ~/.portico/chromium/
    if let Some(home) = dirs::home_dir() {
        let candidates = if cfg!(target_os = "macos") {
            vec![
                home.join(".portico/chromium/chrome-mac-arm64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                home.join(".portico/chromium/chrome-mac-x64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                home.join(".portico/chromium/chrome"),
            ]
        } else {
            vec![
                home.join(".portico/chromium/chrome-linux64/chrome"),
                home.join(".portico/chromium/chrome"),
            ]
        };
        for c in candidates {
            if c.exists() {
                return Some(c);
            }
        }
    }

    // 3. System PATH
    if let Ok(path) = which::which("google-chrome") {
        return Some(path);
    }
    if let Ok(path) = which::which("chromium") {
        return Some(path);
    }
    if let Ok(path) = which::which("chromium-browser") {
        return Some(path);
    }

    // 4. Common macOS locations
    if cfg!(target_os = "macos") {
        let common =
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }

    None
}

/// Browser factory backed by one shared headless Chromium process.
pub struct ChromiumFactory {
    browser: tokio::sync::Mutex<Option<Arc<Browser>>>,
}

impl ChromiumFactory {
    pub fn new() -> Self {
        Self {
            browser: tokio::sync::Mutex::new(None),
        }
    }

    /// Launch Chromium on first use, then reuse the process.
    async fn browser(&self) -> Result<Arc<Browser>> {
        let mut slot = self.browser.lock().await;
        if let Some(browser) = slot.as_ref() {
            return Ok(Arc::clone(browser));
        }

        let chrome_path = find_chromium()
            .context("Chromium not found. Install Chrome or set PORTICO_CHROMIUM_PATH.")?;
        info!(path = %chrome_path.display(), "launching headless Chromium");

        let config = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--disable-background-networking")
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build browser config: {e}"))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("failed to launch Chromium")?;

        // Spawn the handler task
        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        let browser = Arc::new(browser);
        *slot = Some(Arc::clone(&browser));
        Ok(browser)
    }
}

impl Default for ChromiumFactory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BrowserFactory for ChromiumFactory {
    async fn session(&self, options: &SessionOptions) -> Result<Arc<dyn PortalSession>> {
        let browser = self.browser().await?;
        let page = browser
            .new_page("about:blank")
            .await
            .context("failed to open page")?;

        // The Chromium process is shared across operations but sessions
        // must not be. A fresh page plus a cookie wipe gives each
        // operation a clean slate.
        page.execute(ClearBrowserCookiesParams::default())
            .await
            .context("failed to clear cookies")?;
        page.set_user_agent(options.user_agent.as_str())
            .await
            .context("failed to set user agent")?;

        let (width, height) = options.viewport;
        let metrics = SetDeviceMetricsOverrideParams::builder()
            .width(width as i64)
            .height(height as i64)
            .device_scale_factor(1.0)
            .mobile(false)
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build viewport params: {e}"))?;
        page.execute(metrics)
            .await
            .context("failed to set viewport")?;

        // Subscribe before any navigation so the very first requests the
        // portal makes are already observed.
        let mut events = page
            .event_listener::<EventResponseReceived>()
            .await
            .context("failed to subscribe to network events")?;
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let pump = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                let forwarded = NetResponseEvent {
                    request_id: event.request_id.inner().clone(),
                    url: event.response.url.clone(),
                    status: u16::try_from(event.response.status).unwrap_or(0),
                };
                if tx.send(forwarded).await.is_err() {
                    break;
                }
            }
        });

        Ok(Arc::new(ChromiumSession {
            page,
            events: tokio::sync::Mutex::new(Some(rx)),
            pump: std::sync::Mutex::new(Some(pump)),
        }))
    }
}

/// A single Chromium page scoped to one portal operation.
pub struct ChromiumSession {
    page: Page,
    events: tokio::sync::Mutex<Option<mpsc::Receiver<NetResponseEvent>>>,
    pump: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl ChromiumSession {
    fn stop_pump(&self) {
        if let Ok(mut pump) = self.pump.lock() {
            if let Some(handle) = pump.take() {
                handle.abort();
            }
        }
    }
}

#[async_trait]
impl PortalSession for ChromiumSession {
    async fn navigate(&self, url: &str) -> Result<()> {
        let result = tokio::time::timeout(NAVIGATION_TIMEOUT, self.page.goto(url)).await;
        match result {
            Ok(Ok(_)) => {
                // Bounded: same-document route changes never emit a load
                // event and must not stall the operation.
                let _ =
                    tokio::time::timeout(LOAD_EVENT_GRACE, self.page.wait_for_navigation()).await;
                Ok(())
            }
            Ok(Err(e)) => bail!("navigation to {url} failed: {e}"),
            Err(_) => bail!(
                "navigation to {url} timed out after {}ms",
                NAVIGATION_TIMEOUT.as_millis()
            ),
        }
    }

    async fn current_url(&self) -> Result<String> {
        let url = self
            .page
            .url()
            .await
            .context("failed to read page url")?
            .unwrap_or_default();
        Ok(url)
    }

    async fn evaluate(&self, script: &str) -> Result<serde_json::Value> {
        let result = self
            .page
            .evaluate(script)
            .await
            .context("script evaluation failed")?;
        result
            .into_value()
            .map_err(|e| anyhow::anyhow!("failed to convert script result: {e:?}"))
    }

    async fn responses(&self) -> Result<mpsc::Receiver<NetResponseEvent>> {
        self.events
            .lock()
            .await
            .take()
            .context("response stream already taken for this session")
    }

    async fn response_body(&self, request_id: &str) -> Result<Option<String>> {
        let params = GetResponseBodyParams::new(request_id.to_string());
        match self.page.execute(params).await {
            Ok(resp) => {
                let returns = resp.result;
                if returns.base64_encoded {
                    let bytes = base64::engine::general_purpose::STANDARD
                        .decode(returns.body.as_bytes())
                        .context("failed to decode base64 response body")?;
                    Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
                } else {
                    Ok(Some(returns.body))
                }
            }
            Err(err) => {
                debug!(request_id = %request_id, error = %err, "response body unavailable");
                Ok(None)
            }
        }
    }

    async fn close(&self) -> Result<()> {
        self.stop_pump();
        self.page
            .clone()
            .close()
            .await
            .context("failed to close page")?;
        Ok(())
    }
}

impl Drop for ChromiumSession {
    fn drop(&mut self) {
        self.stop_pump();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore] // Requires Chromium to be installed
    async fn test_chromium_session_navigate_and_evaluate() {
        let factory = ChromiumFactory::new();
        let options = SessionOptions {
            viewport: (1366, 768),
            user_agent: crate::config::DESKTOP_USER_AGENT.to_string(),
        };
        let session = factory
            .session(&options)
            .await
            .expect("failed to open session");

        session
            .navigate("data:text/html,<h1>Hello</h1><p>World</p>")
            .await
            .expect("navigation failed");

        let result = session
            .evaluate("document.querySelector('h1').textContent")
            .await
            .expect("evaluation failed");
        assert_eq!(result.as_str().unwrap(), "Hello");

        let url = session.current_url().await.expect("url failed");
        assert!(url.starts_with("data:"));

        // The event stream is takeable exactly once.
        let first = session.responses().await;
        assert!(first.is_ok());
        let second = session.responses().await;
        assert!(second.is_err());

        session.close().await.expect("close failed");
    }
}
