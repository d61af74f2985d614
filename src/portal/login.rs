//! Portal login flow.
//!
//! Fills the visible login form in-page, then watches the URL until the
//! portal routes away from the login screen. The URL is the only
//! authentication signal we trust: error toasts vary by deployment, but
//! a session still parked on the login path after the redirect window
//! has definitively not authenticated.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::browser::PortalSession;
use crate::capture::ResponseStore;
use crate::config::PortalConfig;
use crate::error::{PortalError, PortalResult};
use crate::model::Credentials;
use crate::portal::{script, NETWORK_QUIET_BUDGET, NETWORK_QUIET_WINDOW};

/// How long the portal gets to route away from the login page.
pub const LOGIN_REDIRECT_TIMEOUT: Duration = Duration::from_secs(15);

const URL_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Pause between page load and form fill, for the SPA to hydrate.
const FORM_SETTLE_DELAY: Duration = Duration::from_secs(1);

/// Authenticate the session against the portal.
///
/// `Err(Authentication)` means the credentials were rejected or the
/// login page never went away; infrastructure failures surface as
/// `Err(Connection)`.
pub async fn perform(
    session: &Arc<dyn PortalSession>,
    store: &ResponseStore,
    config: &PortalConfig,
    credentials: &Credentials,
) -> PortalResult<()> {
    let login_url = config.login_url();
    info!(url = %login_url, "opening portal login");
    session
        .navigate(&login_url)
        .await
        .map_err(PortalError::connection)?;
    tokio::time::sleep(FORM_SETTLE_DELAY).await;

    let fill = script::fill_login_form(&credentials.identifier, &credentials.secret);
    let outcome = session
        .evaluate(&fill)
        .await
        .map_err(PortalError::connection)?;
    let filled = outcome
        .get("filled")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    if !filled {
        // Not fatal yet. Some deployments auto-redirect an existing
        // session; the URL watch below delivers the verdict either way.
        warn!("no visible login form found on the login page");
    }

    let deadline = Instant::now() + LOGIN_REDIRECT_TIMEOUT;
    let mut left_login_page = false;
    while Instant::now() < deadline {
        match session.current_url().await {
            Ok(url) if !url.contains(&config.login_path) => {
                left_login_page = true;
                break;
            }
            Ok(_) => {}
            Err(err) => debug!(error = %err, "url poll failed"),
        }
        tokio::time::sleep(URL_POLL_INTERVAL).await;
    }

    if !left_login_page {
        warn!("session never left the login page");
        return Err(PortalError::Authentication);
    }

    // Let the landing page finish its initial API burst before the
    // caller starts navigating.
    if !store
        .await_quiet(NETWORK_QUIET_BUDGET, NETWORK_QUIET_WINDOW)
        .await
    {
        debug!("landing page still busy after quiet budget; continuing");
    }
    info!("portal session established");
    Ok(())
}
