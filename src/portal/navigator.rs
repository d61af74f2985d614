//! Scripted navigation through the portal SPA.
//!
//! Each step visits a hash route, lets the page settle, answers any
//! enrollment chooser, then waits for the step's expected capture to
//! land. Navigation never fails an operation on its own: a missing
//! capture gets one recovery pass and is then surfaced as whatever the
//! store ends up holding.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

use crate::browser::PortalSession;
use crate::capture::{ResponseInterceptor, ResponseStore, StoreSnapshot};
use crate::config::PortalConfig;
use crate::model::NavigationStep;
use crate::portal::{modal, NETWORK_QUIET_BUDGET, NETWORK_QUIET_WINDOW};

/// Pause after each route change, for the SPA to mount the view.
const ROUTE_SETTLE_DELAY: Duration = Duration::from_secs(1);

/// How often the store is polled for an expected capture.
pub const CAPTURE_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// How long one step waits for its expected capture.
pub const CAPTURE_WAIT_BUDGET: Duration = Duration::from_secs(15);

/// Runs a list of navigation steps against one live session.
pub struct NavigationOrchestrator<'a> {
    session: &'a Arc<dyn PortalSession>,
    interceptor: &'a ResponseInterceptor,
    store: &'a Arc<ResponseStore>,
    config: &'a PortalConfig,
}

impl<'a> NavigationOrchestrator<'a> {
    pub fn new(
        session: &'a Arc<dyn PortalSession>,
        interceptor: &'a ResponseInterceptor,
        store: &'a Arc<ResponseStore>,
        config: &'a PortalConfig,
    ) -> Self {
        Self {
            session,
            interceptor,
            store,
            config,
        }
    }

    /// Run all steps, then drain in-flight captures and snapshot the
    /// store. The drain is the barrier that makes the snapshot complete:
    /// without it a slow body fetch would finish after the read.
    pub async fn run(&self, steps: &[NavigationStep]) -> StoreSnapshot {
        for step in steps {
            self.run_step(step).await;
        }
        self.interceptor.drain().await;
        self.store.snapshot()
    }

    async fn run_step(&self, step: &NavigationStep) {
        self.visit(step).await;

        if step.wait_for_keywords.is_empty() {
            if !self
                .store
                .await_quiet(NETWORK_QUIET_BUDGET, NETWORK_QUIET_WINDOW)
                .await
            {
                debug!(route = %step.route, "network never settled; moving on");
            }
            return;
        }

        if self.poll_capture(&step.wait_for_keywords).await {
            return;
        }

        // One recovery pass. SPAs drop route changes when an overlay
        // steals focus at the wrong moment; a second visit after the
        // chooser was answered usually lands the request.
        warn!(route = %step.route, "expected capture missing; re-running step once");
        self.visit(step).await;
        if !self.poll_capture(&step.wait_for_keywords).await {
            warn!(route = %step.route, "capture still missing; proceeding with what was observed");
        }
    }

    async fn visit(&self, step: &NavigationStep) {
        let url = self.config.route_url(&step.route);
        debug!(url = %url, "navigating");
        if let Err(err) = self.session.navigate(&url).await {
            warn!(url = %url, error = %err, "navigation failed; continuing");
        }
        tokio::time::sleep(ROUTE_SETTLE_DELAY).await;

        let preferred = step
            .preferred_selection
            .as_deref()
            .or(self.config.preferred_enrollment.as_deref());
        modal::dismiss(self.session, preferred).await;
    }

    async fn poll_capture(&self, keywords: &[String]) -> bool {
        let deadline = Instant::now() + CAPTURE_WAIT_BUDGET;
        loop {
            if self.store.matches_any(keywords) {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(CAPTURE_POLL_INTERVAL).await;
        }
    }
}
