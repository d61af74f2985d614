//! Driving the portal UI: login, interstitial modals, and scripted
//! navigation through the SPA's hash routes.
//!
//! The portal's frontend changes without notice, so UI interaction
//! failures degrade to log lines and bounded waits; only a session that
//! never authenticates is fatal.

pub mod login;
pub mod modal;
pub mod navigator;
mod script;

use std::time::Duration;

/// Budget for waiting out a page's background API traffic.
pub const NETWORK_QUIET_BUDGET: Duration = Duration::from_secs(10);

/// Window with no network activity that counts as quiet.
pub const NETWORK_QUIET_WINDOW: Duration = Duration::from_millis(500);

pub use navigator::NavigationOrchestrator;
