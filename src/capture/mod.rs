//! Passive network capture.
//!
//! The portal's SPA talks to its own REST backend; instead of scraping
//! rendered DOM, the pipeline listens to that traffic. The interceptor
//! filters the session's response events down to portal API calls and
//! lands decoded bodies in the [`store::ResponseStore`].

pub mod interceptor;
pub mod store;

pub use interceptor::ResponseInterceptor;
pub use store::{CapturedResponse, ResponseStore, StoreSnapshot, UpsertOutcome};
