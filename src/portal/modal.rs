//! Interstitial enrollment chooser handling.
//!
//! After login, students with more than one registration get a blocking
//! modal asking which enrollment to open. The dismissal is a single
//! in-page script so the select-then-confirm pair cannot race a rerender
//! between two evaluate round trips.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info};

use crate::browser::PortalSession;
use crate::portal::script;

/// Labels accepted as the modal's confirmation control, lowercase.
/// A fixed vocabulary: matching arbitrary buttons would happily
/// click "Sair".
pub const CONFIRM_WORDS: [&str; 8] = [
    "confirm",
    "confirmar",
    "access",
    "acessar",
    "ok",
    "select",
    "selecionar",
    "entrar",
];

/// Attempt to answer the enrollment chooser if one is on screen.
///
/// Returns true when option controls were found, whether or not a
/// confirmation control was clicked. A missing modal is the normal case
/// and returns false silently.
pub async fn dismiss(session: &Arc<dyn PortalSession>, preferred: Option<&str>) -> bool {
    let script = script::dismiss_choice_modal(preferred);
    match session.evaluate(&script).await {
        Ok(value) => {
            let found = flag(&value, "found");
            if found {
                let confirmed = flag(&value, "confirmed");
                info!(confirmed, "answered enrollment chooser");
            }
            found
        }
        Err(err) => {
            debug!(error = %err, "enrollment chooser script failed");
            false
        }
    }
}

fn flag(value: &Value, key: &str) -> bool {
    value.get(key).and_then(Value::as_bool).unwrap_or(false)
}
