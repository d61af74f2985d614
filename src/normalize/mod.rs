//! Normalization entry points: captured store snapshot in, canonical
//! records out.
//!
//! Each dataset looks its endpoint up by path keyword, probes the body's
//! shape, and maps rows. A dataset whose endpoint was never captured is
//! an empty result, not an error; a captured body that matches no shape
//! is a parse error, because that means the portal changed underneath us.

pub mod records;
pub mod shapes;
pub mod values;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::capture::StoreSnapshot;
use crate::config::PortalConfig;
use crate::error::{PortalError, PortalResult};
use crate::model::{CanonicalRecord, CourseStatus};

/// Path keywords for the current-term grade listing endpoint.
pub const CURRENT_GRADE_PATHS: &[&str] = &["boletim", "nota"];

/// Path keywords for the transcript endpoint.
pub const TRANSCRIPT_PATHS: &[&str] = &["historico"];

/// Path keywords for the curriculum matrix endpoint.
pub const CURRICULUM_PATHS: &[&str] = &["matriz", "curricul"];

/// Normalize the full transcript.
///
/// A missing or bodyless capture yields zero records so the caller can
/// decide whether to retry the whole operation.
pub fn transcript(snapshot: &StoreSnapshot) -> PortalResult<(Vec<CanonicalRecord>, Value)> {
    let Some(capture) = snapshot.find(TRANSCRIPT_PATHS) else {
        warn!("no transcript endpoint was captured");
        return Ok((Vec::new(), Value::Null));
    };
    let Some(body) = capture.body.as_ref() else {
        warn!(path = %capture.path, "transcript capture has no decodable body");
        return Ok((Vec::new(), Value::Null));
    };
    let rows = shapes::extract_list(body).ok_or_else(|| {
        PortalError::parse(
            "transcript",
            format!("payload at '{}' matched no known shape", capture.path),
        )
    })?;
    let data: Vec<CanonicalRecord> = rows.iter().filter_map(records::grade_row).collect();
    info!(records = data.len(), "normalized transcript");
    Ok((data, body.clone()))
}

/// Normalize the current term's grades.
///
/// Prefers the dedicated current-term endpoint; when that is absent,
/// unshaped, or empty, falls back to the transcript filtered down to
/// in-progress courses.
pub fn current_grades(snapshot: &StoreSnapshot) -> PortalResult<(Vec<CanonicalRecord>, Value)> {
    let mut primary_unshaped = false;

    if let Some(capture) = snapshot.find(CURRENT_GRADE_PATHS) {
        if let Some(body) = capture.body.as_ref() {
            match shapes::extract_list(body) {
                Some(rows) => {
                    let data: Vec<CanonicalRecord> =
                        rows.iter().filter_map(records::grade_row).collect();
                    if !data.is_empty() {
                        info!(records = data.len(), "normalized current grades");
                        return Ok((data, body.clone()));
                    }
                    debug!(path = %capture.path, "current grade listing is empty; trying transcript fallback");
                }
                None => {
                    primary_unshaped = true;
                    debug!(path = %capture.path, "current grade payload matched no shape; trying transcript fallback");
                }
            }
        }
    }

    let (all, raw) = transcript(snapshot)?;
    if raw.is_null() && primary_unshaped {
        // The only payload we had was unrecognizable: surface the drift.
        return Err(PortalError::parse(
            "grades",
            "payload matched no known shape",
        ));
    }
    let data: Vec<CanonicalRecord> = all
        .into_iter()
        .filter(|r| r.status == CourseStatus::InProgress)
        .collect();
    info!(records = data.len(), "derived current grades from transcript");
    Ok((data, raw))
}

/// Normalize the degree curriculum matrix.
pub fn curriculum(
    snapshot: &StoreSnapshot,
    config: &PortalConfig,
) -> PortalResult<(Vec<CanonicalRecord>, Value)> {
    let Some(capture) = snapshot.find(CURRICULUM_PATHS) else {
        warn!("no curriculum endpoint was captured");
        return Ok((Vec::new(), Value::Null));
    };
    let Some(body) = capture.body.as_ref() else {
        warn!(path = %capture.path, "curriculum capture has no decodable body");
        return Ok((Vec::new(), Value::Null));
    };
    let rows = shapes::extract_list(body).ok_or_else(|| {
        PortalError::parse(
            "curriculum",
            format!("payload at '{}' matched no known shape", capture.path),
        )
    })?;
    let data: Vec<CanonicalRecord> = rows
        .iter()
        .filter_map(|row| records::curriculum_row(row, config.min_passing_grade))
        .collect();
    info!(records = data.len(), "normalized curriculum");
    Ok((data, body.clone()))
}
