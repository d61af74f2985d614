//! Scalar cleanup for portal field values.
//!
//! The portal emits grades as localized strings ("7,5"), counts as
//! either numbers or strings, and statuses as free-form labels in two
//! languages. These helpers fold all of that into the canonical scalar
//! types, mapping anything unintelligible to an explicit absent value
//! rather than guessing.

use serde_json::Value;

use crate::model::{CourseKind, CourseStatus};

/// Parse a grade field. Comma decimal separators are normalized; a dash,
/// an empty string, or a non-numeric label ("Dispensado") is an absent
/// grade, not zero.
pub fn parse_grade(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() || trimmed == "-" {
                return None;
            }
            trimmed.replace(',', ".").parse::<f64>().ok()
        }
        _ => None,
    }
}

/// Parse a non-negative count (absences, credits, contact hours).
/// Unparseable or missing values are zero.
pub fn parse_count(value: Option<&Value>) -> u32 {
    match value {
        Some(Value::Number(n)) => n
            .as_u64()
            .map(|v| v.min(u32::MAX as u64) as u32)
            .or_else(|| n.as_f64().map(|f| f.max(0.0) as u32))
            .unwrap_or(0),
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            trimmed
                .parse::<u32>()
                .ok()
                .or_else(|| trimmed.parse::<f64>().ok().map(|f| f.max(0.0) as u32))
                .unwrap_or(0)
        }
        _ => 0,
    }
}

/// Curriculum position: a plain number, or the leading digits of a
/// label like "3º Período". Zero when the row carries neither.
pub fn parse_term(value: Option<&Value>) -> u32 {
    match value {
        Some(Value::Number(n)) => n.as_u64().map(|v| v.min(u32::MAX as u64) as u32).unwrap_or(0),
        Some(Value::String(s)) => {
            let digits: String = s.trim().chars().take_while(|c| c.is_ascii_digit()).collect();
            digits.parse::<u32>().unwrap_or(0)
        }
        _ => 0,
    }
}

/// Map a status label onto the canonical course status.
///
/// Substring matching, checked in a fixed priority order. Localized and
/// English vocabularies share one table; anything unrecognized (or a
/// missing label) reads as not started.
pub fn map_status(value: Option<&Value>) -> CourseStatus {
    let Some(label) = value.and_then(Value::as_str) else {
        return CourseStatus::NotStarted;
    };
    let upper = label.trim().to_uppercase();
    if upper.is_empty() {
        return CourseStatus::NotStarted;
    }

    const PASSED: [&str; 3] = ["APROV", "APPROV", "PASSED"];
    const FAILED: [&str; 2] = ["REPROV", "FAIL"];
    const IN_PROGRESS: [&str; 5] = [
        "CURSANDO",
        "MATRICULADO",
        "EM CURSO",
        "ENROLLED",
        "IN PROGRESS",
    ];
    const EXEMPT: [&str; 3] = ["DISPENS", "EXEMPT", "WAIV"];

    if PASSED.iter().any(|w| upper.contains(w)) {
        CourseStatus::Passed
    } else if FAILED.iter().any(|w| upper.contains(w)) {
        CourseStatus::Failed
    } else if IN_PROGRESS.iter().any(|w| upper.contains(w)) {
        CourseStatus::InProgress
    } else if EXEMPT.iter().any(|w| upper.contains(w)) {
        // Exemptions count as passed credit.
        CourseStatus::Passed
    } else {
        // TRANCAD/WITHDRAW/CANCELAD and unknown labels all read the same.
        CourseStatus::NotStarted
    }
}

/// Elective detection over the portal's grouping labels.
pub fn classify_kind(value: Option<&Value>) -> CourseKind {
    let Some(label) = value.and_then(Value::as_str) else {
        return CourseKind::Required;
    };
    let lower = label.trim().to_lowercase();
    const ELECTIVE: [&str; 4] = ["eletiv", "optativ", "elective", "optional"];
    if ELECTIVE.iter().any(|w| lower.contains(w)) {
        CourseKind::Elective
    } else {
        CourseKind::Required
    }
}

/// Trimmed text of a field; numbers are stringified (course codes often
/// arrive as bare integers). Empty strings are absent.
pub fn text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
