// Copyright 2026 Portico Contributors
// SPDX-License-Identifier: Apache-2.0

//! Canonical data model shared by every portal operation.
//!
//! The portal's own API leaks a different JSON dialect per screen and per
//! deployment. Everything the library returns is normalized into the
//! types below so downstream consumers see exactly one schema.

use serde::{Deserialize, Serialize};

/// A user's portal credentials. Held in memory only for the lifetime of
/// one operation; never persisted, never logged.
#[derive(Clone)]
pub struct Credentials {
    /// Registration number or username, as the portal expects it.
    pub identifier: String,
    /// Portal password.
    pub secret: String,
}

impl Credentials {
    pub fn new(identifier: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            secret: secret.into(),
        }
    }
}

// Redact both fields: debug output ends up in logs and bug reports.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("identifier", &"***")
            .field("secret", &"***")
            .finish()
    }
}

/// Lifecycle state of a course from the student's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CourseStatus {
    NotStarted,
    InProgress,
    Passed,
    Failed,
}

impl std::fmt::Display for CourseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotStarted => write!(f, "NOT_STARTED"),
            Self::InProgress => write!(f, "IN_PROGRESS"),
            Self::Passed => write!(f, "PASSED"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

/// Whether a curriculum row is mandatory for the degree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CourseKind {
    Required,
    Elective,
}

/// How a result was obtained. Browser-driven capture reports `Remote`;
/// `Manual` is reserved for records entered by the user out of band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalMethod {
    Remote,
    Manual,
}

/// One course in canonical form. All three datasets (current grades,
/// transcript, curriculum) produce this same shape; fields a dataset
/// does not carry are `None` or their zero value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalRecord {
    /// Course code as printed by the institution, e.g. "60963".
    pub code: String,
    /// Human-readable course name.
    pub name: String,
    /// First stage grade, when the portal breaks the term into stages.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grade_a: Option<f64>,
    /// Second stage grade.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grade_b: Option<f64>,
    /// Final grade for the course.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_grade: Option<f64>,
    /// Recorded absences. Zero when the portal does not report them.
    pub absences: u32,
    pub status: CourseStatus,
    /// Academic term in which the course was taken, e.g. "2024/1".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub term_taken: Option<String>,
    /// Credit count, zero when unknown.
    pub credits: u32,
    /// Contact hours, zero when unknown.
    pub contact_hours: u32,
    /// Position of the course in the suggested curriculum (1-based
    /// period), zero when the portal does not place it.
    pub term: u32,
    pub kind: CourseKind,
}

/// Outcome of a credential check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginOutcome {
    pub success: bool,
    pub method: RetrievalMethod,
}

/// Outcome of a data-fetch operation: the canonical records plus the raw
/// captured payload they were derived from, for audit and debugging.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchOutcome {
    pub method: RetrievalMethod,
    /// Whole browser sessions the operation consumed. 1 unless the
    /// transcript's empty-result retry fired.
    pub attempts: u32,
    pub data: Vec<CanonicalRecord>,
    /// The portal payload the records were normalized from. `Null` when
    /// the portal produced no capture at all.
    pub raw: serde_json::Value,
}

/// One scripted hop through the portal's single-page interface.
#[derive(Debug, Clone)]
pub struct NavigationStep {
    /// Route fragment to visit, e.g. "#/historico".
    pub route: String,
    /// Label text preferred when an interstitial choice modal appears.
    pub preferred_selection: Option<String>,
    /// Path keywords that mark this step's expected capture. Empty means
    /// the step settles on network quiet alone.
    pub wait_for_keywords: Vec<String>,
}

impl NavigationStep {
    pub fn to(route: impl Into<String>) -> Self {
        Self {
            route: route.into(),
            preferred_selection: None,
            wait_for_keywords: Vec::new(),
        }
    }

    pub fn with_selection(mut self, label: impl Into<String>) -> Self {
        self.preferred_selection = Some(label.into());
        self
    }

    pub fn expect_capture(mut self, keywords: &[&str]) -> Self {
        self.wait_for_keywords = keywords.iter().map(|k| k.to_string()).collect();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_debug_redacts() {
        let creds = Credentials::new("20231234", "hunter2");
        let printed = format!("{creds:?}");
        assert!(!printed.contains("20231234"));
        assert!(!printed.contains("hunter2"));
        assert!(printed.contains("***"));
    }

    #[test]
    fn test_status_serializes_screaming_snake() {
        let v = serde_json::to_value(CourseStatus::NotStarted).unwrap();
        assert_eq!(v, serde_json::json!("NOT_STARTED"));
        let v = serde_json::to_value(CourseStatus::InProgress).unwrap();
        assert_eq!(v, serde_json::json!("IN_PROGRESS"));
    }

    #[test]
    fn test_status_display_matches_wire_form() {
        assert_eq!(CourseStatus::Passed.to_string(), "PASSED");
        assert_eq!(CourseStatus::NotStarted.to_string(), "NOT_STARTED");
    }

    #[test]
    fn test_record_serializes_camel_case() {
        let record = CanonicalRecord {
            code: "60963".into(),
            name: "Calculus I".into(),
            grade_a: None,
            grade_b: None,
            final_grade: Some(7.5),
            absences: 0,
            status: CourseStatus::Passed,
            term_taken: None,
            credits: 4,
            contact_hours: 60,
            term: 1,
            kind: CourseKind::Required,
        };
        let v = serde_json::to_value(&record).unwrap();
        assert_eq!(v["finalGrade"], serde_json::json!(7.5));
        assert_eq!(v["contactHours"], serde_json::json!(60));
        assert_eq!(v["status"], serde_json::json!("PASSED"));
        // Absent optional grades are omitted, not serialized as null.
        assert!(v.get("gradeA").is_none());
    }

    #[test]
    fn test_navigation_step_builder() {
        let step = NavigationStep::to("#/historico")
            .with_selection("2024/1")
            .expect_capture(&["historico"]);
        assert_eq!(step.route, "#/historico");
        assert_eq!(step.preferred_selection.as_deref(), Some("2024/1"));
        assert_eq!(step.wait_for_keywords, vec!["historico".to_string()]);
    }
}
