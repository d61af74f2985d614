// Copyright 2026 Portico Contributors
// SPDX-License-Identifier: Apache-2.0

//! `portico login|grades|transcript|curriculum` — drive a portal session
//! and print the normalized results.

use crate::audit::AuditLog;
use crate::cli::output::{self, Styled};
use crate::config::PortalConfig;
use crate::error::{PortalError, PortalResult};
use crate::model::{CanonicalRecord, Credentials};
use crate::pipeline::Portal;
use anyhow::{bail, Context, Result};
use std::time::Instant;
use tracing::warn;

/// Which dataset a fetch subcommand targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchKind {
    Grades,
    Transcript,
    Curriculum,
}

impl FetchKind {
    fn operation(self) -> &'static str {
        match self {
            Self::Grades => "grades",
            Self::Transcript => "transcript",
            Self::Curriculum => "curriculum",
        }
    }
}

/// Run the login command: verify credentials against the portal without
/// fetching any dataset.
pub async fn run_login(identifier: &str, secret_env: &str) -> Result<()> {
    let config = PortalConfig::from_env();
    let credentials = read_credentials(identifier, secret_env)?;
    let portal = Portal::new(config);

    let spin = output::spinner(&format!("Signing in to {}...", portal.config().base_url));
    let started = Instant::now();
    let result = portal.login(&credentials).await;
    if let Some(bar) = spin {
        bar.finish_and_clear();
    }
    let duration_ms = started.elapsed().as_millis() as u64;

    let attempts = result.as_ref().ok().map(|_| 1);
    audit("login", portal.config(), duration_ms, 0, attempts, status_label(&result));

    let outcome = result?;
    if output::is_json() {
        output::print_json(&serde_json::json!({
            "operation": "login",
            "success": outcome.success,
            "method": outcome.method,
        }));
    } else if !output::is_quiet() {
        let s = Styled::new();
        println!(
            "  {} Signed in as {identifier} ({:.1}s)",
            s.ok_sym(),
            duration_ms as f64 / 1000.0
        );
    }
    Ok(())
}

/// Run a dataset fetch end to end: session, login, capture, normalize.
pub async fn run_fetch(kind: FetchKind, identifier: &str, secret_env: &str) -> Result<()> {
    let config = PortalConfig::from_env();
    let credentials = read_credentials(identifier, secret_env)?;
    let portal = Portal::new(config);

    let target = portal_host(portal.config()).unwrap_or_else(|| portal.config().base_url.clone());
    let spin = output::spinner(&format!("Fetching {} from {target}...", kind.operation()));
    let started = Instant::now();
    let result = match kind {
        FetchKind::Grades => portal.fetch_current_grades(&credentials).await,
        FetchKind::Transcript => portal.fetch_transcript(&credentials).await,
        FetchKind::Curriculum => portal.fetch_curriculum(&credentials).await,
    };
    if let Some(bar) = spin {
        bar.finish_and_clear();
    }
    let duration_ms = started.elapsed().as_millis() as u64;

    let records = result.as_ref().map(|o| o.data.len()).unwrap_or(0);
    audit(
        kind.operation(),
        portal.config(),
        duration_ms,
        records,
        result.as_ref().ok().map(|o| o.attempts),
        status_label(&result),
    );

    let outcome = result?;
    if output::is_json() {
        output::print_json(&serde_json::json!({
            "operation": kind.operation(),
            "method": outcome.method,
            "attempts": outcome.attempts,
            "records": outcome.data.len(),
            "data": outcome.data,
        }));
    } else if !output::is_quiet() {
        print_records(kind, &outcome.data, duration_ms);
    }
    Ok(())
}

/// Build credentials from the identifier argument and the secret
/// environment variable. The secret is never accepted as an argument so
/// it cannot leak through shell history or process listings.
fn read_credentials(identifier: &str, secret_env: &str) -> Result<Credentials> {
    let secret = std::env::var(secret_env)
        .with_context(|| format!("set {secret_env} to the portal password"))?;
    if secret.is_empty() {
        bail!("{secret_env} is set but empty");
    }
    Ok(Credentials::new(identifier, secret))
}

/// Audit outcome label for an operation result.
fn status_label<T>(result: &PortalResult<T>) -> &'static str {
    match result {
        Ok(_) => "ok",
        Err(PortalError::Authentication) => "auth_failed",
        Err(PortalError::Connection(_)) => "connection_failed",
        Err(PortalError::Parse { .. }) => "parse_failed",
    }
}

/// Host part of the configured portal URL, for audit entries.
fn portal_host(config: &PortalConfig) -> Option<String> {
    url::Url::parse(&config.base_url)
        .ok()
        .and_then(|u| u.host_str().map(String::from))
}

/// Best-effort audit write. A broken audit log never fails the operation.
fn audit(
    operation: &str,
    config: &PortalConfig,
    duration_ms: u64,
    records: usize,
    attempts: Option<u32>,
    status: &str,
) {
    match AuditLog::default_log() {
        Ok(mut log) => {
            if let Err(e) = log.log_operation(
                operation,
                portal_host(config).as_deref(),
                duration_ms,
                records,
                attempts,
                status,
            ) {
                warn!(error = %e, "audit write failed");
            }
        }
        Err(e) => warn!(error = %e, "audit log unavailable"),
    }
}

fn print_records(kind: FetchKind, records: &[CanonicalRecord], duration_ms: u64) {
    if records.is_empty() {
        println!("  No records returned.");
        return;
    }

    match kind {
        FetchKind::Curriculum => {
            println!(
                "  {:<10} {:<40} {:>4} {:>7}  {}",
                "CODE", "COURSE", "TERM", "CREDITS", "STATUS"
            );
            for r in records {
                println!(
                    "  {:<10} {:<40} {:>4} {:>7}  {}",
                    r.code,
                    clip(&r.name, 40),
                    r.term,
                    r.credits,
                    r.status
                );
            }
        }
        _ => {
            println!(
                "  {:<10} {:<40} {:>5} {:>4}  {}",
                "CODE", "COURSE", "GRADE", "ABS", "STATUS"
            );
            for r in records {
                println!(
                    "  {:<10} {:<40} {:>5} {:>4}  {}",
                    r.code,
                    clip(&r.name, 40),
                    fmt_grade(r.final_grade),
                    r.absences,
                    r.status
                );
            }
        }
    }

    println!();
    println!(
        "  {} records in {:.1}s",
        records.len(),
        duration_ms as f64 / 1000.0
    );
}

fn fmt_grade(grade: Option<f64>) -> String {
    match grade {
        Some(g) => format!("{g:.1}"),
        None => "-".to_string(),
    }
}

fn clip(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(max - 1).collect();
        out.push('…');
        out
    }
}
