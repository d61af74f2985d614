//! JSONL audit trail of portal operations.
//!
//! Append-only log of what ran, when, for how long, and with what
//! outcome. Coarse: operation names and record counts only, never
//! credentials, student identifiers, or captured payloads. Rotation
//! mirrors the usual `.1`..`.5` scheme.

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

/// Maximum audit log size before rotation (100 MB).
const MAX_LOG_SIZE: u64 = 100 * 1024 * 1024;

/// Maximum number of rotated log files to keep.
const MAX_ROTATIONS: u32 = 5;

/// A single operation record.
#[derive(Debug, Clone, Serialize)]
pub struct OperationEvent {
    pub timestamp: String,
    /// Operation name: "login", "grades", "transcript", "curriculum".
    pub operation: String,
    /// Portal host the operation ran against.
    pub portal: Option<String>,
    pub duration_ms: u64,
    /// Canonical records produced, zero for login.
    pub records: usize,
    /// Browser sessions consumed, when the operation reported it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempts: Option<u32>,
    /// Outcome: "ok", "auth_failed", "connection_failed", "parse_failed".
    pub status: String,
}

/// Append-only JSONL logger with automatic rotation.
pub struct AuditLog {
    file: File,
    path: PathBuf,
    /// Approximate current size (may drift slightly; re-checked on rotation).
    current_size: u64,
}

impl AuditLog {
    /// Open or create the audit log file.
    pub fn open(path: &PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open audit log: {}", path.display()))?;

        let current_size = file.metadata().map(|m| m.len()).unwrap_or(0);

        Ok(Self {
            file,
            path: path.clone(),
            current_size,
        })
    }

    /// Open the default audit log at ~/.portico/audit.jsonl.
    pub fn default_log() -> Result<Self> {
        let path = dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join(".portico")
            .join("audit.jsonl");
        Self::open(&path)
    }

    /// Append one event.
    pub fn log(&mut self, event: &OperationEvent) -> Result<()> {
        if self.current_size >= MAX_LOG_SIZE {
            self.rotate()?;
        }

        let json = serde_json::to_string(event)?;
        let bytes_written = writeln!(self.file, "{json}")
            .map(|()| json.len() as u64 + 1)
            .unwrap_or(0);
        self.current_size += bytes_written;
        Ok(())
    }

    /// Append an operation with its outcome and timing.
    pub fn log_operation(
        &mut self,
        operation: &str,
        portal: Option<&str>,
        duration_ms: u64,
        records: usize,
        attempts: Option<u32>,
        status: &str,
    ) -> Result<()> {
        self.log(&OperationEvent {
            timestamp: Utc::now().to_rfc3339(),
            operation: operation.to_string(),
            portal: portal.map(String::from),
            duration_ms,
            records,
            attempts,
            status: status.to_string(),
        })
    }

    /// Rotate log files: audit.jsonl → audit.jsonl.1, .1 → .2, etc.
    fn rotate(&mut self) -> Result<()> {
        self.file.flush()?;

        for i in (1..MAX_ROTATIONS).rev() {
            let from = rotation_path(&self.path, i);
            let to = rotation_path(&self.path, i + 1);
            if from.exists() {
                let _ = std::fs::rename(&from, &to);
            }
        }

        let first_rotation = rotation_path(&self.path, 1);
        let _ = std::fs::rename(&self.path, &first_rotation);

        let oldest = rotation_path(&self.path, MAX_ROTATIONS);
        if oldest.exists() {
            let _ = std::fs::remove_file(&oldest);
        }

        self.file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| "failed to reopen audit log after rotation")?;
        self.current_size = 0;

        Ok(())
    }
}

/// Build path for a rotated log file: `audit.jsonl.1`, `audit.jsonl.2`, etc.
fn rotation_path(base: &std::path::Path, index: u32) -> PathBuf {
    let name = format!(
        "{}.{index}",
        base.file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("audit.jsonl")
    );
    base.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_appends_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        let mut log = AuditLog::open(&path).unwrap();

        log.log_operation("transcript", Some("portal.example.edu.br"), 8200, 42, Some(2), "ok")
            .unwrap();
        log.log_operation("login", Some("portal.example.edu.br"), 4100, 0, None, "auth_failed")
            .unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["operation"], "transcript");
        assert_eq!(first["records"], 42);
        assert_eq!(first["attempts"], 2);
        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["status"], "auth_failed");
        assert!(second.get("attempts").is_none());
    }

    #[test]
    fn test_reopen_appends_not_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        {
            let mut log = AuditLog::open(&path).unwrap();
            log.log_operation("grades", None, 100, 5, Some(1), "ok").unwrap();
        }
        {
            let mut log = AuditLog::open(&path).unwrap();
            log.log_operation("grades", None, 120, 5, Some(1), "ok").unwrap();
        }
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);
    }

    #[test]
    fn test_rotation_paths() {
        let base = PathBuf::from("/var/log/portico/audit.jsonl");
        assert_eq!(
            rotation_path(&base, 1),
            PathBuf::from("/var/log/portico/audit.jsonl.1")
        );
        assert_eq!(
            rotation_path(&base, 3),
            PathBuf::from("/var/log/portico/audit.jsonl.3")
        );
    }
}
