//! Append-only audit trail of rule-triggered actions.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tokio::io::AsyncWriteExt;

use crate::error::Result;

/// One immutable audit record: a single rule-triggered action attempt.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    /// When the action was attempted.
    pub timestamp: DateTime<Utc>,
    /// Name of the rule that fired.
    pub rule_name: String,
    /// Whether this was a simulated run.
    pub dry_run: bool,
    /// Action type label.
    pub action: String,
    /// Subject of the affected message.
    pub message_subject: String,
    /// `Success` or `Failed: <reason>`.
    pub result: String,
}

impl AuditEntry {
    /// Builds an entry stamped with the current time.
    #[must_use]
    pub fn new(
        rule_name: impl Into<String>,
        dry_run: bool,
        action: impl Into<String>,
        message_subject: impl Into<String>,
        result: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            rule_name: rule_name.into(),
            dry_run,
            action: action.into(),
            message_subject: message_subject.into(),
            result: result.into(),
        }
    }

    /// Renders the entry as one log line.
    #[must_use]
    pub fn format_line(&self) -> String {
        let marker = if self.dry_run { "[DRY RUN] " } else { "" };
        format!(
            "{} | {}Rule: {} | Action: {} | Message: {} | Result: {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            marker,
            self.rule_name,
            self.action,
            self.message_subject,
            self.result
        )
    }
}

/// Append-only, line-oriented audit log file.
///
/// Entries are never rewritten; each append opens the file, writes one
/// line, and flushes.
#[derive(Debug, Clone)]
pub struct AuditLog {
    path: PathBuf,
}

impl AuditLog {
    /// Creates a log handle for the given file path.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the log file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one entry.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be opened or written.
    pub async fn append(&self, entry: &AuditEntry) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(entry.format_line().as_bytes()).await?;
        file.write_all(b"\n").await?;
        file.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_live_line_format() {
        let entry = AuditEntry {
            timestamp: "2026-03-05T14:30:00Z".parse().unwrap(),
            rule_name: "Old newsletters".to_string(),
            dry_run: false,
            action: "Delete".to_string(),
            message_subject: "Weekly digest".to_string(),
            result: "Success".to_string(),
        };
        assert_eq!(
            entry.format_line(),
            "2026-03-05 14:30:00 | Rule: Old newsletters | Action: Delete | \
             Message: Weekly digest | Result: Success"
        );
    }

    #[test]
    fn test_dry_run_line_is_marked() {
        let entry = AuditEntry {
            timestamp: "2026-03-05T14:30:00Z".parse().unwrap(),
            rule_name: "Old newsletters".to_string(),
            dry_run: true,
            action: "Delete".to_string(),
            message_subject: "Weekly digest".to_string(),
            result: "Success".to_string(),
        };
        assert!(entry.format_line().contains("| [DRY RUN] Rule: Old newsletters |"));
    }

    #[tokio::test]
    async fn test_append_accumulates_lines() {
        let dir = tempfile::tempdir().unwrap();
        let log = AuditLog::new(dir.path().join("audit.log"));

        log.append(&AuditEntry::new("R1", false, "Flag", "First", "Success"))
            .await
            .unwrap();
        log.append(&AuditEntry::new(
            "R2",
            true,
            "Delete",
            "Second",
            "Failed: Message not found: m9",
        ))
        .await
        .unwrap();

        let contents = tokio::fs::read_to_string(log.path()).await.unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("Rule: R1"));
        assert!(lines[1].contains("[DRY RUN] Rule: R2"));
        assert!(lines[1].ends_with("Result: Failed: Message not found: m9"));
    }
}
