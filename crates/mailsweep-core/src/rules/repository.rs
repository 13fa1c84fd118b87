//! Persisted rule storage with versioned-file semantics.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::sanitize_key;
use crate::error::Result;
use crate::rules::model::AutomationRule;

/// Current rule file format version.
pub const RULES_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RuleFile {
    #[serde(rename = "Version", default = "default_version")]
    version: u32,
    #[serde(rename = "Rules", default)]
    rules: Vec<AutomationRule>,
    #[serde(rename = "LastUpdated", default)]
    last_updated: Option<DateTime<Utc>>,
}

const fn default_version() -> u32 {
    RULES_FORMAT_VERSION
}

impl Default for RuleFile {
    fn default() -> Self {
        Self {
            version: RULES_FORMAT_VERSION,
            rules: Vec::new(),
            last_updated: None,
        }
    }
}

/// Repository over one user's rule file.
///
/// All mutations follow a load-mutate-save cycle under an internal mutex,
/// making the single-writer assumption explicit. The file is not safe for
/// concurrent multi-process access.
#[derive(Debug)]
pub struct RuleRepository {
    path: PathBuf,
    state: Mutex<RuleFile>,
}

impl RuleRepository {
    /// Opens (or creates) the rule file for one user key.
    ///
    /// The key is sanitized into a filesystem-safe file name; an empty key
    /// falls back to `default`. A missing file is created with an empty
    /// rule list. A malformed file is replaced by an empty list with a
    /// warning; rule-file corruption is recoverable, not fatal.
    ///
    /// # Errors
    ///
    /// Returns an error when the directory or file cannot be created.
    pub async fn open(dir: &Path, user_key: &str) -> Result<Self> {
        let key = sanitize_key(user_key);
        let path = dir.join(format!("rules-{key}.json"));
        tokio::fs::create_dir_all(dir).await?;

        // Raw bytes, not a string: invalid UTF-8 from a torn write must
        // reach the malformed branch, not surface as an I/O error.
        let state = match tokio::fs::read(&path).await {
            Ok(raw) => match serde_json::from_slice::<RuleFile>(&raw) {
                Ok(file) => {
                    debug!(path = %path.display(), rules = file.rules.len(), "Loaded rule file");
                    file
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "Rule file is malformed; starting with an empty rule list"
                    );
                    RuleFile::default()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                let file = RuleFile::default();
                write_rule_file(&path, &file).await?;
                info!(path = %path.display(), "Created empty rule file");
                file
            }
            Err(err) => return Err(err.into()),
        };

        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    /// Path of the backing rule file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All rules in stored order.
    pub async fn list(&self) -> Vec<AutomationRule> {
        self.state.lock().await.rules.clone()
    }

    /// Looks up one rule by id.
    pub async fn get(&self, id: Uuid) -> Option<AutomationRule> {
        self.state
            .lock()
            .await
            .rules
            .iter()
            .find(|r| r.id == id)
            .cloned()
    }

    /// Upserts a rule by id.
    ///
    /// An existing rule is replaced in place, keeping its list position;
    /// a new rule is appended. The store timestamp is bumped on every
    /// write.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be written.
    pub async fn save(&self, rule: AutomationRule) -> Result<()> {
        let mut state = self.state.lock().await;
        match state.rules.iter_mut().find(|r| r.id == rule.id) {
            Some(existing) => *existing = rule,
            None => state.rules.push(rule),
        }
        state.last_updated = Some(Utc::now());
        write_rule_file(&self.path, &state).await
    }

    /// Removes a rule by id.
    ///
    /// Returns `false` (a no-op, not an error) when no rule has that id.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be written.
    pub async fn remove(&self, id: Uuid) -> Result<bool> {
        let mut state = self.state.lock().await;
        let before = state.rules.len();
        state.rules.retain(|r| r.id != id);
        if state.rules.len() == before {
            return Ok(false);
        }
        state.last_updated = Some(Utc::now());
        write_rule_file(&self.path, &state).await?;
        Ok(true)
    }

    /// Enables or disables a rule.
    ///
    /// Returns `false` when no rule has that id.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be written.
    pub async fn set_enabled(&self, id: Uuid, enabled: bool) -> Result<bool> {
        let mut state = self.state.lock().await;
        let Some(rule) = state.rules.iter_mut().find(|r| r.id == id) else {
            return Ok(false);
        };
        rule.enabled = enabled;
        state.last_updated = Some(Utc::now());
        write_rule_file(&self.path, &state).await?;
        Ok(true)
    }

    /// Writes back execution counters after a live rule run.
    ///
    /// For each given rule whose id is still present, the stored counters
    /// and last-execution time are overwritten; rules deleted since the
    /// run started are skipped, not resurrected. The file is written once.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be written.
    pub async fn apply_counters(&self, executed: &[AutomationRule]) -> Result<()> {
        let mut state = self.state.lock().await;
        let mut changed = false;
        for run_rule in executed {
            if let Some(stored) = state.rules.iter_mut().find(|r| r.id == run_rule.id) {
                stored.execution_count = run_rule.execution_count;
                stored.success_count = run_rule.success_count;
                stored.failure_count = run_rule.failure_count;
                stored.last_executed_at = run_rule.last_executed_at;
                changed = true;
            }
        }
        if !changed {
            return Ok(());
        }
        state.last_updated = Some(Utc::now());
        write_rule_file(&self.path, &state).await
    }

    /// When the store was last written, if ever.
    pub async fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.state.lock().await.last_updated
    }
}

async fn write_rule_file(path: &Path, file: &RuleFile) -> Result<()> {
    let json = serde_json::to_string_pretty(file)?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, json).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::rules::model::{RuleAction, RuleBuilder};

    async fn open_repo(dir: &tempfile::TempDir) -> RuleRepository {
        RuleRepository::open(dir.path(), "me@example.com")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_open_creates_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let repo = open_repo(&dir).await;
        assert!(repo.path().exists());
        assert!(repo.list().await.is_empty());

        let name = repo.path().file_name().unwrap().to_string_lossy().into_owned();
        assert_eq!(name, "rules-me_example.com.json");
    }

    #[tokio::test]
    async fn test_save_appends_then_replaces_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let repo = open_repo(&dir).await;

        let first = RuleBuilder::new("First").action(RuleAction::Flag).build();
        let second = RuleBuilder::new("Second").action(RuleAction::Delete).build();
        repo.save(first.clone()).await.unwrap();
        repo.save(second).await.unwrap();

        let mut renamed = first;
        renamed.name = "First, renamed".to_string();
        repo.save(renamed).await.unwrap();

        let rules = repo.list().await;
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].name, "First, renamed");
        assert_eq!(rules[1].name, "Second");
    }

    #[tokio::test]
    async fn test_remove_absent_id_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let repo = open_repo(&dir).await;
        assert!(!repo.remove(Uuid::new_v4()).await.unwrap());

        let rule = RuleBuilder::new("Keep me").build();
        repo.save(rule.clone()).await.unwrap();
        assert!(repo.remove(rule.id).await.unwrap());
        assert!(repo.list().await.is_empty());
    }

    #[tokio::test]
    async fn test_set_enabled_toggles() {
        let dir = tempfile::tempdir().unwrap();
        let repo = open_repo(&dir).await;
        let rule = RuleBuilder::new("Toggle").build();
        repo.save(rule.clone()).await.unwrap();

        assert!(repo.set_enabled(rule.id, false).await.unwrap());
        assert!(!repo.get(rule.id).await.unwrap().enabled);
        assert!(!repo.set_enabled(Uuid::new_v4(), true).await.unwrap());
    }

    #[tokio::test]
    async fn test_reopen_reads_persisted_rules() {
        let dir = tempfile::tempdir().unwrap();
        {
            let repo = open_repo(&dir).await;
            repo.save(RuleBuilder::new("Persisted").build()).await.unwrap();
        }
        let reopened = open_repo(&dir).await;
        assert_eq!(reopened.list().await.len(), 1);
        assert!(reopened.last_updated().await.is_some());
    }

    #[tokio::test]
    async fn test_malformed_file_resets_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rules-me_example.com.json");
        tokio::fs::write(&path, "][").await.unwrap();

        let repo = open_repo(&dir).await;
        assert!(repo.list().await.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_utf8_file_resets_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rules-me_example.com.json");
        tokio::fs::write(&path, b"\xff\xfe\x00torn write").await.unwrap();

        let repo = open_repo(&dir).await;
        assert!(repo.list().await.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_action_type_resets_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rules-me_example.com.json");
        let bad = r#"{
            "Version": 1,
            "Rules": [{
                "id": "5d5b1c3c-2c6a-4f76-9d57-0a3bfae97e9b",
                "name": "Bad",
                "conditions": {},
                "action": {"type": "Teleport"},
                "createdAt": "2026-01-01T00:00:00Z"
            }],
            "LastUpdated": null
        }"#;
        tokio::fs::write(&path, bad).await.unwrap();

        let repo = open_repo(&dir).await;
        assert!(repo.list().await.is_empty());
    }

    #[tokio::test]
    async fn test_apply_counters_skips_deleted_rules() {
        let dir = tempfile::tempdir().unwrap();
        let repo = open_repo(&dir).await;
        let kept = RuleBuilder::new("Kept").build();
        repo.save(kept.clone()).await.unwrap();

        let mut kept_run = kept.clone();
        kept_run.execution_count = 3;
        kept_run.success_count = 2;
        kept_run.failure_count = 1;
        kept_run.last_executed_at = Some(Utc::now());

        let deleted_run = RuleBuilder::new("Deleted meanwhile").build();
        repo.apply_counters(&[kept_run, deleted_run]).await.unwrap();

        let rules = repo.list().await;
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].execution_count, 3);
        assert_eq!(rules[0].success_count, 2);
        assert_eq!(rules[0].failure_count, 1);
        assert!(rules[0].last_executed_at.is_some());
    }
}
