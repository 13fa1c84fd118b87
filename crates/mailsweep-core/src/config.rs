//! Application configuration and local data paths.
//!
//! Configuration lives in a single JSON file under the platform config
//! directory. A missing or malformed ambient config silently falls back
//! to defaults; only an explicitly named config file fails loudly.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Cache staleness tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CacheConfig {
    /// Age, in hours, past which the cache is reported as stale.
    pub max_age_hours: f64,
    /// Whether stale caches are refreshed automatically before rule runs.
    pub auto_refresh: bool,
    /// Age, in hours, past which auto-refresh triggers.
    pub refresh_interval_hours: f64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_age_hours: 24.0,
            auto_refresh: true,
            refresh_interval_hours: 6.0,
        }
    }
}

/// Rule engine switches.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RulesConfig {
    /// Master switch; when off, rule runs return empty statistics.
    pub enabled: bool,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Threat scoring tuning.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScoringConfig {
    /// Domains never flagged by the scoring heuristics.
    pub trusted_domains: Vec<String>,
}

impl ScoringConfig {
    /// Whether a domain is on the trusted list (case-insensitive).
    #[must_use]
    pub fn is_trusted(&self, domain: &str) -> bool {
        self.trusted_domains
            .iter()
            .any(|d| d.eq_ignore_ascii_case(domain))
    }
}

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AppConfig {
    /// Cache staleness settings.
    pub cache: CacheConfig,
    /// Rule engine settings.
    pub rules: RulesConfig,
    /// Threat scoring settings.
    pub scoring: ScoringConfig,
    /// Overrides the platform data directory when set.
    pub data_dir: Option<PathBuf>,
}

impl AppConfig {
    /// Loads the ambient configuration.
    ///
    /// A missing or malformed file yields the defaults; the assistant
    /// must stay usable with no configuration at all.
    pub async fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };
        match tokio::fs::read_to_string(&path).await {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(config) => {
                    debug!(path = %path.display(), "Loaded configuration");
                    config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "Configuration is malformed; using defaults"
                    );
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }

    /// Loads configuration from an explicitly named file.
    ///
    /// # Errors
    ///
    /// Unlike [`load`](Self::load), a named file that is missing or
    /// malformed is an error; the user asked for that file specifically.
    pub async fn load_from(path: &Path) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path).await?;
        serde_json::from_str(&raw)
            .map_err(|err| Error::Config(format!("{}: {err}", path.display())))
    }

    /// Writes the configuration as pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns an error when serialization or the write fails.
    pub async fn save_to(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, json).await?;
        Ok(())
    }

    /// Platform path of the ambient config file, if one can be derived.
    #[must_use]
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("mailsweep").join("config.json"))
    }

    /// Directory holding caches, rule files, and the audit log.
    #[must_use]
    pub fn data_dir(&self) -> PathBuf {
        if let Some(dir) = &self.data_dir {
            return dir.clone();
        }
        dirs::data_dir().map_or_else(|| PathBuf::from(".mailsweep"), |d| d.join("mailsweep"))
    }

    /// Cache snapshot path for one mailbox.
    #[must_use]
    pub fn cache_path(&self, mailbox_email: &str) -> PathBuf {
        self.data_dir()
            .join(format!("cache-{}.json", sanitize_key(mailbox_email)))
    }

    /// Audit log path.
    #[must_use]
    pub fn audit_path(&self) -> PathBuf {
        self.data_dir().join("audit.log")
    }
}

/// Reduces an arbitrary user key to a filesystem-safe name fragment.
///
/// ASCII alphanumerics, `.` and `-` are kept; every other character
/// becomes `_`. An empty or whitespace-only key yields `default`.
#[must_use]
pub fn sanitize_key(key: &str) -> String {
    let cleaned: String = key
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "default".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_key_replaces_unsafe_characters() {
        assert_eq!(sanitize_key("Me@Example.com"), "me_example.com");
        assert_eq!(sanitize_key("a/b\\c:d"), "a_b_c_d");
        assert_eq!(sanitize_key("  "), "default");
        assert_eq!(sanitize_key(""), "default");
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert!((config.cache.max_age_hours - 24.0).abs() < f64::EPSILON);
        assert!(config.cache.auto_refresh);
        assert!(config.rules.enabled);
        assert!(config.scoring.trusted_domains.is_empty());
    }

    #[test]
    fn test_trusted_domain_lookup_is_case_insensitive() {
        let scoring = ScoringConfig {
            trusted_domains: vec!["Work.example".to_string()],
        };
        assert!(scoring.is_trusted("work.example"));
        assert!(scoring.is_trusted("WORK.EXAMPLE"));
        assert!(!scoring.is_trusted("shop.example"));
    }

    #[tokio::test]
    async fn test_partial_config_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        tokio::fs::write(&path, r#"{"rules": {"enabled": false}}"#)
            .await
            .unwrap();

        let config = AppConfig::load_from(&path).await.unwrap();
        assert!(!config.rules.enabled);
        assert!(config.cache.auto_refresh);
    }

    #[tokio::test]
    async fn test_load_from_malformed_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        tokio::fs::write(&path, "not json").await.unwrap();
        assert!(AppConfig::load_from(&path).await.is_err());
    }

    #[tokio::test]
    async fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let config = AppConfig {
            data_dir: Some(dir.path().join("data")),
            ..AppConfig::default()
        };
        config.save_to(&path).await.unwrap();

        let loaded = AppConfig::load_from(&path).await.unwrap();
        assert_eq!(loaded.data_dir, config.data_dir);
        assert_eq!(
            loaded.cache_path("Me@Example.com"),
            dir.path().join("data").join("cache-me_example.com.json")
        );
    }
}
