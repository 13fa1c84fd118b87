//! Snapshot persistence and maintenance for the domain-keyed message cache.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::cache::model::{
    CacheMetadata, CacheSnapshot, DomainBucket, MessageRecord, RebuildStats, UNKNOWN_DOMAIN,
};
use crate::config::CacheConfig;
use crate::error::{Error, Result};

/// Age reported when neither metadata nor the snapshot file can date the
/// cache. Large enough to exceed any reasonable refresh threshold.
pub const AGE_UNKNOWN_HOURS: f64 = 999.0;

/// Repository over one mailbox's cache snapshot file.
///
/// All state lives in memory; [`load`](Self::load) and
/// [`save`](Self::save) are the only disk operations.
#[derive(Debug)]
pub struct CacheRepository {
    path: PathBuf,
    snapshot: CacheSnapshot,
}

impl CacheRepository {
    /// Creates an empty repository backed by the given snapshot path.
    ///
    /// Nothing is read from disk until [`load`](Self::load) is called.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            snapshot: CacheSnapshot::default(),
        }
    }

    /// Path of the backing snapshot file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the snapshot from disk.
    ///
    /// Returns `Ok(true)` when a snapshot was read and parsed. Stale
    /// declared counts are repaired on the way in; what cannot be repaired
    /// (a message without an identifier) leaves the cache flagged invalid
    /// but still usable. A missing file or malformed content resets the
    /// in-memory state to empty and returns `Ok(false)`; corruption is
    /// recoverable, not fatal.
    ///
    /// # Errors
    ///
    /// Returns an error only when the file exists but cannot be read.
    pub async fn load(&mut self) -> Result<bool> {
        // Raw bytes, not a string: a torn write can leave invalid UTF-8,
        // which must land in the malformed branch below.
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No cache snapshot on disk");
                self.snapshot = CacheSnapshot::default();
                return Ok(false);
            }
            Err(err) => return Err(Error::Io(err)),
        };

        match serde_json::from_slice::<CacheSnapshot>(&raw) {
            Ok(snapshot) => {
                self.snapshot = snapshot;
                self.repair();
                if !self.snapshot.metadata.is_valid {
                    warn!(path = %self.path.display(), "Loaded cache failed integrity validation");
                }
                Ok(true)
            }
            Err(err) => {
                warn!(
                    path = %self.path.display(),
                    error = %err,
                    "Cache snapshot is malformed; starting from an empty cache"
                );
                self.snapshot = CacheSnapshot::default();
                Ok(false)
            }
        }
    }

    /// Writes the snapshot to disk, refreshing metadata first.
    ///
    /// The write goes through a temporary file in the same directory and a
    /// rename, so a crash mid-write cannot corrupt an existing snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyCache`] when there are no cached messages, or
    /// an I/O / serialization error if the write fails.
    pub async fn save(&mut self) -> Result<()> {
        if self.message_count() == 0 {
            return Err(Error::EmptyCache);
        }

        self.refresh_metadata();
        self.snapshot.metadata.last_updated = Some(Utc::now());
        self.snapshot.metadata.is_valid = validate_snapshot(&self.snapshot);

        let json = serde_json::to_string_pretty(&self.snapshot)?;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        info!(
            path = %self.path.display(),
            messages = self.snapshot.metadata.message_count,
            domains = self.snapshot.metadata.domain_count,
            "Saved cache snapshot"
        );
        Ok(())
    }

    /// Replaces the cached state wholesale from a fresh mailbox listing.
    ///
    /// Records are grouped into domain buckets keyed by the sender's
    /// lowercased domain; senders without a parseable domain land in the
    /// `unknown_domain` bucket.
    pub fn rebuild(&mut self, mailbox_email: &str, records: Vec<MessageRecord>) -> RebuildStats {
        let mut data: BTreeMap<String, DomainBucket> = BTreeMap::new();
        let mut stats = RebuildStats::default();

        for record in records {
            let domain = record.domain();
            if domain == UNKNOWN_DOMAIN {
                stats.unparsed_senders += 1;
            }
            data.entry(domain.clone())
                .or_insert_with(|| DomainBucket::new(domain))
                .push(record);
            stats.messages_indexed += 1;
        }
        stats.domains = data.len();

        self.snapshot = CacheSnapshot {
            metadata: CacheMetadata {
                created: Utc::now(),
                mailbox_email: mailbox_email.to_string(),
                message_count: stats.messages_indexed,
                domain_count: stats.domains,
                is_valid: true,
                ..CacheMetadata::default()
            },
            data,
        };

        info!(
            mailbox = mailbox_email,
            messages = stats.messages_indexed,
            domains = stats.domains,
            unparsed = stats.unparsed_senders,
            "Rebuilt cache from mailbox listing"
        );
        stats
    }

    /// Removes one message from its domain bucket.
    ///
    /// Returns `true` when a record was removed. The bucket is dropped
    /// entirely once its last message goes, and metadata counters are kept
    /// in step.
    pub fn remove_message(&mut self, domain: &str, message_id: &str) -> bool {
        let Some(bucket) = self.snapshot.data.get_mut(domain) else {
            return false;
        };
        let before = bucket.messages.len();
        bucket.messages.retain(|m| m.id != message_id);
        if bucket.messages.len() == before {
            return false;
        }
        bucket.count = bucket.messages.len();
        if bucket.messages.is_empty() {
            self.snapshot.data.remove(domain);
        }
        self.refresh_metadata();
        true
    }

    /// Checks snapshot integrity without mutating anything.
    ///
    /// A snapshot is valid when every bucket has a name, every declared
    /// count matches the actual message count, every message carries an
    /// identifier, and the metadata totals agree with the data.
    #[must_use]
    pub fn validate(&self) -> bool {
        validate_snapshot(&self.snapshot)
    }

    /// Repairs recoverable inconsistencies in place.
    ///
    /// Declared bucket counts are rewritten to actual lengths and metadata
    /// totals are recomputed. Returns the number of corrections applied.
    pub fn repair(&mut self) -> usize {
        let mut corrections = 0;

        for bucket in self.snapshot.data.values_mut() {
            if !bucket.count_consistent() {
                bucket.count = bucket.messages.len();
                corrections += 1;
            }
        }

        let message_total: usize = self.snapshot.data.values().map(|b| b.messages.len()).sum();
        if self.snapshot.metadata.message_count != message_total {
            self.snapshot.metadata.message_count = message_total;
            corrections += 1;
        }
        let domain_total = self.snapshot.data.len();
        if self.snapshot.metadata.domain_count != domain_total {
            self.snapshot.metadata.domain_count = domain_total;
            corrections += 1;
        }

        self.snapshot.metadata.is_valid = validate_snapshot(&self.snapshot);
        if corrections > 0 {
            info!(corrections, "Repaired cache snapshot");
        }
        corrections
    }

    /// Hours since the cache was last written.
    ///
    /// Falls back to the snapshot file's modification time when metadata
    /// carries no timestamp, and to [`AGE_UNKNOWN_HOURS`] when neither
    /// source is available.
    #[allow(clippy::cast_precision_loss)]
    pub async fn age_hours(&self) -> f64 {
        if let Some(last) = self.snapshot.metadata.last_updated {
            let seconds = Utc::now().signed_duration_since(last).num_seconds();
            return seconds.max(0) as f64 / 3600.0;
        }
        if let Ok(meta) = tokio::fs::metadata(&self.path).await {
            if let Ok(modified) = meta.modified() {
                if let Ok(elapsed) = modified.elapsed() {
                    return elapsed.as_secs_f64() / 3600.0;
                }
            }
        }
        AGE_UNKNOWN_HOURS
    }

    /// Whether the cache is older than the configured maximum age.
    ///
    /// A cache with no recorded age reports the unknown-age sentinel and
    /// therefore counts as stale.
    pub async fn is_stale(&self, config: &CacheConfig) -> bool {
        self.age_hours().await > config.max_age_hours
    }

    /// Whether the cache should be rebuilt before use.
    ///
    /// True when the cache failed validation, or when auto-refresh is on
    /// and the age exceeds the configured refresh interval. An empty,
    /// never-saved cache is never valid, so it always wants a refresh.
    pub async fn needs_refresh(&self, config: &CacheConfig) -> bool {
        if !self.snapshot.metadata.is_valid {
            return true;
        }
        config.auto_refresh && self.age_hours().await > config.refresh_interval_hours
    }

    /// Snapshot metadata.
    #[must_use]
    pub fn metadata(&self) -> &CacheMetadata {
        &self.snapshot.metadata
    }

    /// Whether the cache holds no messages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshot.data.values().all(|b| b.messages.is_empty())
    }

    /// Actual number of cached messages across all buckets.
    #[must_use]
    pub fn message_count(&self) -> usize {
        self.snapshot.data.values().map(|b| b.messages.len()).sum()
    }

    /// Number of domain buckets.
    #[must_use]
    pub fn domain_count(&self) -> usize {
        self.snapshot.data.len()
    }

    /// The bucket for one domain, if present.
    #[must_use]
    pub fn bucket(&self, domain: &str) -> Option<&DomainBucket> {
        self.snapshot.data.get(domain)
    }

    /// Iterates all domain buckets in key order.
    pub fn buckets(&self) -> impl Iterator<Item = &DomainBucket> {
        self.snapshot.data.values()
    }

    /// Iterates all cached messages across every bucket, in domain order.
    pub fn all_messages(&self) -> impl Iterator<Item = &MessageRecord> {
        self.snapshot.data.values().flat_map(|b| b.messages.iter())
    }

    /// Per-domain message counts sorted by volume, largest first.
    #[must_use]
    pub fn domain_counts(&self) -> Vec<(String, usize)> {
        let mut counts: Vec<(String, usize)> = self
            .snapshot
            .data
            .values()
            .map(|b| (b.name.clone(), b.messages.len()))
            .collect();
        counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        counts
    }

    /// Clears all cached state, leaving an empty snapshot.
    pub fn clear(&mut self) {
        self.snapshot = CacheSnapshot::default();
    }

    fn refresh_metadata(&mut self) {
        self.snapshot.metadata.message_count = self.message_count();
        self.snapshot.metadata.domain_count = self.snapshot.data.len();
    }
}

fn validate_snapshot(snapshot: &CacheSnapshot) -> bool {
    for (key, bucket) in &snapshot.data {
        if bucket.name.is_empty() {
            debug!(key, "Bucket has no name");
            return false;
        }
        if !bucket.count_consistent() {
            debug!(
                key,
                declared = bucket.count,
                actual = bucket.messages.len(),
                "Bucket count mismatch"
            );
            return false;
        }
        if bucket.messages.iter().any(|m| m.id.is_empty()) {
            debug!(key, "Bucket contains a message without an identifier");
            return false;
        }
    }

    let message_total: usize = snapshot.data.values().map(|b| b.messages.len()).sum();
    if snapshot.metadata.message_count != message_total {
        debug!(
            declared = snapshot.metadata.message_count,
            actual = message_total,
            "Metadata message count mismatch"
        );
        return false;
    }
    if snapshot.metadata.domain_count != snapshot.data.len() {
        debug!(
            declared = snapshot.metadata.domain_count,
            actual = snapshot.data.len(),
            "Metadata domain count mismatch"
        );
        return false;
    }
    true
}
