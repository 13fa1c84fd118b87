//! Cache data models and on-disk snapshot format.
//!
//! The snapshot file is a single JSON document:
//!
//! ```text
//! {
//!   "Metadata": { "version", "created", "lastUpdated", "mailboxEmail",
//!                 "messageCount", "domainCount", "isValid" },
//!   "Data": {
//!     "<domain>": { "Name", "Count", "Messages": [ ... ] },
//!     ...
//!   }
//! }
//! ```
//!
//! Field names are kept compatible with snapshots produced by earlier
//! versions of the assistant, hence the mixed casing on the wire.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Current snapshot format version.
pub const CACHE_FORMAT_VERSION: u32 = 1;

/// Bucket name used when a sender address has no parseable domain.
pub const UNKNOWN_DOMAIN: &str = "unknown_domain";

/// Extract the bucket key from a sender address.
///
/// The domain part is lowercased; an address without an `@` (or with an
/// empty domain part) maps to [`UNKNOWN_DOMAIN`].
#[must_use]
pub fn sender_domain(email: &str) -> String {
    match email.rsplit_once('@') {
        Some((_, domain)) if !domain.trim().is_empty() => domain.trim().to_lowercase(),
        _ => UNKNOWN_DOMAIN.to_string(),
    }
}

/// Normalized representation of one mailbox message as cached.
///
/// Records are immutable once stored; the only mutation the cache performs
/// is removal (after a delete or move).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRecord {
    /// Stable remote identifier. Unique within a snapshot.
    ///
    /// Defaulted on load so an id-less record surfaces through integrity
    /// validation instead of failing the whole deserialization.
    #[serde(default)]
    pub id: String,
    /// Message subject (may be empty).
    #[serde(default)]
    pub subject: String,
    /// Sender display name (may be empty).
    #[serde(default)]
    pub sender_name: String,
    /// Sender email address (may be empty).
    #[serde(default, rename = "senderEmailAddress")]
    pub sender_email: String,
    /// When the message was received.
    pub received_at: DateTime<Utc>,
    /// Message size in bytes; `None` when the mailbox did not report one.
    #[serde(default)]
    pub size_bytes: Option<i64>,
    /// Whether the message carries attachments.
    #[serde(default)]
    pub has_attachments: bool,
    /// Ordered list of recipient addresses.
    #[serde(default)]
    pub to_recipients: Vec<String>,
    /// Categories assigned to the message.
    #[serde(default)]
    pub categories: Vec<String>,
    /// Whether the message has been read.
    #[serde(default)]
    pub is_read: bool,
    /// Importance marker as reported by the mailbox (e.g. "High").
    #[serde(default)]
    pub importance: Option<String>,
    /// Preview text of the body, when available.
    #[serde(default)]
    pub preview: Option<String>,
}

impl MessageRecord {
    /// The domain bucket this record belongs to.
    #[must_use]
    pub fn domain(&self) -> String {
        sender_domain(&self.sender_email)
    }
}

/// One domain's worth of cached messages.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DomainBucket {
    /// Lowercased domain; the cache key.
    #[serde(default, rename = "Name")]
    pub name: String,
    /// Declared message count. Must equal `messages.len()`; repaired on load.
    #[serde(default, rename = "Count")]
    pub count: usize,
    /// Ordered message records.
    #[serde(default, rename = "Messages")]
    pub messages: Vec<MessageRecord>,
}

impl DomainBucket {
    /// Creates an empty bucket for the given domain.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            count: 0,
            messages: Vec::new(),
        }
    }

    /// Appends a record and keeps the declared count in step.
    pub fn push(&mut self, record: MessageRecord) {
        self.messages.push(record);
        self.count = self.messages.len();
    }

    /// Whether the declared count matches the actual message count.
    #[must_use]
    pub fn count_consistent(&self) -> bool {
        self.count == self.messages.len()
    }
}

/// Snapshot bookkeeping: creation/update times and summary counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CacheMetadata {
    /// Snapshot format version.
    pub version: u32,
    /// When the snapshot was first created.
    pub created: DateTime<Utc>,
    /// When the snapshot was last written. `None` for never-saved caches.
    pub last_updated: Option<DateTime<Utc>>,
    /// Address of the mailbox this snapshot was built from.
    pub mailbox_email: String,
    /// Total number of cached messages.
    pub message_count: usize,
    /// Number of domain buckets.
    pub domain_count: usize,
    /// Whether the last integrity validation passed.
    pub is_valid: bool,
}

impl Default for CacheMetadata {
    fn default() -> Self {
        Self {
            version: CACHE_FORMAT_VERSION,
            created: Utc::now(),
            last_updated: None,
            mailbox_email: String::new(),
            message_count: 0,
            domain_count: 0,
            is_valid: false,
        }
    }
}

/// The full persisted snapshot: metadata plus the domain-keyed index.
///
/// `BTreeMap` keeps domain iteration (and therefore serialization) in a
/// stable order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheSnapshot {
    /// Snapshot bookkeeping.
    #[serde(default, rename = "Metadata")]
    pub metadata: CacheMetadata,
    /// Domain-keyed message buckets.
    #[serde(default, rename = "Data")]
    pub data: BTreeMap<String, DomainBucket>,
}

/// Summary of one `rebuild` pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RebuildStats {
    /// Messages indexed into the cache.
    pub messages_indexed: usize,
    /// Distinct domain buckets created.
    pub domains: usize,
    /// Messages whose sender had no parseable domain.
    pub unparsed_senders: usize,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_sender_domain_lowercases() {
        assert_eq!(sender_domain("User@Example.COM"), "example.com");
    }

    #[test]
    fn test_sender_domain_without_at_is_unknown() {
        assert_eq!(sender_domain("not-an-address"), UNKNOWN_DOMAIN);
        assert_eq!(sender_domain(""), UNKNOWN_DOMAIN);
        assert_eq!(sender_domain("user@"), UNKNOWN_DOMAIN);
    }

    #[test]
    fn test_bucket_push_tracks_count() {
        let mut bucket = DomainBucket::new("example.com");
        bucket.push(MessageRecord {
            id: "m1".to_string(),
            subject: "Hello".to_string(),
            sender_name: String::new(),
            sender_email: "a@example.com".to_string(),
            received_at: Utc::now(),
            size_bytes: None,
            has_attachments: false,
            to_recipients: Vec::new(),
            categories: Vec::new(),
            is_read: false,
            importance: None,
            preview: None,
        });
        assert_eq!(bucket.count, 1);
        assert!(bucket.count_consistent());
    }

    #[test]
    fn test_message_record_tolerates_missing_optionals() {
        let json = r#"{
            "id": "m1",
            "subject": "Hi",
            "senderName": "A",
            "senderEmailAddress": "a@example.com",
            "receivedAt": "2026-01-10T08:00:00Z"
        }"#;
        let record: MessageRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.size_bytes, None);
        assert!(!record.has_attachments);
        assert!(record.to_recipients.is_empty());
    }

    #[test]
    fn test_message_record_missing_id_defaults_empty() {
        let json = r#"{
            "subject": "Hi",
            "receivedAt": "2026-01-10T08:00:00Z"
        }"#;
        let record: MessageRecord = serde_json::from_str(json).unwrap();
        assert!(record.id.is_empty());
    }
}
