//! Mailbox provider abstraction.
//!
//! The assistant talks to a mailbox only through [`MailService`], so the
//! cache and rule engine stay independent of any concrete provider.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cache::model::MessageRecord;

/// Extended property id carrying the message size in bytes.
pub const PROP_MESSAGE_SIZE: &str = "Integer 0x0E08";
/// Extended property id carrying the attachment flag.
pub const PROP_HAS_ATTACHMENTS: &str = "Boolean 0x0E1B";

/// Error from a mailbox provider operation.
#[derive(Debug, Error)]
pub enum MailServiceError {
    /// The referenced message does not exist in the mailbox.
    #[error("Message not found: {0}")]
    MessageNotFound(String),

    /// The referenced folder does not exist in the mailbox.
    #[error("Folder not found: {0}")]
    FolderNotFound(String),

    /// Any other provider-side failure.
    #[error("Mailbox backend error: {0}")]
    Backend(String),
}

/// Result type for mailbox provider operations.
pub type MailServiceResult<T> = std::result::Result<T, MailServiceError>;

/// A mail folder as reported by the provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailFolder {
    /// Provider-assigned folder identifier.
    pub id: String,
    /// Human-readable folder name.
    pub display_name: String,
}

/// A message as returned by the provider, before cache normalization.
///
/// Size and attachment presence arrive through `extended` under
/// [`PROP_MESSAGE_SIZE`] and [`PROP_HAS_ATTACHMENTS`], mirroring how the
/// upstream mailbox exposes them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMessage {
    /// Provider-assigned message identifier.
    pub id: String,
    /// Message subject.
    #[serde(default)]
    pub subject: String,
    /// Sender display name.
    #[serde(default)]
    pub sender_name: String,
    /// Sender email address.
    #[serde(default, rename = "senderEmailAddress")]
    pub sender_email: String,
    /// When the message was received.
    pub received_at: DateTime<Utc>,
    /// Whether the message has been read.
    #[serde(default)]
    pub is_read: bool,
    /// Whether a follow-up flag is set.
    #[serde(default)]
    pub is_flagged: bool,
    /// Importance marker, when the provider reports one.
    #[serde(default)]
    pub importance: Option<String>,
    /// Body preview text, when available.
    #[serde(default)]
    pub preview: Option<String>,
    /// Recipient addresses.
    #[serde(default)]
    pub to_recipients: Vec<String>,
    /// Assigned categories.
    #[serde(default)]
    pub categories: Vec<String>,
    /// Extended properties keyed by property id.
    #[serde(default)]
    pub extended: HashMap<String, String>,
}

impl From<RawMessage> for MessageRecord {
    fn from(raw: RawMessage) -> Self {
        let size_bytes = raw
            .extended
            .get(PROP_MESSAGE_SIZE)
            .and_then(|v| v.trim().parse::<i64>().ok());
        let has_attachments = raw
            .extended
            .get(PROP_HAS_ATTACHMENTS)
            .is_some_and(|v| v.trim().eq_ignore_ascii_case("true"));

        Self {
            id: raw.id,
            subject: raw.subject,
            sender_name: raw.sender_name,
            sender_email: raw.sender_email,
            received_at: raw.received_at,
            size_bytes,
            has_attachments,
            to_recipients: raw.to_recipients,
            categories: raw.categories,
            is_read: raw.is_read,
            importance: raw.importance,
            preview: raw.preview,
        }
    }
}

/// Operations the assistant needs from a mailbox provider.
///
/// Implementations are driven strictly sequentially; no call overlaps
/// another on the same service value.
#[allow(async_fn_in_trait)]
pub trait MailService {
    /// Lists the messages currently in the inbox.
    ///
    /// # Errors
    ///
    /// Returns an error when the provider cannot produce a listing.
    async fn list_messages(&self) -> MailServiceResult<Vec<RawMessage>>;

    /// Permanently deletes a message.
    ///
    /// # Errors
    ///
    /// Returns [`MailServiceError::MessageNotFound`] for an unknown id.
    async fn delete_message(&mut self, message_id: &str) -> MailServiceResult<()>;

    /// Moves a message into the given folder.
    ///
    /// # Errors
    ///
    /// Returns an error when the message or folder does not exist.
    async fn move_message(&mut self, message_id: &str, folder_id: &str) -> MailServiceResult<()>;

    /// Marks a message read or unread.
    ///
    /// # Errors
    ///
    /// Returns [`MailServiceError::MessageNotFound`] for an unknown id.
    async fn set_read_state(&mut self, message_id: &str, is_read: bool) -> MailServiceResult<()>;

    /// Appends a category to a message.
    ///
    /// # Errors
    ///
    /// Returns [`MailServiceError::MessageNotFound`] for an unknown id.
    async fn add_category(&mut self, message_id: &str, category: &str) -> MailServiceResult<()>;

    /// Sets the follow-up flag on a message.
    ///
    /// # Errors
    ///
    /// Returns [`MailServiceError::MessageNotFound`] for an unknown id.
    async fn flag_message(&mut self, message_id: &str) -> MailServiceResult<()>;

    /// Lists all folders in the mailbox.
    ///
    /// # Errors
    ///
    /// Returns an error when the provider cannot produce a listing.
    async fn list_folders(&self) -> MailServiceResult<Vec<MailFolder>>;

    /// Creates a folder with the given display name.
    ///
    /// # Errors
    ///
    /// Returns an error when the provider rejects the creation.
    async fn create_folder(&mut self, display_name: &str) -> MailServiceResult<MailFolder>;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn raw(id: &str) -> RawMessage {
        RawMessage {
            id: id.to_string(),
            subject: "Subject".to_string(),
            sender_name: "Sender".to_string(),
            sender_email: "s@example.com".to_string(),
            received_at: Utc::now(),
            is_read: false,
            is_flagged: false,
            importance: None,
            preview: None,
            to_recipients: Vec::new(),
            categories: Vec::new(),
            extended: HashMap::new(),
        }
    }

    #[test]
    fn test_record_from_raw_parses_extended_properties() {
        let mut message = raw("m1");
        message
            .extended
            .insert(PROP_MESSAGE_SIZE.to_string(), "1048576".to_string());
        message
            .extended
            .insert(PROP_HAS_ATTACHMENTS.to_string(), "True".to_string());

        let record = MessageRecord::from(message);
        assert_eq!(record.size_bytes, Some(1_048_576));
        assert!(record.has_attachments);
    }

    #[test]
    fn test_record_from_raw_without_extended_properties() {
        let record = MessageRecord::from(raw("m1"));
        assert_eq!(record.size_bytes, None);
        assert!(!record.has_attachments);
    }

    #[test]
    fn test_record_from_raw_ignores_garbage_size() {
        let mut message = raw("m1");
        message
            .extended
            .insert(PROP_MESSAGE_SIZE.to_string(), "not-a-number".to_string());
        let record = MessageRecord::from(message);
        assert_eq!(record.size_bytes, None);
    }
}
