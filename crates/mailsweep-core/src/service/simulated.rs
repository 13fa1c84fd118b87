//! In-memory mailbox provider backed by an optional JSON fixture file.
//!
//! Used for dry-run rehearsals, demos, and tests. The fixture format is a
//! plain JSON document holding the mailbox address, its folders, and the
//! stored messages with their current folder assignment.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::Result;
use crate::service::mail::{
    MailFolder, MailService, MailServiceError, MailServiceResult, RawMessage,
};

/// Folder id of the built-in inbox.
pub const INBOX_FOLDER_ID: &str = "inbox";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredMessage {
    #[serde(flatten)]
    message: RawMessage,
    #[serde(default = "default_folder_id")]
    folder_id: String,
}

fn default_folder_id() -> String {
    INBOX_FOLDER_ID.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct MailboxFile {
    mailbox_email: String,
    #[serde(default)]
    folders: Vec<MailFolder>,
    #[serde(default)]
    messages: Vec<StoredMessage>,
}

/// A mailbox that lives entirely in memory.
#[derive(Debug, Clone)]
pub struct SimulatedMailbox {
    mailbox_email: String,
    folders: Vec<MailFolder>,
    messages: Vec<StoredMessage>,
}

impl SimulatedMailbox {
    /// Creates an empty mailbox containing only the inbox folder.
    #[must_use]
    pub fn new(mailbox_email: impl Into<String>) -> Self {
        Self {
            mailbox_email: mailbox_email.into(),
            folders: vec![MailFolder {
                id: INBOX_FOLDER_ID.to_string(),
                display_name: "Inbox".to_string(),
            }],
            messages: Vec::new(),
        }
    }

    /// Loads a mailbox from a JSON fixture file.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be read or parsed. Unlike the
    /// cache, a broken fixture is not recoverable.
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path.as_ref()).await?;
        let file: MailboxFile = serde_json::from_str(&raw)?;
        let mut mailbox = Self {
            mailbox_email: file.mailbox_email,
            folders: file.folders,
            messages: file.messages,
        };
        if !mailbox.folders.iter().any(|f| f.id == INBOX_FOLDER_ID) {
            mailbox.folders.insert(
                0,
                MailFolder {
                    id: INBOX_FOLDER_ID.to_string(),
                    display_name: "Inbox".to_string(),
                },
            );
        }
        debug!(
            mailbox = %mailbox.mailbox_email,
            messages = mailbox.messages.len(),
            folders = mailbox.folders.len(),
            "Loaded simulated mailbox"
        );
        Ok(mailbox)
    }

    /// Writes the mailbox back to a JSON fixture file.
    ///
    /// # Errors
    ///
    /// Returns an error when serialization or the write fails.
    pub async fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = MailboxFile {
            mailbox_email: self.mailbox_email.clone(),
            folders: self.folders.clone(),
            messages: self.messages.clone(),
        };
        let json = serde_json::to_string_pretty(&file)?;
        if let Some(parent) = path.as_ref().parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path.as_ref(), json).await?;
        Ok(())
    }

    /// Address of the mailbox owner.
    #[must_use]
    pub fn mailbox_email(&self) -> &str {
        &self.mailbox_email
    }

    /// Adds a message to the inbox.
    pub fn add_message(&mut self, message: RawMessage) {
        self.messages.push(StoredMessage {
            message,
            folder_id: INBOX_FOLDER_ID.to_string(),
        });
    }

    /// Looks up one message by id, regardless of folder.
    #[must_use]
    pub fn message(&self, message_id: &str) -> Option<&RawMessage> {
        self.messages
            .iter()
            .find(|m| m.message.id == message_id)
            .map(|m| &m.message)
    }

    /// Folder assignment of one message, if it exists.
    #[must_use]
    pub fn folder_of(&self, message_id: &str) -> Option<&str> {
        self.messages
            .iter()
            .find(|m| m.message.id == message_id)
            .map(|m| m.folder_id.as_str())
    }

    /// Finds a folder by display name, case-insensitively.
    #[must_use]
    pub fn folder_named(&self, display_name: &str) -> Option<&MailFolder> {
        self.folders
            .iter()
            .find(|f| f.display_name.eq_ignore_ascii_case(display_name))
    }

    fn entry_mut(&mut self, message_id: &str) -> MailServiceResult<&mut StoredMessage> {
        self.messages
            .iter_mut()
            .find(|m| m.message.id == message_id)
            .ok_or_else(|| MailServiceError::MessageNotFound(message_id.to_string()))
    }
}

impl MailService for SimulatedMailbox {
    async fn list_messages(&self) -> MailServiceResult<Vec<RawMessage>> {
        Ok(self
            .messages
            .iter()
            .filter(|m| m.folder_id == INBOX_FOLDER_ID)
            .map(|m| m.message.clone())
            .collect())
    }

    async fn delete_message(&mut self, message_id: &str) -> MailServiceResult<()> {
        let before = self.messages.len();
        self.messages.retain(|m| m.message.id != message_id);
        if self.messages.len() == before {
            return Err(MailServiceError::MessageNotFound(message_id.to_string()));
        }
        Ok(())
    }

    async fn move_message(&mut self, message_id: &str, folder_id: &str) -> MailServiceResult<()> {
        if !self.folders.iter().any(|f| f.id == folder_id) {
            return Err(MailServiceError::FolderNotFound(folder_id.to_string()));
        }
        let entry = self.entry_mut(message_id)?;
        entry.folder_id = folder_id.to_string();
        Ok(())
    }

    async fn set_read_state(&mut self, message_id: &str, is_read: bool) -> MailServiceResult<()> {
        let entry = self.entry_mut(message_id)?;
        entry.message.is_read = is_read;
        Ok(())
    }

    async fn add_category(&mut self, message_id: &str, category: &str) -> MailServiceResult<()> {
        let entry = self.entry_mut(message_id)?;
        entry.message.categories.push(category.to_string());
        Ok(())
    }

    async fn flag_message(&mut self, message_id: &str) -> MailServiceResult<()> {
        let entry = self.entry_mut(message_id)?;
        entry.message.is_flagged = true;
        Ok(())
    }

    async fn list_folders(&self) -> MailServiceResult<Vec<MailFolder>> {
        Ok(self.folders.clone())
    }

    async fn create_folder(&mut self, display_name: &str) -> MailServiceResult<MailFolder> {
        if let Some(existing) = self.folder_named(display_name) {
            return Ok(existing.clone());
        }
        let folder = MailFolder {
            id: Uuid::new_v4().to_string(),
            display_name: display_name.to_string(),
        };
        self.folders.push(folder.clone());
        Ok(folder)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::HashMap;

    fn raw(id: &str, sender: &str) -> RawMessage {
        RawMessage {
            id: id.to_string(),
            subject: format!("Subject {id}"),
            sender_name: "Sender".to_string(),
            sender_email: sender.to_string(),
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

    #[tokio::test]
    async fn test_list_messages_only_covers_inbox() {
        let mut mailbox = SimulatedMailbox::new("me@example.com");
        mailbox.add_message(raw("m1", "a@one.example"));
        mailbox.add_message(raw("m2", "b@two.example"));
        let folder = mailbox.create_folder("Archive").await.unwrap();
        mailbox.move_message("m2", &folder.id).await.unwrap();

        let listed = mailbox.list_messages().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, "m1");
    }

    #[tokio::test]
    async fn test_delete_removes_message() {
        let mut mailbox = SimulatedMailbox::new("me@example.com");
        mailbox.add_message(raw("m1", "a@one.example"));
        mailbox.delete_message("m1").await.unwrap();
        assert!(mailbox.message("m1").is_none());

        let err = mailbox.delete_message("m1").await.unwrap_err();
        assert!(matches!(err, MailServiceError::MessageNotFound(_)));
    }

    #[tokio::test]
    async fn test_move_to_unknown_folder_fails() {
        let mut mailbox = SimulatedMailbox::new("me@example.com");
        mailbox.add_message(raw("m1", "a@one.example"));
        let err = mailbox.move_message("m1", "no-such-folder").await.unwrap_err();
        assert!(matches!(err, MailServiceError::FolderNotFound(_)));
        assert_eq!(mailbox.folder_of("m1"), Some(INBOX_FOLDER_ID));
    }

    #[tokio::test]
    async fn test_create_folder_reuses_existing_name() {
        let mut mailbox = SimulatedMailbox::new("me@example.com");
        let first = mailbox.create_folder("Receipts").await.unwrap();
        let second = mailbox.create_folder("receipts").await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(mailbox.list_folders().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_category_appends_without_dedup() {
        let mut mailbox = SimulatedMailbox::new("me@example.com");
        mailbox.add_message(raw("m1", "a@one.example"));
        mailbox.add_category("m1", "Newsletter").await.unwrap();
        mailbox.add_category("m1", "Newsletter").await.unwrap();
        assert_eq!(
            mailbox.message("m1").unwrap().categories,
            vec!["Newsletter", "Newsletter"]
        );
    }

    #[tokio::test]
    async fn test_read_state_and_flag() {
        let mut mailbox = SimulatedMailbox::new("me@example.com");
        mailbox.add_message(raw("m1", "a@one.example"));
        mailbox.set_read_state("m1", true).await.unwrap();
        mailbox.flag_message("m1").await.unwrap();
        let message = mailbox.message("m1").unwrap();
        assert!(message.is_read);
        assert!(message.is_flagged);
    }

    #[tokio::test]
    async fn test_fixture_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mailbox.json");

        let mut mailbox = SimulatedMailbox::new("me@example.com");
        mailbox.add_message(raw("m1", "a@one.example"));
        let folder = mailbox.create_folder("Archive").await.unwrap();
        mailbox.add_message(raw("m2", "b@two.example"));
        mailbox.move_message("m2", &folder.id).await.unwrap();
        mailbox.save_to(&path).await.unwrap();

        let loaded = SimulatedMailbox::from_file(&path).await.unwrap();
        assert_eq!(loaded.mailbox_email(), "me@example.com");
        assert_eq!(loaded.folder_of("m2"), Some(folder.id.as_str()));
        assert_eq!(loaded.list_messages().await.unwrap().len(), 1);
    }
}
