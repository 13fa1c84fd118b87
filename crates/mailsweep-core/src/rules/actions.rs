//! Action dispatch: turning a matched rule into a mailbox operation.

use tracing::{debug, warn};

use crate::cache::model::MessageRecord;
use crate::rules::model::RuleAction;
use crate::service::mail::{MailService, MailServiceError, MailServiceResult};

/// Result of dispatching one action against one message.
///
/// Dispatch never fails as a function call; provider errors are captured
/// here so a single bad message cannot abort a whole run.
#[derive(Debug, Clone)]
pub struct ActionOutcome {
    /// Whether the action took effect (or, in dry-run, would have).
    pub success: bool,
    /// Human-readable description of what happened or would happen.
    pub detail: String,
    /// Provider error text, present only on failure.
    pub error: Option<String>,
}

impl ActionOutcome {
    fn ok(detail: impl Into<String>) -> Self {
        Self {
            success: true,
            detail: detail.into(),
            error: None,
        }
    }

    fn failed(detail: impl Into<String>, error: &MailServiceError) -> Self {
        Self {
            success: false,
            detail: detail.into(),
            error: Some(error.to_string()),
        }
    }
}

/// Applies one action to one message.
///
/// With `dry_run` set, no provider call is made and the outcome describes
/// what a live run would do. Provider failures are captured in the outcome
/// rather than returned as errors.
pub async fn dispatch<S: MailService>(
    service: &mut S,
    message: &MessageRecord,
    action: &RuleAction,
    dry_run: bool,
) -> ActionOutcome {
    if dry_run {
        let detail = match action {
            RuleAction::Delete => "Would delete message".to_string(),
            RuleAction::Move { folder } => format!("Would move message to '{folder}'"),
            RuleAction::MarkAsRead => "Would mark message as read".to_string(),
            RuleAction::MarkAsUnread => "Would mark message as unread".to_string(),
            RuleAction::Categorize { category } => {
                format!("Would add category '{category}'")
            }
            RuleAction::Flag => "Would flag message for follow-up".to_string(),
        };
        debug!(message_id = %message.id, action = action.kind(), "Dry-run dispatch");
        return ActionOutcome::ok(detail);
    }

    let result = match action {
        RuleAction::Delete => service
            .delete_message(&message.id)
            .await
            .map(|()| "Deleted message".to_string()),
        RuleAction::Move { folder } => move_to_folder(service, &message.id, folder).await,
        RuleAction::MarkAsRead => service
            .set_read_state(&message.id, true)
            .await
            .map(|()| "Marked message as read".to_string()),
        RuleAction::MarkAsUnread => service
            .set_read_state(&message.id, false)
            .await
            .map(|()| "Marked message as unread".to_string()),
        RuleAction::Categorize { category } => service
            .add_category(&message.id, category)
            .await
            .map(|()| format!("Added category '{category}'")),
        RuleAction::Flag => service
            .flag_message(&message.id)
            .await
            .map(|()| "Flagged message for follow-up".to_string()),
    };

    match result {
        Ok(detail) => ActionOutcome::ok(detail),
        Err(err) => {
            warn!(
                message_id = %message.id,
                action = action.kind(),
                error = %err,
                "Action dispatch failed"
            );
            ActionOutcome::failed(format!("{} failed", action.kind()), &err)
        }
    }
}

/// Moves a message into a folder by display name, creating the folder if
/// it does not exist yet. Folder names are compared case-insensitively.
async fn move_to_folder<S: MailService>(
    service: &mut S,
    message_id: &str,
    folder_name: &str,
) -> MailServiceResult<String> {
    let existing = service
        .list_folders()
        .await?
        .into_iter()
        .find(|f| f.display_name.eq_ignore_ascii_case(folder_name));
    let folder = match existing {
        Some(folder) => folder,
        None => {
            debug!(folder = folder_name, "Creating destination folder");
            service.create_folder(folder_name).await?
        }
    };
    service.move_message(message_id, &folder.id).await?;
    Ok(format!("Moved message to '{}'", folder.display_name))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use crate::service::mail::RawMessage;
    use crate::service::simulated::{INBOX_FOLDER_ID, SimulatedMailbox};
    use std::collections::HashMap;

    fn seeded_mailbox() -> (SimulatedMailbox, MessageRecord) {
        let mut mailbox = SimulatedMailbox::new("me@example.com");
        let raw = RawMessage {
            id: "m1".to_string(),
            subject: "Weekly digest".to_string(),
            sender_name: "News".to_string(),
            sender_email: "news@letters.example".to_string(),
            received_at: Utc::now(),
            is_read: false,
            is_flagged: false,
            importance: None,
            preview: None,
            to_recipients: Vec::new(),
            categories: Vec::new(),
            extended: HashMap::new(),
        };
        mailbox.add_message(raw.clone());
        (mailbox, MessageRecord::from(raw))
    }

    #[tokio::test]
    async fn test_dry_run_describes_without_touching_mailbox() {
        let (mut mailbox, record) = seeded_mailbox();
        let outcome = dispatch(&mut mailbox, &record, &RuleAction::Delete, true).await;
        assert!(outcome.success);
        assert!(outcome.detail.starts_with("Would delete"));
        assert!(mailbox.message("m1").is_some());
    }

    #[tokio::test]
    async fn test_live_delete_removes_message() {
        let (mut mailbox, record) = seeded_mailbox();
        let outcome = dispatch(&mut mailbox, &record, &RuleAction::Delete, false).await;
        assert!(outcome.success);
        assert!(mailbox.message("m1").is_none());
    }

    #[tokio::test]
    async fn test_move_creates_missing_folder() {
        let (mut mailbox, record) = seeded_mailbox();
        let action = RuleAction::Move {
            folder: "Newsletters".to_string(),
        };
        let outcome = dispatch(&mut mailbox, &record, &action, false).await;
        assert!(outcome.success);

        let folder = mailbox.folder_named("Newsletters").unwrap();
        assert_eq!(mailbox.folder_of("m1"), Some(folder.id.as_str()));
    }

    #[tokio::test]
    async fn test_move_reuses_existing_folder_case_insensitively() {
        let (mut mailbox, record) = seeded_mailbox();
        let existing = mailbox.create_folder("Newsletters").await.unwrap();
        let action = RuleAction::Move {
            folder: "newsletters".to_string(),
        };
        let outcome = dispatch(&mut mailbox, &record, &action, false).await;
        assert!(outcome.success);
        assert_eq!(mailbox.folder_of("m1"), Some(existing.id.as_str()));
    }

    #[tokio::test]
    async fn test_failure_is_captured_not_propagated() {
        let (mut mailbox, mut record) = seeded_mailbox();
        record.id = "no-such-message".to_string();
        let outcome = dispatch(&mut mailbox, &record, &RuleAction::MarkAsRead, false).await;
        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("no-such-message"));
        assert_eq!(mailbox.folder_of("m1"), Some(INBOX_FOLDER_ID));
    }

    #[tokio::test]
    async fn test_categorize_and_flag() {
        let (mut mailbox, record) = seeded_mailbox();
        let action = RuleAction::Categorize {
            category: "Bulk".to_string(),
        };
        assert!(dispatch(&mut mailbox, &record, &action, false).await.success);
        assert!(
            dispatch(&mut mailbox, &record, &RuleAction::Flag, false)
                .await
                .success
        );
        let message = mailbox.message("m1").unwrap();
        assert_eq!(message.categories, vec!["Bulk"]);
        assert!(message.is_flagged);
    }
}
