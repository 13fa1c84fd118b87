//! Mailbox provider trait and implementations.

pub mod mail;
pub mod simulated;

pub use mail::{
    MailFolder, MailService, MailServiceError, MailServiceResult, RawMessage, PROP_HAS_ATTACHMENTS,
    PROP_MESSAGE_SIZE,
};
pub use simulated::{INBOX_FOLDER_ID, SimulatedMailbox};
