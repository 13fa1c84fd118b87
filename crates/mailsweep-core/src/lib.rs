//! # mailsweep-core
//!
//! Core logic for the `mailsweep` mailbox-cleanup assistant.
//!
//! This crate provides:
//! - **Domain-keyed cache** - a local, persisted snapshot of mailbox
//!   message metadata, grouped by sender domain
//! - **Automation rules** - declarative condition/action rules with
//!   dry-run simulation, an audit trail, and per-rule statistics
//! - **Threat scoring** - heuristic screening of suspicious mail
//! - **Fuzzy search** - approximate lookup over cached messages
//! - **Report export** - CSV files and plain-text summaries
//! - **Provider abstraction** - a mailbox service trait with an
//!   in-memory simulator for rehearsals and tests

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod cache;
pub mod config;
mod error;
pub mod export;
pub mod rules;
pub mod scoring;
pub mod search;
pub mod service;

pub use cache::{
    CacheMetadata, CacheRepository, CacheSnapshot, DomainBucket, MessageRecord, RebuildStats,
};
pub use config::{AppConfig, CacheConfig, RulesConfig, ScoringConfig, sanitize_key};
pub use error::{Error, Result};
pub use rules::{
    AuditEntry, AuditLog, AutomationRule, CancelFlag, MatchOperator, MessageRef, RuleAction,
    RuleBuilder, RuleConditions, RuleEngine, RuleOutcome, RuleRepository, RuleRunReport,
};
pub use scoring::{MessageScore, RiskLevel, score_message, score_messages};
pub use search::{SearchHit, search};
pub use service::{
    MailFolder, MailService, MailServiceError, MailServiceResult, RawMessage, SimulatedMailbox,
};
