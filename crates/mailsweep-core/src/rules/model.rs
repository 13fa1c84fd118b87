//! Automation rule data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How multiple present conditions combine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchOperator {
    /// Every present condition must hold.
    #[default]
    And,
    /// At least one present condition must hold.
    Or,
}

/// The condition set of one rule.
///
/// Every field is independently optional; an absent field is simply not
/// evaluated. Unknown keys in a persisted rule file are rejected at load
/// time rather than silently ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct RuleConditions {
    /// Combinator for the present conditions.
    pub operator: MatchOperator,
    /// Substring match against the sender email address.
    pub from: Option<String>,
    /// Substring match against the subject.
    pub subject_contains: Option<String>,
    /// Exact equality against the attachment flag.
    pub has_attachments: Option<bool>,
    /// Exact equality against the read flag.
    pub is_read: Option<bool>,
    /// Exact equality against the importance marker.
    pub importance: Option<String>,
    /// Inclusive lower bound on size in bytes. Unreported size counts as 0.
    pub min_size: Option<i64>,
    /// Inclusive upper bound on size in bytes. Unreported size counts as 0.
    pub max_size: Option<i64>,
    /// Received at least this many days before evaluation time.
    pub older_than_days: Option<i64>,
    /// Substring match against the body preview text.
    pub body_contains: Option<String>,
    /// Membership match against the message categories.
    pub category: Option<String>,
}

impl RuleConditions {
    /// Whether no condition field is present.
    ///
    /// A rule with an empty condition set never matches anything.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.from.is_none()
            && self.subject_contains.is_none()
            && self.has_attachments.is_none()
            && self.is_read.is_none()
            && self.importance.is_none()
            && self.min_size.is_none()
            && self.max_size.is_none()
            && self.older_than_days.is_none()
            && self.body_contains.is_none()
            && self.category.is_none()
    }
}

/// What a rule does to a matched message.
///
/// Serialized as a tagged object `{"type": ..., ...}`. The enum is closed:
/// a rule file carrying an unrecognized action type fails to parse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RuleAction {
    /// Permanently delete the message.
    Delete,
    /// Move the message into the named folder, creating it when missing.
    Move {
        /// Destination folder display name.
        folder: String,
    },
    /// Mark the message as read.
    MarkAsRead,
    /// Mark the message as unread.
    MarkAsUnread,
    /// Append a category to the message.
    Categorize {
        /// Category name to assign.
        category: String,
    },
    /// Set the follow-up flag.
    Flag,
}

impl RuleAction {
    /// Short label for statistics and the audit trail.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Delete => "Delete",
            Self::Move { .. } => "Move",
            Self::MarkAsRead => "MarkAsRead",
            Self::MarkAsUnread => "MarkAsUnread",
            Self::Categorize { .. } => "Categorize",
            Self::Flag => "Flag",
        }
    }

    /// Whether a successful live run removes the message from the inbox.
    #[must_use]
    pub const fn removes_from_inbox(&self) -> bool {
        matches!(self, Self::Delete | Self::Move { .. })
    }
}

/// A declarative cleanup rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomationRule {
    /// Unique identifier, generated at creation, immutable.
    pub id: Uuid,
    /// Short display name.
    pub name: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Conditions a message must satisfy.
    pub conditions: RuleConditions,
    /// Action applied on match.
    pub action: RuleAction,
    /// Whether the rule participates in execution.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Execution order; higher priority rules run first.
    #[serde(default)]
    pub priority: i32,
    /// Times the rule's action was dispatched.
    #[serde(default)]
    pub execution_count: u64,
    /// Dispatches that succeeded.
    #[serde(default)]
    pub success_count: u64,
    /// Dispatches that failed.
    #[serde(default)]
    pub failure_count: u64,
    /// When the rule was created.
    pub created_at: DateTime<Utc>,
    /// When the rule last dispatched an action, if ever.
    #[serde(default)]
    pub last_executed_at: Option<DateTime<Utc>>,
}

const fn default_enabled() -> bool {
    true
}

/// Fluent constructor for [`AutomationRule`].
///
/// ```
/// use mailsweep_core::rules::{RuleAction, RuleBuilder};
///
/// let rule = RuleBuilder::new("Old newsletters")
///     .description("Clear out stale subscription mail")
///     .subject_contains("Unsubscribe")
///     .older_than_days(30)
///     .priority(10)
///     .action(RuleAction::Delete)
///     .build();
/// assert!(rule.enabled);
/// ```
#[derive(Debug, Clone)]
pub struct RuleBuilder {
    name: String,
    description: String,
    conditions: RuleConditions,
    action: RuleAction,
    enabled: bool,
    priority: i32,
}

impl RuleBuilder {
    /// Starts a builder for a rule with the given name.
    ///
    /// The action defaults to [`RuleAction::Flag`], the least destructive
    /// choice, until one is set.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            conditions: RuleConditions::default(),
            action: RuleAction::Flag,
            enabled: true,
            priority: 0,
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the action.
    #[must_use]
    pub fn action(mut self, action: RuleAction) -> Self {
        self.action = action;
        self
    }

    /// Sets the enabled flag. Rules start enabled.
    #[must_use]
    pub const fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Sets the priority. Higher priority rules run first.
    #[must_use]
    pub const fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Sets the condition combinator.
    #[must_use]
    pub const fn operator(mut self, operator: MatchOperator) -> Self {
        self.conditions.operator = operator;
        self
    }

    /// Matches when the sender address contains the given text.
    #[must_use]
    pub fn from(mut self, pattern: impl Into<String>) -> Self {
        self.conditions.from = Some(pattern.into());
        self
    }

    /// Matches when the subject contains the given text.
    #[must_use]
    pub fn subject_contains(mut self, pattern: impl Into<String>) -> Self {
        self.conditions.subject_contains = Some(pattern.into());
        self
    }

    /// Matches on the attachment flag.
    #[must_use]
    pub const fn has_attachments(mut self, value: bool) -> Self {
        self.conditions.has_attachments = Some(value);
        self
    }

    /// Matches on the read flag.
    #[must_use]
    pub const fn is_read(mut self, value: bool) -> Self {
        self.conditions.is_read = Some(value);
        self
    }

    /// Matches on exact importance.
    #[must_use]
    pub fn importance(mut self, value: impl Into<String>) -> Self {
        self.conditions.importance = Some(value.into());
        self
    }

    /// Matches messages at least this large, in bytes.
    #[must_use]
    pub const fn min_size(mut self, bytes: i64) -> Self {
        self.conditions.min_size = Some(bytes);
        self
    }

    /// Matches messages at most this large, in bytes.
    #[must_use]
    pub const fn max_size(mut self, bytes: i64) -> Self {
        self.conditions.max_size = Some(bytes);
        self
    }

    /// Matches messages received at least this many days ago.
    #[must_use]
    pub const fn older_than_days(mut self, days: i64) -> Self {
        self.conditions.older_than_days = Some(days);
        self
    }

    /// Matches when the body preview contains the given text.
    #[must_use]
    pub fn body_contains(mut self, pattern: impl Into<String>) -> Self {
        self.conditions.body_contains = Some(pattern.into());
        self
    }

    /// Matches when the message carries the given category.
    #[must_use]
    pub fn category(mut self, name: impl Into<String>) -> Self {
        self.conditions.category = Some(name.into());
        self
    }

    /// Finalizes the rule, assigning a fresh id and creation time.
    #[must_use]
    pub fn build(self) -> AutomationRule {
        AutomationRule {
            id: Uuid::new_v4(),
            name: self.name,
            description: self.description,
            conditions: self.conditions,
            action: self.action,
            enabled: self.enabled,
            priority: self.priority,
            execution_count: 0,
            success_count: 0,
            failure_count: 0,
            created_at: Utc::now(),
            last_executed_at: None,
        }
    }
}
