//! Pure condition evaluation against cached message records.

use chrono::{DateTime, Utc};

use crate::cache::model::MessageRecord;
use crate::rules::model::{MatchOperator, RuleConditions};

/// Evaluates a condition set against one message.
///
/// Each present condition contributes one boolean; the set's operator
/// combines them. A set with no present conditions never matches, so a
/// freshly created rule cannot silently apply to the whole mailbox.
///
/// `now` is the evaluation time used for age comparisons; callers pass a
/// single timestamp per run so every message sees the same clock.
#[must_use]
pub fn evaluate(message: &MessageRecord, conditions: &RuleConditions, now: DateTime<Utc>) -> bool {
    let mut results = Vec::new();

    if let Some(pattern) = &conditions.from {
        results.push(message.sender_email.contains(pattern.as_str()));
    }
    if let Some(pattern) = &conditions.subject_contains {
        results.push(message.subject.contains(pattern.as_str()));
    }
    if let Some(expected) = conditions.has_attachments {
        results.push(message.has_attachments == expected);
    }
    if let Some(expected) = conditions.is_read {
        results.push(message.is_read == expected);
    }
    if let Some(expected) = &conditions.importance {
        results.push(message.importance.as_deref() == Some(expected.as_str()));
    }
    if let Some(min) = conditions.min_size {
        results.push(message.size_bytes.unwrap_or(0) >= min);
    }
    if let Some(max) = conditions.max_size {
        results.push(message.size_bytes.unwrap_or(0) <= max);
    }
    if let Some(days) = conditions.older_than_days {
        let age_days = now.signed_duration_since(message.received_at).num_days();
        results.push(age_days >= days);
    }
    if let Some(pattern) = &conditions.body_contains {
        results.push(
            message
                .preview
                .as_deref()
                .unwrap_or("")
                .contains(pattern.as_str()),
        );
    }
    if let Some(category) = &conditions.category {
        results.push(message.categories.iter().any(|c| c == category));
    }

    if results.is_empty() {
        return false;
    }
    match conditions.operator {
        MatchOperator::And => results.iter().all(|r| *r),
        MatchOperator::Or => results.iter().any(|r| *r),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn message() -> MessageRecord {
        MessageRecord {
            id: "m1".to_string(),
            subject: "Your invoice for March".to_string(),
            sender_name: "Billing".to_string(),
            sender_email: "billing@shop.example".to_string(),
            received_at: Utc::now() - Duration::days(10),
            size_bytes: Some(250_000),
            has_attachments: true,
            to_recipients: vec!["me@example.com".to_string()],
            categories: vec!["Receipts".to_string()],
            is_read: false,
            importance: Some("High".to_string()),
            preview: Some("Please find attached the invoice".to_string()),
        }
    }

    #[test]
    fn test_empty_conditions_never_match() {
        let now = Utc::now();
        assert!(!evaluate(&message(), &RuleConditions::default(), now));
        let or_only = RuleConditions {
            operator: MatchOperator::Or,
            ..RuleConditions::default()
        };
        assert!(!evaluate(&message(), &or_only, now));
    }

    #[test]
    fn test_and_requires_every_condition() {
        let now = Utc::now();
        let mut conditions = RuleConditions {
            from: Some("shop.example".to_string()),
            has_attachments: Some(true),
            ..RuleConditions::default()
        };
        assert!(evaluate(&message(), &conditions, now));

        conditions.is_read = Some(true);
        assert!(!evaluate(&message(), &conditions, now));
    }

    #[test]
    fn test_or_requires_any_condition() {
        let now = Utc::now();
        let conditions = RuleConditions {
            operator: MatchOperator::Or,
            from: Some("nobody@nowhere.example".to_string()),
            subject_contains: Some("invoice".to_string()),
            ..RuleConditions::default()
        };
        assert!(evaluate(&message(), &conditions, now));

        let none_hold = RuleConditions {
            operator: MatchOperator::Or,
            from: Some("nobody@nowhere.example".to_string()),
            subject_contains: Some("lottery".to_string()),
            ..RuleConditions::default()
        };
        assert!(!evaluate(&message(), &none_hold, now));
    }

    #[test]
    fn test_substring_matches_are_case_sensitive() {
        let now = Utc::now();
        let conditions = RuleConditions {
            subject_contains: Some("Invoice".to_string()),
            ..RuleConditions::default()
        };
        assert!(!evaluate(&message(), &conditions, now));
    }

    #[test]
    fn test_size_bounds_are_inclusive_and_missing_size_is_zero() {
        let now = Utc::now();
        let exact = RuleConditions {
            min_size: Some(250_000),
            max_size: Some(250_000),
            ..RuleConditions::default()
        };
        assert!(evaluate(&message(), &exact, now));

        let mut sizeless = message();
        sizeless.size_bytes = None;
        let min_one = RuleConditions {
            min_size: Some(1),
            ..RuleConditions::default()
        };
        assert!(!evaluate(&sizeless, &min_one, now));
        let max_zero = RuleConditions {
            max_size: Some(0),
            ..RuleConditions::default()
        };
        assert!(evaluate(&sizeless, &max_zero, now));
    }

    #[test]
    fn test_older_than_days_is_inclusive() {
        let message = message();
        // Pin the clock so the age is exactly ten days.
        let now = message.received_at + Duration::days(10);
        let boundary = RuleConditions {
            older_than_days: Some(10),
            ..RuleConditions::default()
        };
        assert!(evaluate(&message, &boundary, now));

        let too_strict = RuleConditions {
            older_than_days: Some(11),
            ..RuleConditions::default()
        };
        assert!(!evaluate(&message, &too_strict, now));
    }

    #[test]
    fn test_category_membership() {
        let now = Utc::now();
        let held = RuleConditions {
            category: Some("Receipts".to_string()),
            ..RuleConditions::default()
        };
        assert!(evaluate(&message(), &held, now));

        let absent = RuleConditions {
            category: Some("Travel".to_string()),
            ..RuleConditions::default()
        };
        assert!(!evaluate(&message(), &absent, now));
    }

    #[test]
    fn test_body_contains_with_missing_preview() {
        let now = Utc::now();
        let mut no_preview = message();
        no_preview.preview = None;
        let conditions = RuleConditions {
            body_contains: Some("invoice".to_string()),
            ..RuleConditions::default()
        };
        assert!(!evaluate(&no_preview, &conditions, now));
    }

    #[test]
    fn test_importance_exact_equality() {
        let now = Utc::now();
        let high = RuleConditions {
            importance: Some("High".to_string()),
            ..RuleConditions::default()
        };
        assert!(evaluate(&message(), &high, now));

        let lowercase = RuleConditions {
            importance: Some("high".to_string()),
            ..RuleConditions::default()
        };
        assert!(!evaluate(&message(), &lowercase, now));
    }
}
