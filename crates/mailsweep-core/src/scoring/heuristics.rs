//! Heuristic checks that accumulate a message's threat score.

use crate::cache::model::{MessageRecord, UNKNOWN_DOMAIN};
use crate::config::ScoringConfig;
use crate::scoring::model::{MessageScore, RiskLevel};

/// Phrases that mark a subject or preview as pressure-tactic mail.
const SUSPICIOUS_PHRASES: &[&str] = &[
    "urgent",
    "verify your account",
    "password",
    "suspended",
    "act now",
    "confirm your",
    "winner",
    "prize",
    "payment failed",
    "invoice due",
];

/// Scores one message.
///
/// A sender on the trusted-domain list short-circuits to a zero score;
/// otherwise each triggered heuristic adds points and one evidence line.
#[must_use]
pub fn score_message(message: &MessageRecord, config: &ScoringConfig) -> MessageScore {
    let domain = message.domain();
    let mut score = 0u32;
    let mut evidence = Vec::new();

    if !config.is_trusted(&domain) {
        if domain == UNKNOWN_DOMAIN {
            score += 3;
            evidence.push("Sender address has no parseable domain".to_string());
        } else if let Some(trusted) = lookalike_of(&domain, config) {
            score += 4;
            evidence.push(format!(
                "Domain '{domain}' imitates trusted domain '{trusted}'"
            ));
        }

        if impersonates_address(&message.sender_name, &message.sender_email) {
            score += 3;
            evidence.push(format!(
                "Display name '{}' poses as a different address",
                message.sender_name
            ));
        }

        let subject = message.subject.to_lowercase();
        for phrase in SUSPICIOUS_PHRASES {
            if subject.contains(phrase) {
                score += 2;
                evidence.push(format!("Subject contains '{phrase}'"));
            }
        }

        if let Some(preview) = &message.preview {
            let preview = preview.to_lowercase();
            for phrase in SUSPICIOUS_PHRASES {
                if preview.contains(phrase) {
                    score += 1;
                    evidence.push(format!("Body preview contains '{phrase}'"));
                }
            }
        }

        if message.subject.trim().is_empty() {
            score += 1;
            evidence.push("Empty subject".to_string());
        }

        if message.importance.as_deref() == Some("High") && !message.is_read {
            score += 1;
            evidence.push("Unread and marked high importance".to_string());
        }
    }

    MessageScore {
        message_id: message.id.clone(),
        subject: message.subject.clone(),
        sender_email: message.sender_email.clone(),
        domain,
        score,
        level: RiskLevel::from_score(score),
        evidence,
    }
}

/// Scores a batch and returns the flagged ones, highest score first.
#[must_use]
pub fn score_messages<'a, I>(messages: I, config: &ScoringConfig) -> Vec<MessageScore>
where
    I: IntoIterator<Item = &'a MessageRecord>,
{
    let mut scores: Vec<MessageScore> = messages
        .into_iter()
        .map(|m| score_message(m, config))
        .filter(|s| s.score > 0)
        .collect();
    scores.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then_with(|| a.subject.cmp(&b.subject))
    });
    scores
}

/// Display name that is itself an address, but not the sending one.
fn impersonates_address(sender_name: &str, sender_email: &str) -> bool {
    let name = sender_name.trim();
    name.contains('@')
        && name.contains('.')
        && !name.eq_ignore_ascii_case(sender_email.trim())
}

/// The trusted domain within two edits of this one, if any.
///
/// An exact trusted match never reaches here, so distance zero is
/// excluded on purpose.
fn lookalike_of<'a>(domain: &str, config: &'a ScoringConfig) -> Option<&'a str> {
    config
        .trusted_domains
        .iter()
        .find(|trusted| {
            let distance = edit_distance(domain, trusted.trim().to_lowercase().as_str());
            (1..=2).contains(&distance)
        })
        .map(String::as_str)
}

/// Levenshtein distance between two strings, by character.
fn edit_distance(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b_chars.len()).collect();
    let mut current = vec![0usize; b_chars.len() + 1];

    for (i, a_char) in a.chars().enumerate() {
        current[0] = i + 1;
        for (j, b_char) in b_chars.iter().enumerate() {
            let substitution = prev[j] + usize::from(a_char != *b_char);
            current[j + 1] = substitution.min(prev[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut prev, &mut current);
    }
    prev[b_chars.len()]
}
