//! Fuzzy lookup of cached messages.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::cache::model::MessageRecord;
use crate::search::similarity::similarity;

/// Minimum score for a message to appear in search results.
pub const SIMILARITY_THRESHOLD: f64 = 0.55;

/// One search result.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    /// Matched message id.
    pub message_id: String,
    /// Message subject.
    pub subject: String,
    /// Sender address.
    pub sender_email: String,
    /// Sender domain bucket.
    pub domain: String,
    /// When the message was received.
    pub received_at: DateTime<Utc>,
    /// Match strength in `0.0..=1.0`.
    pub score: f64,
}

/// Searches messages by subject, sender name, or sender address.
///
/// An exact (case-insensitive) substring hit scores `1.0`; otherwise the
/// best bigram similarity against each field and each subject word is
/// used. Results at or above [`SIMILARITY_THRESHOLD`] come back sorted by
/// score, newest first among equals, truncated to `limit`.
#[must_use]
pub fn search<'a, I>(messages: I, query: &str, limit: usize) -> Vec<SearchHit>
where
    I: IntoIterator<Item = &'a MessageRecord>,
{
    let query = query.trim();
    if query.is_empty() || limit == 0 {
        return Vec::new();
    }

    let mut hits: Vec<SearchHit> = messages
        .into_iter()
        .filter_map(|message| {
            let score = message_score(message, query);
            (score >= SIMILARITY_THRESHOLD).then(|| SearchHit {
                message_id: message.id.clone(),
                subject: message.subject.clone(),
                sender_email: message.sender_email.clone(),
                domain: message.domain(),
                received_at: message.received_at,
                score,
            })
        })
        .collect();

    hits.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| b.received_at.cmp(&a.received_at))
    });
    hits.truncate(limit);
    hits
}

fn message_score(message: &MessageRecord, query: &str) -> f64 {
    let needle = query.to_lowercase();
    let fields = [
        message.subject.as_str(),
        message.sender_name.as_str(),
        message.sender_email.as_str(),
    ];
    if fields.iter().any(|f| f.to_lowercase().contains(&needle)) {
        return 1.0;
    }

    let mut best: f64 = 0.0;
    for field in fields {
        best = best.max(similarity(query, field));
        for word in field.split_whitespace() {
            best = best.max(similarity(query, word));
        }
    }
    best
}
