//! Threat scoring data models.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Risk classification derived from a numeric score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiskLevel {
    /// Nothing suspicious.
    None,
    /// Worth a glance.
    Low,
    /// Worth attention.
    Medium,
    /// Likely unwanted or hostile.
    High,
}

impl RiskLevel {
    /// Maps a score to its level.
    #[must_use]
    pub const fn from_score(score: u32) -> Self {
        match score {
            0 => Self::None,
            1..=3 => Self::Low,
            4..=6 => Self::Medium,
            _ => Self::High,
        }
    }

    /// Canonical label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One message's score with the evidence that produced it.
#[derive(Debug, Clone, Serialize)]
pub struct MessageScore {
    /// Scored message id.
    pub message_id: String,
    /// Message subject.
    pub subject: String,
    /// Sender address.
    pub sender_email: String,
    /// Sender domain bucket.
    pub domain: String,
    /// Accumulated score.
    pub score: u32,
    /// Classification of the score.
    pub level: RiskLevel,
    /// Human-readable reasons, one per triggered heuristic.
    pub evidence: Vec<String>,
}
