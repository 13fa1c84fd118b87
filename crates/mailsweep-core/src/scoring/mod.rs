//! Heuristic threat scoring over cached messages.

pub mod heuristics;
pub mod model;

pub use heuristics::{score_message, score_messages};
pub use model::{MessageScore, RiskLevel};
