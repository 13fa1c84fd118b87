//! Fuzzy search over the cached mailbox.

pub mod query;
pub mod similarity;

pub use query::{SIMILARITY_THRESHOLD, SearchHit, search};
pub use similarity::similarity;
