//! Domain-keyed local cache of mailbox messages.
//!
//! Messages are bucketed by sender domain so bulk operations ("everything
//! from this retailer") stay cheap, and persisted as a single JSON
//! snapshot per mailbox.

pub mod model;
pub mod repository;

pub use model::{
    CacheMetadata, CacheSnapshot, DomainBucket, MessageRecord, RebuildStats, CACHE_FORMAT_VERSION,
    UNKNOWN_DOMAIN,
};
pub use repository::{AGE_UNKNOWN_HOURS, CacheRepository};
