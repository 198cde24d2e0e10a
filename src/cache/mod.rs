//! Persistent analysis cache.
//!
//! | Type | Purpose |
//! |------|---------|
//! | [`CacheStore`] | Two-level store: whole documents and single pages |
//! | [`WholeDocumentCache`] | Whole-document-only view keyed by raw document bytes |
//! | [`SessionStats`] | In-memory hit/miss counters |

pub mod simple;
pub mod stats;
mod store;

pub use simple::WholeDocumentCache;
pub use stats::{CacheStats, LevelStats, Recommendations, SessionSnapshot, SessionStats};
pub use store::{CacheStore, CleanupCriteria, EntryOrigin, PruneReport};
