//! Cache Module
//!
//! Two-tier caching of validated payloads: a per-session LRU tier and a
//! process-wide hot tier evicted by priority score and bounded by TTL.

mod entry;
mod hot;
mod key;
mod lru;
mod scorer;
mod session;
mod stale;
mod stats;
mod store;


// Re-export public types
pub use entry::{CacheEntry, Tier};
pub use hot::{HotLookup, HotPlacement, HotTier};
pub use key::CacheKey;
pub use lru::LruTracker;
pub use scorer::{AccessPattern, PriorityScorer, MAX_TRACKED_PATTERNS, RECENT_ACCESS_WINDOW};
pub use session::{Placement, SessionTier};
pub use stale::StaleShelf;
pub use stats::CacheStats;
pub use store::{Admission, CacheStore, SharedCache};
