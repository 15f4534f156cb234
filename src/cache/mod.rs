//! Cache Module
//!
//! The local tier: a memory-bounded container with LRU eviction and
//! byte-accurate accounting.

mod lru;
mod stats;
mod store;


// Re-export public types
pub use lru::LruTracker;
pub use stats::CacheStats;
pub use store::{CacheEntry, MemoryCache};
