//! Tiercache - a two-tier transactional object cache
//!
//! A memory-bounded local LRU tier backed by a shared remote store, kept
//! consistent across processes through pub/sub invalidation with
//! self-echo suppression.

pub mod cache;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod invalidation;
pub mod remote;
pub mod tasks;
pub mod transaction;

pub use cache::{CacheStats, MemoryCache};
pub use config::Config;
pub use coordinator::{CacheContext, TieredCache};
pub use error::{CacheError, Result};
pub use invalidation::{InvalidationMessage, InvalidationTracker};
pub use remote::{InMemoryStore, RedisStore, RemoteCache, RemoteStore, Subscription};
pub use tasks::spawn_subscriber_task;
pub use transaction::{ObjectSource, TransactionView};
