//! Configuration Module
//!
//! Handles loading and managing cache configuration from environment variables.

use std::env;

/// Cache configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Memory budget in bytes for the local bounded container
    pub memory_limit: usize,
    /// Connection URL for the remote store
    pub redis_url: String,
    /// Pub/sub channel carrying invalidation broadcasts
    pub updates_channel: String,
    /// TTL in seconds applied to remote writes
    pub remote_ttl: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_MEMORY_LIMIT` - Local container budget in bytes (default: 209715200)
    /// - `REDIS_URL` - Remote store URL (default: redis://127.0.0.1:6379)
    /// - `CACHE_UPDATES_CHANNEL` - Invalidation channel name (default: cache-updates)
    /// - `CACHE_REMOTE_TTL` - Remote write TTL in seconds (default: 3600)
    pub fn from_env() -> Self {
        Self {
            memory_limit: env::var("CACHE_MEMORY_LIMIT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(209_715_200),
            redis_url: env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string()),
            updates_channel: env::var("CACHE_UPDATES_CHANNEL")
                .unwrap_or_else(|_| "cache-updates".to_string()),
            remote_ttl: env::var("CACHE_REMOTE_TTL")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3600),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            memory_limit: 209_715_200,
            redis_url: "redis://127.0.0.1:6379".to_string(),
            updates_channel: "cache-updates".to_string(),
            remote_ttl: 3600,
        }
    }
}
