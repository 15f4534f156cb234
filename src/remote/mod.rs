//! Remote Tier Module
//!
//! The shared distributed cache behind the local container: a raw byte-level
//! transport trait, a typed client that owns the JSON encoding, and two
//! transports — a redis-backed one and an in-process one for tests and
//! bootstrap.

mod memory;
mod redis;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::Result;
use crate::invalidation::InvalidationMessage;

pub use self::memory::InMemoryStore;
pub use self::redis::RedisStore;

// == Subscription ==
/// A live pub/sub subscription yielding raw message payloads.
///
/// The sequence ends (yields `None`) when the backing store is closed; it
/// never hangs past teardown.
#[derive(Debug)]
pub struct Subscription {
    receiver: mpsc::Receiver<Vec<u8>>,
}

impl Subscription {
    /// Wraps the receiving half a transport feeds published payloads into.
    pub fn new(receiver: mpsc::Receiver<Vec<u8>>) -> Self {
        Self { receiver }
    }

    /// Waits for the next payload, or `None` once the store is closed.
    pub async fn next(&mut self) -> Option<Vec<u8>> {
        self.receiver.recv().await
    }
}

// == Remote Store Trait ==
/// Raw transport over the remote key-value store.
///
/// Values and messages are opaque bytes at this level; encoding lives in
/// [`RemoteCache`]. Connectivity failures surface as
/// [`CacheError::Connection`](crate::CacheError::Connection) so callers can
/// refuse to pretend a write happened. `close` is idempotent and ends every
/// live subscription.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Fetches the stored bytes for a key, or `None` when absent.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Stores bytes under a key, with an optional TTL in seconds.
    async fn set(&self, key: &str, payload: Vec<u8>, ttl: Option<u64>) -> Result<()>;

    /// Removes a key; no-op when absent.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Flushes the cache namespace. Tests and bootstrap only, not hot path.
    async fn clear(&self) -> Result<()>;

    /// Publishes a payload on a channel.
    async fn publish(&self, channel: &str, payload: Vec<u8>) -> Result<()>;

    /// Opens a subscription on a channel.
    async fn subscribe(&self, channel: &str) -> Result<Subscription>;

    /// Releases the connection; safe to call repeatedly.
    async fn close(&self) -> Result<()>;
}

// == Remote Cache ==
/// Thin typed client over a [`RemoteStore`].
///
/// Owns the value encoding: payloads are stored as their JSON serialization
/// (a cached string `"bar"` lives remotely as the bytes `b"\"bar\""`) and
/// decoded on the way back. Carries the TTL applied to every remote write.
#[derive(Clone)]
pub struct RemoteCache {
    store: Arc<dyn RemoteStore>,
    ttl: Option<u64>,
}

impl RemoteCache {
    /// Creates a typed client over the given transport.
    pub fn new(store: Arc<dyn RemoteStore>, ttl: Option<u64>) -> Self {
        Self { store, ttl }
    }

    /// The underlying transport, shared process-wide.
    pub fn store(&self) -> &Arc<dyn RemoteStore> {
        &self.store
    }

    /// Fetches and decodes a value together with its encoded size, the size
    /// the local container charges for it.
    pub async fn fetch(&self, key: &str) -> Result<Option<(Value, usize)>> {
        match self.store.get(key).await? {
            Some(payload) => {
                let value: Value = serde_json::from_slice(&payload)?;
                Ok(Some((value, payload.len())))
            }
            None => Ok(None),
        }
    }

    /// Fetches and decodes a value.
    pub async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.fetch(key).await?.map(|(value, _)| value))
    }

    /// Encodes and stores a value, returning the encoded size in bytes.
    pub async fn set(&self, key: &str, value: &Value) -> Result<usize> {
        let payload = serde_json::to_vec(value)?;
        let size = payload.len();
        self.store.set(key, payload, self.ttl).await?;
        Ok(size)
    }

    /// Removes a key from the remote store.
    pub async fn delete(&self, key: &str) -> Result<()> {
        self.store.delete(key).await
    }

    /// Flushes the remote cache namespace.
    pub async fn clear(&self) -> Result<()> {
        self.store.clear().await
    }

    /// Publishes an invalidation message on a channel.
    pub async fn publish(&self, channel: &str, message: &InvalidationMessage) -> Result<()> {
        self.store.publish(channel, message.encode()?).await
    }

    /// Opens a subscription on a channel.
    pub async fn subscribe(&self, channel: &str) -> Result<Subscription> {
        self.store.subscribe(channel).await
    }

    /// Closes the underlying transport; idempotent.
    pub async fn close(&self) -> Result<()> {
        self.store.close().await
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn client() -> (RemoteCache, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        let transport: Arc<dyn RemoteStore> = store.clone();
        (RemoteCache::new(transport, Some(3600)), store)
    }

    #[tokio::test]
    async fn test_set_stores_json_encoding() {
        let (cache, store) = client();

        let size = cache.set("foo", &json!("bar")).await.unwrap();

        assert_eq!(size, 5);
        assert_eq!(store.get("foo").await.unwrap(), Some(b"\"bar\"".to_vec()));
    }

    #[tokio::test]
    async fn test_get_decodes_stored_value() {
        let (cache, _store) = client();

        cache.set("foo", &json!({"a": 1})).await.unwrap();

        assert_eq!(cache.get("foo").await.unwrap(), Some(json!({"a": 1})));
        assert_eq!(cache.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_fetch_reports_encoded_size() {
        let (cache, _store) = client();

        cache.set("foo", &json!("bar")).await.unwrap();

        let (value, size) = cache.fetch("foo").await.unwrap().unwrap();
        assert_eq!(value, json!("bar"));
        assert_eq!(size, 5);
    }

    #[tokio::test]
    async fn test_get_surfaces_undecodable_payload() {
        let (cache, store) = client();

        store
            .set("broken", b"not json".to_vec(), None)
            .await
            .unwrap();

        assert!(cache.get("broken").await.is_err());
    }

    #[tokio::test]
    async fn test_publish_round_trips_message() {
        let (cache, _store) = client();
        let mut subscription = cache.subscribe("updates").await.unwrap();

        let message = InvalidationMessage {
            tid: 1,
            keys: vec!["foo".to_string()],
        };
        cache.publish("updates", &message).await.unwrap();

        let payload = subscription.next().await.unwrap();
        assert_eq!(InvalidationMessage::decode(&payload).unwrap(), message);
    }
}
