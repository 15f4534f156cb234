//! Redis Remote Store
//!
//! [`RemoteStore`] implementation over redis-rs: GET/SET/DEL plus pub/sub on
//! the invalidation channel. The multiplexed connection is process-wide and
//! established lazily on first use; each subscription runs on its own pub/sub
//! connection driven by a forwarding task.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use futures::StreamExt;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tokio::sync::{broadcast, mpsc, Mutex};
use tracing::debug;

use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::remote::{RemoteStore, Subscription};

const SUBSCRIPTION_BUFFER: usize = 64;

// == Redis Store ==
/// Redis-backed remote store.
pub struct RedisStore {
    client: redis::Client,
    /// Lazily established shared command connection
    conn: Mutex<Option<MultiplexedConnection>>,
    /// Broadcast that tears down live subscription tasks on close
    shutdown: broadcast::Sender<()>,
    closed: AtomicBool,
}

impl RedisStore {
    // == Constructor ==
    /// Creates a store for the given connection URL. No connection is opened
    /// until the first operation needs one.
    pub fn new(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)?;
        let (shutdown, _) = broadcast::channel(1);
        Ok(Self {
            client,
            conn: Mutex::new(None),
            shutdown,
            closed: AtomicBool::new(false),
        })
    }

    /// Creates a store from the process configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(&config.redis_url)
    }

    /// Returns the shared command connection, opening it on first use.
    async fn connection(&self) -> Result<MultiplexedConnection> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(CacheError::Closed);
        }

        let mut guard = self.conn.lock().await;
        if let Some(conn) = guard.as_ref() {
            return Ok(conn.clone());
        }

        debug!("opening redis connection");
        let conn = self.client.get_multiplexed_async_connection().await?;
        *guard = Some(conn.clone());
        Ok(conn)
    }
}

#[async_trait]
impl RemoteStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.connection().await?;
        let payload: Option<Vec<u8>> = conn.get(key).await?;
        Ok(payload)
    }

    async fn set(&self, key: &str, payload: Vec<u8>, ttl: Option<u64>) -> Result<()> {
        let mut conn = self.connection().await?;
        match ttl {
            Some(seconds) => {
                let _: () = conn.set_ex(key, payload, seconds).await?;
            }
            None => {
                let _: () = conn.set(key, payload).await?;
            }
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.connection().await?;
        let _: () = conn.del(key).await?;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        let mut conn = self.connection().await?;
        let _: () = redis::cmd("FLUSHDB").query_async(&mut conn).await?;
        Ok(())
    }

    async fn publish(&self, channel: &str, payload: Vec<u8>) -> Result<()> {
        let mut conn = self.connection().await?;
        let _: () = conn.publish(channel, payload).await?;
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<Subscription> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(CacheError::Closed);
        }

        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(channel).await?;

        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        let mut shutdown = self.shutdown.subscribe();

        tokio::spawn(async move {
            let mut stream = Box::pin(pubsub.on_message());
            loop {
                tokio::select! {
                    _ = shutdown.recv() => break,
                    msg = stream.next() => match msg {
                        Some(msg) => {
                            let payload = msg.get_payload_bytes().to_vec();
                            if tx.send(payload).await.is_err() {
                                break;
                            }
                        }
                        // Server side dropped the connection
                        None => break,
                    },
                }
            }
            debug!("redis subscription task stopped");
        });

        Ok(Subscription::new(rx))
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        // Receivers may already be gone; that is fine
        let _ = self.shutdown.send(());
        *self.conn.lock().await = None;
        Ok(())
    }
}

// == Unit Tests ==
// Tests that need a live redis server live outside this crate's suite; these
// cover what is checkable offline.
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_invalid_url() {
        assert!(RedisStore::new("not a url").is_err());
    }

    #[tokio::test]
    async fn test_operations_after_close_fail_fast() {
        let store = RedisStore::new("redis://127.0.0.1:6379").unwrap();

        store.close().await.unwrap();

        assert!(matches!(store.get("foo").await, Err(CacheError::Closed)));
        assert!(matches!(
            store.subscribe("updates").await,
            Err(CacheError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let store = RedisStore::new("redis://127.0.0.1:6379").unwrap();
        store.close().await.unwrap();
        store.close().await.unwrap();
    }
}
