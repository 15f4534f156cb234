//! In-Process Remote Store
//!
//! A fully functional [`RemoteStore`] living inside the process: a byte map
//! plus channel fan-out. Backs the integration tests and single-process
//! bootstrap setups where no redis is available.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::{CacheError, Result};
use crate::remote::{RemoteStore, Subscription};

// Per-subscription buffer; publishes block if a subscriber lags this far
const SUBSCRIPTION_BUFFER: usize = 64;

// == In-Memory Store ==
/// Process-local implementation of [`RemoteStore`].
#[derive(Debug, Default)]
pub struct InMemoryStore {
    /// Stored payloads by key
    entries: Mutex<HashMap<String, Vec<u8>>>,
    /// Live subscriber senders by channel name
    channels: Mutex<HashMap<String, Vec<mpsc::Sender<Vec<u8>>>>>,
    /// Set once `close` runs; all later operations fail with `Closed`
    closed: AtomicBool,
}

impl InMemoryStore {
    // == Constructor ==
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            Err(CacheError::Closed)
        } else {
            Ok(())
        }
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<u8>>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn channels(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<mpsc::Sender<Vec<u8>>>>> {
        self.channels.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl RemoteStore for InMemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.ensure_open()?;
        Ok(self.entries().get(key).cloned())
    }

    async fn set(&self, key: &str, payload: Vec<u8>, _ttl: Option<u64>) -> Result<()> {
        self.ensure_open()?;
        self.entries().insert(key.to_string(), payload);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.ensure_open()?;
        self.entries().remove(key);
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.ensure_open()?;
        self.entries().clear();
        Ok(())
    }

    async fn publish(&self, channel: &str, payload: Vec<u8>) -> Result<()> {
        self.ensure_open()?;

        // Snapshot senders outside the lock; sending may suspend
        let senders: Vec<mpsc::Sender<Vec<u8>>> = {
            let mut channels = self.channels();
            if let Some(subscribers) = channels.get_mut(channel) {
                subscribers.retain(|tx| !tx.is_closed());
                subscribers.clone()
            } else {
                Vec::new()
            }
        };

        for tx in senders {
            // A dropped subscriber is not a publish failure
            let _ = tx.send(payload.clone()).await;
        }
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<Subscription> {
        self.ensure_open()?;

        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        self.channels()
            .entry(channel.to_string())
            .or_default()
            .push(tx);
        Ok(Subscription::new(rx))
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        // Dropping the senders ends every live subscription
        self.channels().clear();
        Ok(())
    }
}
