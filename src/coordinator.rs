//! Cache Coordinator Module
//!
//! Ties the tiers together: `CacheContext` owns the process-wide shared state
//! (local container, invalidation tracker, remote client, subscriber task) and
//! `TieredCache` is the per-transaction view serving get/set/delete through
//! local-then-remote lookup with write-through semantics.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::{CacheStats, MemoryCache};
use crate::config::Config;
use crate::error::Result;
use crate::invalidation::{InvalidationMessage, InvalidationTracker};
use crate::remote::{RemoteCache, RemoteStore};
use crate::tasks::spawn_subscriber_task;
use crate::transaction::ObjectSource;

// == Cache Context ==
/// Process-wide cache state, explicitly constructed and explicitly torn down.
///
/// One context exists per process; every [`TieredCache`] instance shares it.
/// The invalidation subscriber starts with [`CacheContext::start`] and stops
/// with [`CacheContext::close`]; both are idempotent.
pub struct CacheContext {
    memory: Arc<RwLock<MemoryCache>>,
    tracker: Arc<InvalidationTracker>,
    remote: RemoteCache,
    updates_channel: String,
    subscriber: Mutex<Option<JoinHandle<()>>>,
}

impl CacheContext {
    // == Constructor ==
    /// Builds the context over a remote transport. The local container takes
    /// its byte budget and the remote client its TTL from the configuration.
    pub fn new(config: &Config, store: Arc<dyn RemoteStore>) -> Self {
        Self {
            memory: Arc::new(RwLock::new(MemoryCache::new(config.memory_limit))),
            tracker: Arc::new(InvalidationTracker::new()),
            remote: RemoteCache::new(store, Some(config.remote_ttl)),
            updates_channel: config.updates_channel.clone(),
            subscriber: Mutex::new(None),
        }
    }

    // == Start ==
    /// Subscribes to the invalidation channel and spawns the subscriber loop.
    /// Calling again while the loop is alive is a no-op.
    pub async fn start(&self) -> Result<()> {
        let mut guard = self.subscriber.lock().await;
        if let Some(handle) = guard.as_ref() {
            if !handle.is_finished() {
                return Ok(());
            }
        }

        let subscription = self.remote.subscribe(&self.updates_channel).await?;
        info!(channel = %self.updates_channel, "subscribed to invalidation channel");
        *guard = Some(spawn_subscriber_task(
            self.memory.clone(),
            self.tracker.clone(),
            subscription,
        ));
        Ok(())
    }

    // == Close ==
    /// Tears down the process-wide state: closes the remote store (ending the
    /// subscription) and aborts the subscriber task. Safe to call repeatedly
    /// or with no subscriber running.
    pub async fn close(&self) -> Result<()> {
        self.remote.close().await?;
        if let Some(handle) = self.subscriber.lock().await.take() {
            handle.abort();
            info!("invalidation subscriber shut down");
        }
        Ok(())
    }

    // == Ignore Tid ==
    /// Marks a transaction id so its invalidation echo is suppressed locally.
    pub fn ignore_tid(&self, tid: i64) {
        self.tracker.ignore(tid);
    }

    // == Accessors ==
    /// The shared local container.
    pub fn memory(&self) -> &Arc<RwLock<MemoryCache>> {
        &self.memory
    }

    /// The shared remote client.
    pub fn remote(&self) -> &RemoteCache {
        &self.remote
    }

    /// The shared invalidation tracker.
    pub fn tracker(&self) -> &Arc<InvalidationTracker> {
        &self.tracker
    }

    /// The configured invalidation channel name.
    pub fn updates_channel(&self) -> &str {
        &self.updates_channel
    }
}

// == Tiered Cache ==
/// Per-transaction cache handle over a shared [`CacheContext`].
pub struct TieredCache<T: ObjectSource> {
    context: Arc<CacheContext>,
    transaction: T,
}

impl<T: ObjectSource> TieredCache<T> {
    // == Constructor ==
    pub fn new(context: Arc<CacheContext>, transaction: T) -> Self {
        Self {
            context,
            transaction,
        }
    }

    /// The transaction collaborator backing this handle.
    pub fn transaction(&self) -> &T {
        &self.transaction
    }

    // == Get ==
    /// Local-then-remote lookup.
    ///
    /// A local hit never touches the network. A remote hit populates the
    /// local container, charged at the payload's encoded size. `None` means
    /// both tiers missed and the caller must compute and `set`.
    pub async fn get(&self, key: &str) -> Result<Option<Value>> {
        if let Some(value) = self.context.memory.write().await.get(key) {
            return Ok(Some(value));
        }

        match self.context.remote.fetch(key).await? {
            Some((value, size)) => {
                self.context
                    .memory
                    .write()
                    .await
                    .set(key.to_string(), value.clone(), size);
                debug!(key, size, "populated local tier from remote");
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    // == Set ==
    /// Write-through store: remote first, then local.
    ///
    /// The remote write goes first so a connectivity failure aborts the whole
    /// write; a value cached only locally would be invisible to every other
    /// process and never invalidated.
    pub async fn set(&self, value: Value, key: &str) -> Result<()> {
        let size = self.context.remote.set(key, &value).await?;
        self.context
            .memory
            .write()
            .await
            .set(key.to_string(), value, size);
        Ok(())
    }

    // == Delete ==
    /// Removes the key from both tiers.
    ///
    /// The local removal always happens; a failed remote delete is logged and
    /// then surfaced, local consistency being worth more than strict
    /// two-phase removal.
    pub async fn delete(&self, key: &str) -> Result<()> {
        self.context.memory.write().await.delete(key);
        if let Err(err) = self.context.remote.delete(key).await {
            warn!(key, "remote delete failed, local entry already dropped: {err}");
            return Err(err);
        }
        Ok(())
    }

    // == Clear ==
    /// Empties both tiers.
    pub async fn clear(&self) -> Result<()> {
        self.context.remote.clear().await?;
        self.context.memory.write().await.clear();
        Ok(())
    }

    // == Close ==
    /// Transaction-end hook.
    ///
    /// With `invalidate` set and a non-empty modified set, the sequence is:
    /// register the tid with the tracker (synchronously, before anything can
    /// suspend, so the echo can never outrun the suppression), evict the keys
    /// locally, drop them from the remote store so no process can read the
    /// stale copies, and finally publish the invalidation broadcast for every
    /// other process. With `invalidate` unset the writes stand as flushed.
    pub async fn close(&self, invalidate: bool) -> Result<()> {
        let keys = self.transaction.modified_keys();
        if !invalidate || keys.is_empty() {
            return Ok(());
        }

        let tid = self.transaction.transaction_id();
        self.context.tracker.ignore(tid);

        {
            let mut cache = self.context.memory.write().await;
            for key in &keys {
                cache.delete(key);
            }
        }

        for key in &keys {
            self.context.remote.delete(key).await?;
        }

        self.context
            .remote
            .publish(
                &self.context.updates_channel,
                &InvalidationMessage { tid, keys },
            )
            .await?;
        debug!(tid, "published invalidation broadcast");
        Ok(())
    }

    // == Stats ==
    /// Counter snapshot of the shared local container.
    pub async fn stats(&self) -> CacheStats {
        self.context.memory.read().await.get_stats()
    }

    /// Bytes currently held by the shared local container.
    pub async fn memory_usage(&self) -> usize {
        self.context.memory.read().await.get_memory()
    }
}
