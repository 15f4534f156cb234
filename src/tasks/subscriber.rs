//! Invalidation Subscriber Task
//!
//! Background task that applies remote invalidation broadcasts to the local
//! container. One runs per process for the lifetime of the remote connection.

use std::sync::Arc;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::MemoryCache;
use crate::invalidation::{InvalidationMessage, InvalidationTracker};
use crate::remote::Subscription;

/// Spawns the subscriber loop over an open invalidation subscription.
///
/// For every decoded message the loop either drops it (the tracker marked the
/// tid as this process's own echo) or deletes every listed key from the local
/// container. Malformed payloads are logged and skipped; the loop must outlive
/// them, since a dead subscriber silently desynchronizes the local cache from
/// every other process. The loop ends when the subscription does, i.e. when
/// the remote store closes.
///
/// # Arguments
/// * `memory` - Shared local container to apply invalidations to
/// * `tracker` - Process-wide registry of tids to suppress
/// * `subscription` - Open subscription on the invalidation channel
///
/// # Returns
/// A JoinHandle for the spawned task, abortable during shutdown.
pub fn spawn_subscriber_task(
    memory: Arc<RwLock<MemoryCache>>,
    tracker: Arc<InvalidationTracker>,
    mut subscription: Subscription,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("invalidation subscriber started");

        while let Some(payload) = subscription.next().await {
            let message = match InvalidationMessage::decode(&payload) {
                Ok(message) => message,
                Err(err) => {
                    warn!("skipping malformed invalidation message: {err}");
                    continue;
                }
            };

            if tracker.should_ignore(message.tid) {
                debug!(tid = message.tid, "suppressed own invalidation echo");
                continue;
            }

            let mut cache = memory.write().await;
            for key in &message.keys {
                cache.delete(key);
            }
            debug!(
                tid = message.tid,
                keys = message.keys.len(),
                "applied invalidation broadcast"
            );
        }

        info!("invalidation subscriber stopped");
    })
}
