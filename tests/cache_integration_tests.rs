//! Integration Tests for the Two-Tier Cache
//!
//! Exercises the full flow over the in-process remote store: write-through,
//! tier fallback, transaction-close invalidation, and the subscriber loop
//! with self-echo suppression.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tiercache::{
    CacheContext, CacheError, Config, InMemoryStore, InvalidationMessage, RemoteStore,
    TieredCache, TransactionView,
};

// == Helper Functions ==

const CHANNEL: &str = "test-updates";

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tiercache=debug".into()),
        )
        .with_test_writer()
        .try_init();
}

async fn setup() -> (Arc<CacheContext>, Arc<InMemoryStore>) {
    init_tracing();
    let config = Config {
        memory_limit: 1024 * 1024,
        updates_channel: CHANNEL.to_string(),
        remote_ttl: 3600,
        ..Config::default()
    };
    let store = Arc::new(InMemoryStore::new());
    let transport: Arc<dyn RemoteStore> = store.clone();
    let context = Arc::new(CacheContext::new(&config, transport));
    context.start().await.unwrap();
    (context, store)
}

fn modified_transaction(tid: i64, key: &str) -> TransactionView {
    let mut view = TransactionView::new(tid);
    view.record(key);
    view
}

/// Generous window for the in-process pub/sub delivery to land.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

// == Write-Through Tests ==

#[tokio::test]
async fn test_cache_set() {
    let (context, store) = setup().await;
    let cache = TieredCache::new(context.clone(), TransactionView::new(1));
    cache.clear().await.unwrap();

    cache.set(json!("bar"), "foo").await.unwrap();

    // In the remote store, in its serialized form
    assert_eq!(store.get("foo").await.unwrap(), Some(b"\"bar\"".to_vec()));
    // But also in memory
    assert!(context.memory().read().await.contains("foo"));
    // And the api matches
    assert_eq!(cache.get("foo").await.unwrap(), Some(json!("bar")));

    context.close().await.unwrap();
}

#[tokio::test]
async fn test_cache_delete() {
    let (context, store) = setup().await;
    let cache = TieredCache::new(context.clone(), TransactionView::new(1));
    cache.clear().await.unwrap();

    cache.set(json!("bar"), "foo").await.unwrap();
    assert_eq!(cache.get("foo").await.unwrap(), Some(json!("bar")));

    cache.delete("foo").await.unwrap();
    assert_eq!(cache.get("foo").await.unwrap(), None);
    assert_eq!(store.get("foo").await.unwrap(), None);

    context.close().await.unwrap();
}

#[tokio::test]
async fn test_cache_clear() {
    let (context, store) = setup().await;
    let cache = TieredCache::new(context.clone(), TransactionView::new(1));

    cache.set(json!("bar"), "foo").await.unwrap();
    assert_eq!(cache.get("foo").await.unwrap(), Some(json!("bar")));

    cache.clear().await.unwrap();

    assert_eq!(cache.get("foo").await.unwrap(), None);
    assert_eq!(store.get("foo").await.unwrap(), None);
    assert!(context.memory().read().await.is_empty());

    context.close().await.unwrap();
}

#[tokio::test]
async fn test_remote_failure_aborts_write() {
    let (context, _store) = setup().await;
    let cache = TieredCache::new(context.clone(), TransactionView::new(1));

    context.remote().close().await.unwrap();

    // The transaction must not end up with a locally cached value no other
    // process can ever see
    assert!(matches!(
        cache.set(json!("bar"), "foo").await,
        Err(CacheError::Closed)
    ));
    assert!(!context.memory().read().await.contains("foo"));
}

// == Transaction Close Tests ==

#[tokio::test]
async fn test_invalidate_object_on_close() {
    let (context, store) = setup().await;
    let cache = TieredCache::new(context.clone(), modified_transaction(77, "oid-1"));
    cache.clear().await.unwrap();

    cache.set(json!("foobar"), "oid-1").await.unwrap();
    assert_eq!(store.get("oid-1").await.unwrap(), Some(b"\"foobar\"".to_vec()));
    assert_eq!(cache.get("oid-1").await.unwrap(), Some(json!("foobar")));

    cache.close(true).await.unwrap();

    // Gone from both tiers: the stale copy must not outlive the commit
    assert_eq!(cache.get("oid-1").await.unwrap(), None);
    assert_eq!(store.get("oid-1").await.unwrap(), None);

    context.close().await.unwrap();
}

#[tokio::test]
async fn test_close_without_invalidate_keeps_entries() {
    let (context, store) = setup().await;
    let cache = TieredCache::new(context.clone(), modified_transaction(78, "oid-1"));

    cache.set(json!("foobar"), "oid-1").await.unwrap();
    cache.close(false).await.unwrap();

    assert_eq!(cache.get("oid-1").await.unwrap(), Some(json!("foobar")));
    assert!(store.get("oid-1").await.unwrap().is_some());

    context.close().await.unwrap();
}

#[tokio::test]
async fn test_own_close_broadcast_does_not_evict_other_writes() {
    // The echo of this transaction's own broadcast must not evict entries the
    // process wrote during the same commit
    let (context, _store) = setup().await;
    let cache = TieredCache::new(context.clone(), modified_transaction(79, "oid-1"));
    cache.clear().await.unwrap();

    cache.set(json!("one"), "oid-1").await.unwrap();
    cache.set(json!("two"), "oid-2").await.unwrap();

    cache.close(true).await.unwrap();
    settle().await;

    // The modified key was evicted at close; the untouched one survived the echo
    assert!(!context.memory().read().await.contains("oid-1"));
    assert!(context.memory().read().await.contains("oid-2"));
    // The one-shot suppression was consumed by the echo
    assert!(!context.tracker().contains(79));

    context.close().await.unwrap();
}

// == Subscriber Tests ==

#[tokio::test]
async fn test_subscriber_invalidates() {
    let (context, store) = setup().await;
    let cache = TieredCache::new(context.clone(), TransactionView::new(1));
    cache.clear().await.unwrap();

    cache.set(json!("foobar"), "oid-1").await.unwrap();
    assert!(context.memory().read().await.contains("oid-1"));

    // Broadcast from some other process's transaction
    let message = InvalidationMessage {
        tid: 32423,
        keys: vec!["oid-1".to_string()],
    };
    store
        .publish(CHANNEL, message.encode().unwrap())
        .await
        .unwrap();
    settle().await;

    assert!(!context.memory().read().await.contains("oid-1"));

    context.close().await.unwrap();
}

#[tokio::test]
async fn test_subscriber_ignores_tid_on_invalidate() {
    let (context, store) = setup().await;
    let cache = TieredCache::new(context.clone(), TransactionView::new(1));
    cache.clear().await.unwrap();

    cache.set(json!("foobar"), "oid-1").await.unwrap();
    assert!(context.memory().read().await.contains("oid-1"));

    context.ignore_tid(5555);

    let message = InvalidationMessage {
        tid: 5555,
        keys: vec!["oid-1".to_string()],
    };
    store
        .publish(CHANNEL, message.encode().unwrap())
        .await
        .unwrap();
    settle().await;

    // Still there because the tid was marked as our own
    assert!(context.memory().read().await.contains("oid-1"));
    // And the tid was cleared by the first echo
    assert!(!context.tracker().contains(5555));

    // A second broadcast with the same tid does evict
    store
        .publish(CHANNEL, message.encode().unwrap())
        .await
        .unwrap();
    settle().await;
    assert!(!context.memory().read().await.contains("oid-1"));

    context.close().await.unwrap();
}

#[tokio::test]
async fn test_subscriber_survives_malformed_broadcast() {
    let (context, store) = setup().await;
    let cache = TieredCache::new(context.clone(), TransactionView::new(1));
    cache.clear().await.unwrap();

    cache.set(json!("foobar"), "oid-1").await.unwrap();

    store.publish(CHANNEL, b"{{{garbage".to_vec()).await.unwrap();
    settle().await;

    // Loop is still alive and applies the next well-formed broadcast
    let message = InvalidationMessage {
        tid: 2,
        keys: vec!["oid-1".to_string()],
    };
    store
        .publish(CHANNEL, message.encode().unwrap())
        .await
        .unwrap();
    settle().await;
    assert!(!context.memory().read().await.contains("oid-1"));

    context.close().await.unwrap();
}

// == Teardown Tests ==

#[tokio::test]
async fn test_context_close_is_idempotent() {
    let (context, _store) = setup().await;

    context.close().await.unwrap();
    context.close().await.unwrap();
}
