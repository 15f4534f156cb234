//! Invalidation Module
//!
//! Wire format for invalidation broadcasts and the process-wide registry of
//! transaction ids whose echoes must not evict local entries.

use std::collections::HashSet;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::error::Result;

// == Invalidation Message ==
/// Pub/sub payload published at transaction close: the transaction id and
/// every object key it modified.
///
/// Serialized as JSON, e.g. `{"tid":32423,"keys":["oid1","oid2"]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidationMessage {
    /// Transaction identifier of the writer
    pub tid: i64,
    /// Object keys modified by that transaction
    pub keys: Vec<String>,
}

impl InvalidationMessage {
    /// Encodes the message for the wire.
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decodes a wire payload.
    pub fn decode(payload: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(payload)?)
    }
}

// == Invalidation Tracker ==
/// Registry of transaction ids to suppress when their invalidation broadcast
/// echoes back to the process that published it.
///
/// An id is registered immediately before the broadcast is published and
/// cleared by the first matching echo; suppression is strictly one-shot.
/// State is in-memory only: a restarted process has a cold cache and nothing
/// to suppress.
#[derive(Debug, Default)]
pub struct InvalidationTracker {
    ignored: Mutex<HashSet<i64>>,
}

impl InvalidationTracker {
    // == Constructor ==
    pub fn new() -> Self {
        Self::default()
    }

    // == Ignore ==
    /// Registers a transaction id whose next echo must be suppressed.
    ///
    /// Callers must invoke this before publishing the broadcast, so the
    /// subscriber loop can never observe the echo first.
    pub fn ignore(&self, tid: i64) {
        self.lock().insert(tid);
    }

    // == Should Ignore ==
    /// Returns whether the id is tracked and clears it in the same locked
    /// step, so a second echo with the same id is never suppressed.
    pub fn should_ignore(&self, tid: i64) -> bool {
        self.lock().remove(&tid)
    }

    // == Contains ==
    /// Checks for a tracked id without clearing it.
    pub fn contains(&self, tid: i64) -> bool {
        self.lock().contains(&tid)
    }

    // == Length ==
    /// Returns the number of currently tracked ids.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    // == Is Empty ==
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Acquires the set, tolerating poisoning from a panicked test thread.
    fn lock(&self) -> std::sync::MutexGuard<'_, HashSet<i64>> {
        self.ignored.lock().unwrap_or_else(|e| e.into_inner())
    }
}
