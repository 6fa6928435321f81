//! Keyed response store with per-key FIFO consumption

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;

/// A compiled, ready-to-serve response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayResponse {
    /// Response status code
    pub status: u16,
    /// Response headers, names unique
    pub headers: Vec<(String, String)>,
    /// Response body
    pub body: Vec<u8>,
}

impl ReplayResponse {
    /// The terminal fallback: 404 with an empty body
    #[must_use]
    pub fn not_found() -> Self {
        Self {
            status: 404,
            headers: vec![],
            body: vec![],
        }
    }
}

/// Store mapping match keys to FIFO queues of responses
///
/// Populated once at archive-load time, drained one response per matched
/// request. Responses under the same key are handed out in insertion
/// order, each at most once for the process lifetime. A key whose queue
/// drains keeps its map entry; exhaustion is not eviction.
pub struct ResponseStore {
    /// Per-key response queues
    queues: DashMap<String, VecDeque<ReplayResponse>>,
    /// Consume hit counter
    hits: AtomicUsize,
    /// Consume miss counter
    misses: AtomicUsize,
}

impl ResponseStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self {
            queues: DashMap::new(),
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
        }
    }

    /// Append a response to the tail of a key's queue
    pub fn append(&self, key: &str, response: ReplayResponse) {
        self.queues
            .entry(key.to_string())
            .or_default()
            .push_back(response);
    }

    /// Consume the oldest remaining response for a key
    ///
    /// Returns `None` if the key was never populated or its queue is
    /// exhausted. Atomic per key: concurrent callers never receive the
    /// same response, and the first call to execute gets the oldest one.
    pub fn consume_one(&self, key: &str) -> Option<ReplayResponse> {
        let popped = self.queues.get_mut(key).and_then(|mut queue| queue.pop_front());

        if popped.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }

        popped
    }

    /// Number of responses still queued under a key
    #[must_use]
    pub fn remaining(&self, key: &str) -> usize {
        self.queues.get(key).map_or(0, |queue| queue.len())
    }

    /// Whether the key has ever been populated
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.queues.contains_key(key)
    }

    /// Number of keys ever populated (drained keys included)
    #[must_use]
    pub fn key_count(&self) -> usize {
        self.queues.len()
    }

    /// Total responses still queued across all keys
    #[must_use]
    pub fn response_count(&self) -> usize {
        self.queues.iter().map(|entry| entry.value().len()).sum()
    }

    /// Snapshot of store counters
    #[must_use]
    pub fn stats(&self) -> StoreStats {
        StoreStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            keys: self.key_count(),
            responses: self.response_count(),
        }
    }
}

impl Default for ResponseStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Store statistics
#[derive(Debug, Clone, Copy)]
pub struct StoreStats {
    /// Consumes that returned a response
    pub hits: usize,
    /// Consumes that found nothing
    pub misses: usize,
    /// Keys ever populated
    pub keys: usize,
    /// Responses still queued
    pub responses: usize,
}
