//! Context Store (C2) — the in-memory claim-check. Parks a tool-call body
//! under its `request_id` with single-consume semantics and TTL expiry.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use parking_lot::Mutex;

use npg_domain::model::StoredContext;

struct Entry {
    context: StoredContext,
    consumed: bool,
}

/// Concurrent mapping from `request_id` to `{ context, consumed }`.
///
/// `fetch_and_consume` is linearizable on a single key: two concurrent
/// callers for the same id agree on exactly one winner, because the whole
/// check-and-flip happens under one lock acquisition.
pub struct ContextStore {
    entries: Mutex<HashMap<String, Entry>>,
    ttl_ms: u64,
    consumed_count: AtomicU64,
}

impl ContextStore {
    pub fn new(ttl_ms: u64) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl_ms,
            consumed_count: AtomicU64::new(0),
        }
    }

    /// Insert a context. Overwriting an existing `request_id` is a
    /// programming error — the caller must generate a fresh id — and panics
    /// in debug builds via `debug_assert!`.
    pub fn store(&self, context: StoredContext) -> String {
        let id = context.request_id.clone();
        let mut entries = self.entries.lock();
        let prev = entries.insert(
            id.clone(),
            Entry {
                context,
                consumed: false,
            },
        );
        debug_assert!(prev.is_none(), "request_id collision in context store: {id}");
        id
    }

    /// Atomically fetch and mark consumed. Returns `None` on the second
    /// call for the same id, or if the id was never stored.
    pub fn fetch_and_consume(&self, id: &str) -> Option<StoredContext> {
        let mut entries = self.entries.lock();
        let entry = entries.get_mut(id)?;
        if entry.consumed {
            return None;
        }
        entry.consumed = true;
        self.consumed_count.fetch_add(1, Ordering::Relaxed);
        Some(entry.context.clone())
    }

    /// Read without mutating state or revealing the `consumed` flag.
    pub fn peek(&self, id: &str) -> Option<StoredContext> {
        self.entries.lock().get(id).map(|e| e.context.clone())
    }

    /// Unconditional, idempotent delete.
    pub fn remove(&self, id: &str) {
        self.entries.lock().remove(id);
    }

    /// Delete every entry older than the configured TTL. Safe to call
    /// concurrently with `fetch_and_consume` — both operations take the
    /// same lock, so there is no torn read, only an ordering race (an entry
    /// consumed a moment before a sweep still gets removed; one consumed a
    /// moment after survives this sweep).
    pub fn cleanup_expired(&self) -> usize {
        let now = Utc::now();
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, e| e.context.age_ms(now) <= self.ttl_ms as i64);
        before - entries.len()
    }

    pub fn count(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn consumed_count(&self) -> u64 {
        self.consumed_count.load(Ordering::Relaxed)
    }
}
