//! Server Statistics
//!
//! A flat set of process-lifetime counters behind a single lock, reported
//! verbatim by the `stats` command. The lock is held only for the duration
//! of one update or one snapshot.
//!
//! Storage operations may call into this module while holding a bucket
//! lock, but never the other way around: nothing here ever touches the
//! cache table, so the two lock classes cannot form an ordering cycle.

use std::sync::Mutex;

/// A point-in-time copy of every counter.
///
/// Field order matches the order the `stats` command reports them in.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Items currently stored
    pub curr_items: u64,
    /// Items ever stored
    pub total_items: u64,
    /// Bytes of value data currently stored
    pub bytes: u64,
    /// Currently open client connections
    pub curr_connections: u64,
    /// Connections ever accepted
    pub total_connections: u64,
    /// `get` commands received
    pub cmd_get: u64,
    /// `set` commands received
    pub cmd_set: u64,
    /// Keys found by `get`
    pub get_hits: u64,
    /// Keys missed by `get`
    pub get_misses: u64,
}

impl StatsSnapshot {
    /// Returns the counters as `(name, value)` pairs in wire order.
    pub fn lines(&self) -> [(&'static str, u64); 9] {
        [
            ("curr_items", self.curr_items),
            ("total_items", self.total_items),
            ("bytes", self.bytes),
            ("curr_connections", self.curr_connections),
            ("total_connections", self.total_connections),
            ("cmd_get", self.cmd_get),
            ("cmd_set", self.cmd_set),
            ("get_hits", self.get_hits),
            ("get_misses", self.get_misses),
        ]
    }
}

/// Shared statistics for the whole server.
///
/// Wrap in an `Arc` and hand a clone to the storage engine, the command
/// handler, and every connection task.
#[derive(Debug, Default)]
pub struct ServerStats {
    counters: Mutex<StatsSnapshot>,
}

impl ServerStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// A new entry entered the cache.
    pub fn entry_created(&self, bytes: usize) {
        let mut c = self.counters.lock().unwrap();
        c.curr_items += 1;
        c.total_items += 1;
        c.bytes += bytes as u64;
    }

    /// An existing entry's value was replaced in place.
    pub fn entry_updated(&self, old_bytes: usize, new_bytes: usize) {
        let mut c = self.counters.lock().unwrap();
        c.bytes = c.bytes.saturating_sub(old_bytes as u64) + new_bytes as u64;
    }

    /// An existing entry's value grew by `delta` bytes (append/prepend).
    pub fn entry_grew(&self, delta: usize) {
        let mut c = self.counters.lock().unwrap();
        c.bytes += delta as u64;
    }

    /// An entry left the cache (deletion or lazy expiration).
    pub fn entry_removed(&self, bytes: usize) {
        let mut c = self.counters.lock().unwrap();
        c.curr_items = c.curr_items.saturating_sub(1);
        c.bytes = c.bytes.saturating_sub(bytes as u64);
    }

    /// Every entry was discarded by `flush_all`.
    pub fn storage_flushed(&self) {
        let mut c = self.counters.lock().unwrap();
        c.curr_items = 0;
        c.bytes = 0;
    }

    pub fn connection_opened(&self) {
        let mut c = self.counters.lock().unwrap();
        c.curr_connections += 1;
        c.total_connections += 1;
    }

    pub fn connection_closed(&self) {
        let mut c = self.counters.lock().unwrap();
        c.curr_connections = c.curr_connections.saturating_sub(1);
    }

    pub fn record_cmd_get(&self) {
        self.counters.lock().unwrap().cmd_get += 1;
    }

    pub fn record_cmd_set(&self) {
        self.counters.lock().unwrap().cmd_set += 1;
    }

    pub fn record_hit(&self) {
        self.counters.lock().unwrap().get_hits += 1;
    }

    pub fn record_miss(&self) {
        self.counters.lock().unwrap().get_misses += 1;
    }

    /// Copies every counter under one lock acquisition.
    pub fn snapshot(&self) -> StatsSnapshot {
        *self.counters.lock().unwrap()
    }
}
