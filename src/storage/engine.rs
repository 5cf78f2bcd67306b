//! Bucket-Locked Cache Table
//!
//! The core storage engine: a fixed array of buckets, each one a small
//! collision chain behind its own `Mutex`. A djb2 hash routes every key to
//! exactly one bucket, so operations on keys in different buckets never
//! contend.
//!
//! ## Concurrency Model
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       CacheTable                            │
//! │  ┌──────────┐ ┌──────────┐ ┌──────────┐     ┌──────────┐   │
//! │  │ Bucket 0 │ │ Bucket 1 │ │ Bucket 2 │ ... │  10006   │   │
//! │  │  Mutex   │ │  Mutex   │ │  Mutex   │     │  Mutex   │   │
//! │  │  chain   │ │  chain   │ │  chain   │     │  chain   │   │
//! │  └──────────┘ └──────────┘ └──────────┘     └──────────┘   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every operation locks exactly one bucket for its full duration and never
//! holds two at once, so no lock-ordering discipline is needed. `flush_all`
//! walks the buckets one lock at a time.
//!
//! ## Expiration
//!
//! Expiration is lazy only: there is no background sweeper. Whichever
//! locked traversal first encounters an expired entry unlinks it and then
//! behaves as if the key were absent. Known limitation: an expired key that
//! is never accessed again stays resident until something touches its
//! bucket or `flush_all` runs.

use bytes::Bytes;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::stats::ServerStats;

/// Number of buckets in the table. Prime, for even hash distribution.
/// Fixed at startup; the table is never resized.
pub const BUCKET_COUNT: usize = 10007;

/// Seconds since the Unix epoch. A clock before the epoch degrades to 0.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// djb2 string hash: seed 5381, multiply by 33, add each byte.
fn djb2(key: &[u8]) -> u32 {
    let mut hash: u32 = 5381;
    for &b in key {
        hash = hash.wrapping_shl(5).wrapping_add(hash).wrapping_add(b as u32);
    }
    hash
}

/// One stored item. Owned exclusively by the bucket holding it; only
/// reachable through that bucket's lock.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The key, at most 250 bytes
    pub key: Bytes,
    /// The value, at most 1 MiB
    pub data: Bytes,
    /// Opaque 32-bit client tag, round-tripped unchanged
    pub flags: u32,
    /// Absolute expiration instant in Unix seconds; 0 = never expires
    pub exptime: u64,
}

impl CacheEntry {
    #[inline]
    fn is_expired(&self, now: u64) -> bool {
        self.exptime != 0 && now >= self.exptime
    }
}

#[derive(Debug, Default)]
struct Bucket {
    chain: Mutex<Vec<CacheEntry>>,
}

/// The shared cache table.
///
/// Construct once at startup, wrap in an `Arc`, and share across all
/// connection tasks. Storage mutations report item/byte deltas to the
/// supplied [`ServerStats`]; the stats lock is only ever acquired as the
/// inner lock, while a bucket lock is held, never the reverse.
#[derive(Debug)]
pub struct CacheTable {
    buckets: Vec<Bucket>,
    stats: Arc<ServerStats>,
}

impl CacheTable {
    pub fn new(stats: Arc<ServerStats>) -> Self {
        let buckets = (0..BUCKET_COUNT).map(|_| Bucket::default()).collect();
        Self { buckets, stats }
    }

    #[inline]
    fn bucket(&self, key: &[u8]) -> &Bucket {
        &self.buckets[djb2(key) as usize % BUCKET_COUNT]
    }

    /// Looks up a live entry, returning its value and flags.
    ///
    /// An expired entry found on the way is unlinked during the same locked
    /// traversal, and the lookup reports absence.
    pub fn get(&self, key: &[u8]) -> Option<(Bytes, u32)> {
        let now = unix_now();
        let mut chain = self.bucket(key).chain.lock().unwrap();

        let idx = chain.iter().position(|e| e.key.as_ref() == key)?;
        if chain[idx].is_expired(now) {
            let dead = chain.swap_remove(idx);
            self.stats.entry_removed(dead.data.len());
            return None;
        }

        let entry = &chain[idx];
        Some((entry.data.clone(), entry.flags))
    }

    /// Unconditional upsert. An existing entry (expired or not) is replaced
    /// in place; otherwise a new entry joins the chain.
    pub fn set(&self, key: &[u8], data: Bytes, flags: u32, exptime: u64) {
        let mut chain = self.bucket(key).chain.lock().unwrap();

        if let Some(entry) = chain.iter_mut().find(|e| e.key.as_ref() == key) {
            self.stats.entry_updated(entry.data.len(), data.len());
            entry.data = data;
            entry.flags = flags;
            entry.exptime = exptime;
        } else {
            self.stats.entry_created(data.len());
            chain.push(CacheEntry {
                key: Bytes::copy_from_slice(key),
                data,
                flags,
                exptime,
            });
        }
    }

    /// Stores only if no live entry exists for the key.
    ///
    /// The existence check and the insert happen under one held bucket
    /// lock, so two racing `add`s for the same key can never both succeed.
    pub fn add(&self, key: &[u8], data: Bytes, flags: u32, exptime: u64) -> bool {
        let now = unix_now();
        let mut chain = self.bucket(key).chain.lock().unwrap();

        if let Some(idx) = chain.iter().position(|e| e.key.as_ref() == key) {
            if !chain[idx].is_expired(now) {
                return false;
            }
            let dead = chain.swap_remove(idx);
            self.stats.entry_removed(dead.data.len());
        }

        self.stats.entry_created(data.len());
        chain.push(CacheEntry {
            key: Bytes::copy_from_slice(key),
            data,
            flags,
            exptime,
        });
        true
    }

    /// Stores only if a live entry already exists for the key.
    pub fn replace(&self, key: &[u8], data: Bytes, flags: u32, exptime: u64) -> bool {
        let now = unix_now();
        let mut chain = self.bucket(key).chain.lock().unwrap();

        let Some(idx) = chain.iter().position(|e| e.key.as_ref() == key) else {
            return false;
        };
        if chain[idx].is_expired(now) {
            let dead = chain.swap_remove(idx);
            self.stats.entry_removed(dead.data.len());
            return false;
        }

        let entry = &mut chain[idx];
        self.stats.entry_updated(entry.data.len(), data.len());
        entry.data = data;
        entry.flags = flags;
        entry.exptime = exptime;
        true
    }

    /// Appends `suffix` to a live entry's value. Fails without mutation if
    /// the key is absent or expired.
    pub fn append(&self, key: &[u8], suffix: &[u8]) -> bool {
        self.concat(key, suffix, false)
    }

    /// Prepends `prefix` to a live entry's value. Fails without mutation if
    /// the key is absent or expired.
    pub fn prepend(&self, key: &[u8], prefix: &[u8]) -> bool {
        self.concat(key, prefix, true)
    }

    fn concat(&self, key: &[u8], extra: &[u8], front: bool) -> bool {
        let now = unix_now();
        let mut chain = self.bucket(key).chain.lock().unwrap();

        let Some(idx) = chain.iter().position(|e| e.key.as_ref() == key) else {
            return false;
        };
        if chain[idx].is_expired(now) {
            let dead = chain.swap_remove(idx);
            self.stats.entry_removed(dead.data.len());
            return false;
        }

        let entry = &mut chain[idx];
        let mut joined = Vec::with_capacity(entry.data.len() + extra.len());
        if front {
            joined.extend_from_slice(extra);
            joined.extend_from_slice(&entry.data);
        } else {
            joined.extend_from_slice(&entry.data);
            joined.extend_from_slice(extra);
        }
        entry.data = Bytes::from(joined);
        // only the added bytes count; the existing bytes are already accounted
        self.stats.entry_grew(extra.len());
        true
    }

    /// Unlinks the entry for `key`, reporting whether a live removal
    /// occurred. An expired corpse is unlinked too, but counts as absent.
    pub fn delete(&self, key: &[u8]) -> bool {
        let now = unix_now();
        let mut chain = self.bucket(key).chain.lock().unwrap();

        let Some(idx) = chain.iter().position(|e| e.key.as_ref() == key) else {
            return false;
        };
        let was_live = !chain[idx].is_expired(now);
        let dead = chain.swap_remove(idx);
        self.stats.entry_removed(dead.data.len());
        was_live
    }

    /// Discards every entry, locking one bucket at a time, then zeroes the
    /// current-item and byte counters.
    pub fn flush_all(&self) {
        for bucket in &self.buckets {
            bucket.chain.lock().unwrap().clear();
        }
        self.stats.storage_flushed();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> (CacheTable, Arc<ServerStats>) {
        let stats = Arc::new(ServerStats::new());
        (CacheTable::new(Arc::clone(&stats)), stats)
    }

    #[test]
    fn set_and_get_roundtrips_value_and_flags() {
        let (t, _) = table();
        t.set(b"key", Bytes::from("value"), 42, 0);
        assert_eq!(t.get(b"key"), Some((Bytes::from("value"), 42)));
    }

    #[test]
    fn get_missing_key() {
        let (t, _) = table();
        assert_eq!(t.get(b"nope"), None);
    }

    #[test]
    fn set_overwrites_and_adjusts_bytes() {
        let (t, stats) = table();
        t.set(b"k", Bytes::from("aaaa"), 0, 0);
        assert_eq!(stats.snapshot().bytes, 4);

        t.set(b"k", Bytes::from("bb"), 7, 0);
        let snap = stats.snapshot();
        assert_eq!(snap.bytes, 2);
        assert_eq!(snap.curr_items, 1);
        // total_items counts creations only, not in-place updates
        assert_eq!(snap.total_items, 1);
        assert_eq!(t.get(b"k"), Some((Bytes::from("bb"), 7)));
    }

    #[test]
    fn add_only_succeeds_when_absent() {
        let (t, _) = table();
        assert!(t.add(b"k", Bytes::from("v1"), 0, 0));
        assert!(!t.add(b"k", Bytes::from("v2"), 0, 0));
        // the loser left no trace
        assert_eq!(t.get(b"k"), Some((Bytes::from("v1"), 0)));
    }

    #[test]
    fn add_reclaims_an_expired_entry() {
        let (t, _) = table();
        t.set(b"k", Bytes::from("old"), 0, 1); // long past
        assert!(t.add(b"k", Bytes::from("new"), 3, 0));
        assert_eq!(t.get(b"k"), Some((Bytes::from("new"), 3)));
    }

    #[test]
    fn add_is_atomic_under_contention() {
        use std::thread;

        let (t, stats) = table();
        let t = Arc::new(t);

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let t = Arc::clone(&t);
                thread::spawn(move || t.add(b"contested", Bytes::from(format!("w{}", i)), 0, 0))
            })
            .collect();

        let wins = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|&won| won)
            .count();

        // check-then-insert is one critical section: exactly one winner
        assert_eq!(wins, 1);
        assert_eq!(stats.snapshot().curr_items, 1);
        assert!(t.get(b"contested").is_some());
    }

    #[test]
    fn replace_requires_live_entry() {
        let (t, _) = table();
        assert!(!t.replace(b"k", Bytes::from("v"), 0, 0));
        assert_eq!(t.get(b"k"), None); // a failed replace creates nothing

        t.set(b"k", Bytes::from("v1"), 0, 0);
        assert!(t.replace(b"k", Bytes::from("v2"), 9, 0));
        assert_eq!(t.get(b"k"), Some((Bytes::from("v2"), 9)));
    }

    #[test]
    fn replace_fails_on_expired_entry() {
        let (t, _) = table();
        t.set(b"k", Bytes::from("v"), 0, 1);
        assert!(!t.replace(b"k", Bytes::from("v2"), 0, 0));
        assert_eq!(t.get(b"k"), None);
    }

    #[test]
    fn append_and_prepend() {
        let (t, stats) = table();
        t.set(b"k", Bytes::from("a"), 0, 0);

        assert!(t.append(b"k", b"b"));
        assert_eq!(t.get(b"k"), Some((Bytes::from("ab"), 0)));

        assert!(t.prepend(b"k", b"c"));
        assert_eq!(t.get(b"k"), Some((Bytes::from("cab"), 0)));

        // 1 original + 1 appended + 1 prepended
        assert_eq!(stats.snapshot().bytes, 3);
    }

    #[test]
    fn append_prepend_fail_on_absent_key() {
        let (t, _) = table();
        assert!(!t.append(b"k", b"x"));
        assert!(!t.prepend(b"k", b"x"));
        assert_eq!(t.get(b"k"), None);
    }

    #[test]
    fn delete_live_and_absent() {
        let (t, _) = table();
        t.set(b"k", Bytes::from("v"), 0, 0);

        assert!(t.delete(b"k"));
        assert_eq!(t.get(b"k"), None);
        assert!(!t.delete(b"k"));
    }

    #[test]
    fn delete_expired_reports_absent() {
        let (t, stats) = table();
        t.set(b"k", Bytes::from("v"), 0, 1);
        assert!(!t.delete(b"k"));
        // the corpse was still unlinked and uncounted
        assert_eq!(stats.snapshot().curr_items, 0);
    }

    #[test]
    fn entry_with_past_exptime_is_immediately_absent() {
        let (t, _) = table();
        t.set(b"k", Bytes::from("v"), 0, 1);
        assert_eq!(t.get(b"k"), None);
    }

    #[test]
    fn entry_with_zero_exptime_never_expires() {
        let (t, _) = table();
        t.set(b"k", Bytes::from("v"), 0, 0);
        assert_eq!(t.get(b"k"), Some((Bytes::from("v"), 0)));
    }

    #[test]
    fn entry_with_future_exptime_is_live() {
        let (t, _) = table();
        t.set(b"k", Bytes::from("v"), 0, unix_now() + 3600);
        assert_eq!(t.get(b"k"), Some((Bytes::from("v"), 0)));
    }

    #[test]
    fn lazy_expiration_updates_counters() {
        let (t, stats) = table();
        t.set(b"k", Bytes::from("value"), 0, 1);
        assert_eq!(stats.snapshot().curr_items, 1);

        assert_eq!(t.get(b"k"), None);
        let snap = stats.snapshot();
        assert_eq!(snap.curr_items, 0);
        assert_eq!(snap.bytes, 0);
    }

    #[test]
    fn flush_all_clears_everything() {
        let (t, stats) = table();
        for i in 0..100 {
            t.set(format!("key-{}", i).as_bytes(), Bytes::from("v"), 0, 0);
        }

        t.flush_all();

        for i in 0..100 {
            assert_eq!(t.get(format!("key-{}", i).as_bytes()), None);
        }
        let snap = stats.snapshot();
        assert_eq!(snap.curr_items, 0);
        assert_eq!(snap.bytes, 0);
        assert_eq!(snap.total_items, 100);
    }

    #[test]
    fn colliding_keys_coexist_in_one_bucket() {
        // find a second key that lands in the same bucket as "a"
        let target = djb2(b"a") as usize % BUCKET_COUNT;
        let other = (0..)
            .map(|i| format!("probe-{}", i))
            .find(|k| djb2(k.as_bytes()) as usize % BUCKET_COUNT == target)
            .unwrap();

        let (t, _) = table();
        t.set(b"a", Bytes::from("first"), 0, 0);
        t.set(other.as_bytes(), Bytes::from("second"), 0, 0);

        assert_eq!(t.get(b"a"), Some((Bytes::from("first"), 0)));
        assert_eq!(t.get(other.as_bytes()), Some((Bytes::from("second"), 0)));

        assert!(t.delete(b"a"));
        assert_eq!(t.get(other.as_bytes()), Some((Bytes::from("second"), 0)));
    }

    #[test]
    fn concurrent_sets_on_distinct_keys_all_land() {
        use std::thread;

        let (t, _) = table();
        let t = Arc::new(t);
        let mut handles = vec![];

        for i in 0..10 {
            let t = Arc::clone(&t);
            handles.push(thread::spawn(move || {
                for j in 0..100 {
                    let key = format!("key-{}-{}", i, j);
                    t.set(key.as_bytes(), Bytes::from("value"), 0, 0);
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        for i in 0..10 {
            for j in 0..100 {
                let key = format!("key-{}-{}", i, j);
                assert_eq!(t.get(key.as_bytes()), Some((Bytes::from("value"), 0)));
            }
        }
    }

    #[test]
    fn djb2_matches_reference_values() {
        // hand-computed: h("") = 5381, h("a") = 5381*33 + 97
        assert_eq!(djb2(b""), 5381);
        assert_eq!(djb2(b"a"), 5381u32.wrapping_mul(33).wrapping_add(97));
    }
}
