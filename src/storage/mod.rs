//! Storage Module
//!
//! The bucket-locked cache table shared by every connection.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       CacheTable                            │
//! │  ┌──────────┐ ┌──────────┐ ┌──────────┐     ┌──────────┐   │
//! │  │ Bucket 0 │ │ Bucket 1 │ │ Bucket 2 │ ... │  10006   │   │
//! │  │  Mutex   │ │  Mutex   │ │  Mutex   │     │  Mutex   │   │
//! │  └──────────┘ └──────────┘ └──────────┘     └──────────┘   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! - **Bucket-level locking**: 10007 independent mutexes; operations on
//!   keys in different buckets never contend.
//! - **Lazy expiration**: expired entries are unlinked by the next access
//!   that finds them; there is no background sweeper.
//!
//! ## Example
//!
//! ```
//! use memcrab::stats::ServerStats;
//! use memcrab::storage::CacheTable;
//! use bytes::Bytes;
//! use std::sync::Arc;
//!
//! let table = CacheTable::new(Arc::new(ServerStats::new()));
//!
//! table.set(b"name", Bytes::from("Ariz"), 0, 0);
//! assert_eq!(table.get(b"name"), Some((Bytes::from("Ariz"), 0)));
//! ```

pub mod engine;

// Re-export commonly used types
pub use engine::{unix_now, CacheEntry, CacheTable, BUCKET_COUNT};
