//! # Memcrab - A Concurrent In-Memory Cache Server
//!
//! Memcrab is an in-memory key-value cache speaking the memcached text
//! protocol over TCP. It demonstrates systems programming concepts like
//! fine-grained locking, incremental protocol parsing, and async network
//! programming.
//!
//! ## Features
//!
//! - **Memcached-Compatible**: Speaks the line-oriented memcached text protocol
//! - **Fine-Grained Locking**: One mutex per hash bucket, so writers to
//!   different buckets never contend
//! - **Lazy Expiration**: Expired entries are reclaimed when touched, with
//!   no background sweeper
//! - **Async I/O**: Built on Tokio, one task per client connection
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                              Memcrab                                    │
//! │                                                                         │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐                  │
//! │  │ TCP Server  │───>│ Connection  │───>│  Command    │                  │
//! │  │ (Listener)  │    │  Handler    │    │  Handler    │                  │
//! │  └─────────────┘    └─────────────┘    └──────┬──────┘                  │
//! │                                               │                         │
//! │                                               ▼                         │
//! │  ┌─────────────┐    ┌──────────────────────────────────────────────┐    │
//! │  │    Text     │    │               CacheTable                     │    │
//! │  │   Parser    │    │  ┌────────┐ ┌────────┐ ┌────────┐ ┌────────┐ │    │
//! │  │             │    │  │Bucket 0│ │Bucket 1│ │Bucket 2│ │ ...    │ │    │
//! │  └─────────────┘    │  │Mutex   │ │Mutex   │ │Mutex   │ │10007   │ │    │
//! │                     │  └────────┘ └────────┘ └────────┘ └────────┘ │    │
//! │                     └──────────────────────┬───────────────────────┘    │
//! │                                            │                            │
//! │                                            ▼                            │
//! │                     ┌─────────────────────────────────────────────┐     │
//! │                     │          ServerStats (one mutex)            │     │
//! │                     └─────────────────────────────────────────────┘     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use memcrab::commands::CommandHandler;
//! use memcrab::connection::handle_connection;
//! use memcrab::stats::ServerStats;
//! use memcrab::storage::CacheTable;
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//!
//! #[tokio::main]
//! async fn main() {
//!     let stats = Arc::new(ServerStats::new());
//!     let storage = Arc::new(CacheTable::new(Arc::clone(&stats)));
//!
//!     let listener = TcpListener::bind("0.0.0.0:11211").await.unwrap();
//!
//!     loop {
//!         let (stream, addr) = listener.accept().await.unwrap();
//!         let handler = CommandHandler::new(Arc::clone(&storage), Arc::clone(&stats));
//!         let stats = Arc::clone(&stats);
//!
//!         tokio::spawn(handle_connection(stream, addr, handler, stats));
//!     }
//! }
//! ```
//!
//! ## Supported Commands
//!
//! ### Storage Commands
//! - `set key flags exptime bytes [noreply]` - store unconditionally
//! - `add key flags exptime bytes [noreply]` - store only if absent
//! - `replace key flags exptime bytes [noreply]` - store only if present
//! - `append key flags exptime bytes [noreply]` - extend an existing value
//! - `prepend key flags exptime bytes [noreply]` - prefix an existing value
//!
//! ### Retrieval and Maintenance
//! - `get key [key ...]`
//! - `delete key`
//! - `flush_all`
//! - `stats`
//! - `quit`
//!
//! ## Module Overview
//!
//! - [`protocol`]: text protocol parser and command/response types
//! - [`storage`]: bucketed hash table with per-bucket locking
//! - [`commands`]: command execution against storage and stats
//! - [`connection`]: client connection management
//! - [`stats`]: server-wide counter aggregation
//!
//! ## Design Highlights
//!
//! ### Thread Safety
//!
//! The cache table holds 10007 buckets, each guarded by its own mutex.
//! Operations on keys in different buckets proceed fully in parallel;
//! only same-bucket collisions serialize.
//!
//! ### Zero-Copy Values
//!
//! Values are stored as `bytes::Bytes`, so a `get` hands back a refcounted
//! handle without copying the payload.
//!
//! ### Lazy Expiry
//!
//! There is no background sweeper. An expired entry is unlinked the next
//! time any operation touches it, which keeps the locking story simple at
//! the cost of letting untouched corpses linger.

pub mod commands;
pub mod connection;
pub mod protocol;
pub mod stats;
pub mod storage;

// Re-export commonly used types for convenience
pub use commands::CommandHandler;
pub use connection::handle_connection;
pub use protocol::{Command, ParseError, Response};
pub use stats::ServerStats;
pub use storage::CacheTable;

/// The default port memcrab listens on (same as memcached)
pub const DEFAULT_PORT: u16 = 11211;

/// The default host memcrab binds to
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Version of memcrab
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
