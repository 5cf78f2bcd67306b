//! Command Layer
//!
//! Receives parsed commands, executes them against the storage engine and
//! statistics aggregator, and returns response units for the wire.
//!
//! ```text
//! Client Request
//!       │
//!       ▼
//! ┌─────────────────┐
//! │  Text Parser    │  (protocol module)
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ CommandHandler  │  (this module)
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐      ┌─────────────────┐
//! │   CacheTable    │      │   ServerStats   │
//! └─────────────────┘      └─────────────────┘
//! ```

pub mod handler;

// Re-export the main command handler
pub use handler::CommandHandler;
