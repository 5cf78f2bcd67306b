//! Connection Handling Module
//!
//! Manages individual client connections. Each accepted socket gets its
//! own async task running the protocol loop, so the server handles many
//! concurrent clients while a slow client only stalls itself.

pub mod handler;

pub use handler::{handle_connection, ConnectionError, ConnectionHandler};
