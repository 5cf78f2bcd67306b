//! Memcached Text Protocol
//!
//! Parsing and rendering for the line-oriented text protocol.
//!
//! ## Modules
//!
//! - `types`: the `Command` and `Response` models plus protocol limits
//! - `parser`: incremental parser over a connection's byte buffer
//!
//! ## Example
//!
//! ```
//! use memcrab::protocol::{parse, Command, Response};
//! use bytes::Bytes;
//!
//! let (cmd, consumed) = parse(b"get name\r\n").unwrap().unwrap();
//! assert_eq!(consumed, 10);
//! assert!(matches!(cmd, Command::Get { .. }));
//!
//! let reply = Response::Value {
//!     key: Bytes::from("name"),
//!     flags: 0,
//!     data: Bytes::from("Ariz"),
//! };
//! assert_eq!(reply.serialize(), b"VALUE name 0 4\r\nAriz\r\n");
//! ```

pub mod parser;
pub mod types;

// Re-export commonly used types for convenience
pub use parser::{normalize_exptime, parse, ParseError, ParseResult};
pub use types::{
    Command, Response, StoreVerb, CRLF, MAX_KEY_LEN, MAX_RELATIVE_EXPTIME, MAX_VALUE_LEN,
};
