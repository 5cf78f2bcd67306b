//! Memcached Text Protocol Types
//!
//! Commands and responses for the line-oriented, CRLF-terminated text
//! protocol. All response lines end in CRLF; a `VALUE` block carries its
//! raw payload bytes between the header line and a trailing CRLF.
//!
//! ## Examples
//!
//! Storage: `set foo 0 0 3\r\nbar\r\n` → `STORED\r\n`
//! Retrieval: `get foo\r\n` → `VALUE foo 0 3\r\nbar\r\nEND\r\n`
//! Miss: `get missing\r\n` → `END\r\n`

use bytes::Bytes;
use std::fmt;

/// The CRLF line terminator
pub const CRLF: &[u8] = b"\r\n";

/// Maximum key length in bytes
pub const MAX_KEY_LEN: usize = 250;

/// Maximum value length in bytes (1 MiB)
pub const MAX_VALUE_LEN: usize = 1024 * 1024;

/// Largest exptime still interpreted as a relative offset (30 days in
/// seconds); anything above is an absolute Unix timestamp.
pub const MAX_RELATIVE_EXPTIME: i64 = 2_592_000;

/// The five storage verbs sharing the two-phase command shape
/// (command line, then an exact-length data block).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreVerb {
    Set,
    Add,
    Replace,
    Append,
    Prepend,
}

impl StoreVerb {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreVerb::Set => "set",
            StoreVerb::Add => "add",
            StoreVerb::Replace => "replace",
            StoreVerb::Append => "append",
            StoreVerb::Prepend => "prepend",
        }
    }
}

impl fmt::Display for StoreVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One fully-parsed client command.
///
/// For storage commands the `exptime` has already been normalized to an
/// absolute Unix second (0 = never) and the payload is attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Store {
        verb: StoreVerb,
        key: Bytes,
        flags: u32,
        exptime: u64,
        data: Bytes,
        noreply: bool,
    },
    /// `get` with one or more keys
    Get { keys: Vec<Bytes> },
    Delete { key: Bytes },
    FlushAll,
    Stats,
    Quit,
}

/// One protocol unit of a server response.
///
/// A command's reply is a sequence of these: a multi-key `get` yields one
/// `Value` per hit followed by `End`; `stats` yields one `Stat` per counter
/// followed by `End`; most commands yield a single unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Stored,
    NotStored,
    Deleted,
    NotFound,
    Ok,
    End,
    Error,
    ServerError(String),
    Value { key: Bytes, flags: u32, data: Bytes },
    Stat { name: &'static str, value: u64 },
}

impl Response {
    /// Encodes this unit into its wire form.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.serialize_into(&mut buf);
        buf
    }

    /// Encodes this unit into an existing buffer.
    pub fn serialize_into(&self, buf: &mut Vec<u8>) {
        match self {
            Response::Stored => buf.extend_from_slice(b"STORED\r\n"),
            Response::NotStored => buf.extend_from_slice(b"NOT_STORED\r\n"),
            Response::Deleted => buf.extend_from_slice(b"DELETED\r\n"),
            Response::NotFound => buf.extend_from_slice(b"NOT_FOUND\r\n"),
            Response::Ok => buf.extend_from_slice(b"OK\r\n"),
            Response::End => buf.extend_from_slice(b"END\r\n"),
            Response::Error => buf.extend_from_slice(b"ERROR\r\n"),
            Response::ServerError(msg) => {
                buf.extend_from_slice(b"SERVER_ERROR ");
                buf.extend_from_slice(msg.as_bytes());
                buf.extend_from_slice(CRLF);
            }
            Response::Value { key, flags, data } => {
                buf.extend_from_slice(b"VALUE ");
                buf.extend_from_slice(key);
                buf.extend_from_slice(format!(" {} {}", flags, data.len()).as_bytes());
                buf.extend_from_slice(CRLF);
                buf.extend_from_slice(data);
                buf.extend_from_slice(CRLF);
            }
            Response::Stat { name, value } => {
                buf.extend_from_slice(format!("STAT {} {}", name, value).as_bytes());
                buf.extend_from_slice(CRLF);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_responses_serialize() {
        assert_eq!(Response::Stored.serialize(), b"STORED\r\n");
        assert_eq!(Response::NotStored.serialize(), b"NOT_STORED\r\n");
        assert_eq!(Response::Deleted.serialize(), b"DELETED\r\n");
        assert_eq!(Response::NotFound.serialize(), b"NOT_FOUND\r\n");
        assert_eq!(Response::Ok.serialize(), b"OK\r\n");
        assert_eq!(Response::End.serialize(), b"END\r\n");
        assert_eq!(Response::Error.serialize(), b"ERROR\r\n");
    }

    #[test]
    fn server_error_carries_message() {
        let r = Response::ServerError("out of memory".to_string());
        assert_eq!(r.serialize(), b"SERVER_ERROR out of memory\r\n");
    }

    #[test]
    fn value_block_serializes() {
        let r = Response::Value {
            key: Bytes::from("foo"),
            flags: 7,
            data: Bytes::from("bar"),
        };
        assert_eq!(r.serialize(), b"VALUE foo 7 3\r\nbar\r\n");
    }

    #[test]
    fn value_block_is_binary_safe() {
        let r = Response::Value {
            key: Bytes::from("k"),
            flags: 0,
            data: Bytes::from(&b"a\r\nb\x00c"[..]),
        };
        assert_eq!(r.serialize(), b"VALUE k 0 7\r\na\r\nb\x00c\r\n");
    }

    #[test]
    fn stat_line_serializes() {
        let r = Response::Stat {
            name: "curr_items",
            value: 12,
        };
        assert_eq!(r.serialize(), b"STAT curr_items 12\r\n");
    }

    #[test]
    fn serialize_into_appends() {
        let mut buf = Vec::new();
        Response::Stored.serialize_into(&mut buf);
        Response::End.serialize_into(&mut buf);
        assert_eq!(buf, b"STORED\r\nEND\r\n");
    }

    #[test]
    fn store_verbs_display() {
        assert_eq!(StoreVerb::Set.to_string(), "set");
        assert_eq!(StoreVerb::Prepend.to_string(), "prepend");
    }
}
