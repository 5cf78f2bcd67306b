//! Incremental Text Protocol Parser
//!
//! Parses the memcached text protocol out of a connection's accumulation
//! buffer. The parser is incremental: it returns either
//!
//! - `Ok(Some((command, consumed)))` - a complete command, `consumed` bytes
//!   of the buffer were used
//! - `Ok(None)` - the buffered data is incomplete, read more
//! - `Err(ParseError)` - the command line is malformed
//!
//! Storage commands span two phases on the wire: a command line, then an
//! exact-length data block and a two-byte trailer. The parser only yields
//! such a command once the whole span is buffered, so a payload containing
//! embedded CR/LF parses correctly. The trailer is consumed and discarded
//! without verification, as the protocol prescribes.
//!
//! Tokenization is byte-wise (split on spaces), never UTF-8, so binary
//! keys round-trip.

use crate::protocol::types::{
    Command, StoreVerb, MAX_KEY_LEN, MAX_RELATIVE_EXPTIME, MAX_VALUE_LEN,
};
use crate::storage::unix_now;
use bytes::Bytes;
use thiserror::Error;

/// Errors for a malformed command line.
///
/// All of these are answered on the wire with `ERROR`, except
/// [`ParseError::ValueTooLarge`] which gets a `SERVER_ERROR` line. They
/// never terminate the connection.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("empty command line")]
    EmptyLine,

    #[error("unknown command verb")]
    UnknownCommand,

    #[error("missing required argument")]
    MissingArgument,

    #[error("unparseable numeric field")]
    BadNumber,

    #[error("unexpected trailing token")]
    UnexpectedToken,

    #[error("key exceeds {MAX_KEY_LEN} bytes")]
    KeyTooLong,

    #[error("value exceeds {MAX_VALUE_LEN} bytes")]
    ValueTooLarge,
}

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// Attempts to parse one complete command from the front of `buf`.
pub fn parse(buf: &[u8]) -> ParseResult<Option<(Command, usize)>> {
    let Some(line_end) = find_crlf(buf) else {
        return Ok(None);
    };
    let line = &buf[..line_end];
    let mut tokens = line.split(|&b| b == b' ').filter(|t| !t.is_empty());

    let verb = tokens.next().ok_or(ParseError::EmptyLine)?;
    match verb {
        b"set" => parse_store(StoreVerb::Set, tokens, buf, line_end),
        b"add" => parse_store(StoreVerb::Add, tokens, buf, line_end),
        b"replace" => parse_store(StoreVerb::Replace, tokens, buf, line_end),
        b"append" => parse_store(StoreVerb::Append, tokens, buf, line_end),
        b"prepend" => parse_store(StoreVerb::Prepend, tokens, buf, line_end),
        b"get" => {
            let mut keys = Vec::new();
            for tok in tokens {
                keys.push(parse_key(tok)?);
            }
            if keys.is_empty() {
                return Err(ParseError::MissingArgument);
            }
            Ok(Some((Command::Get { keys }, line_end + 2)))
        }
        b"delete" => {
            let key = parse_key(tokens.next().ok_or(ParseError::MissingArgument)?)?;
            expect_end(tokens)?;
            Ok(Some((Command::Delete { key }, line_end + 2)))
        }
        b"flush_all" => {
            expect_end(tokens)?;
            Ok(Some((Command::FlushAll, line_end + 2)))
        }
        b"stats" => {
            expect_end(tokens)?;
            Ok(Some((Command::Stats, line_end + 2)))
        }
        b"quit" => {
            expect_end(tokens)?;
            Ok(Some((Command::Quit, line_end + 2)))
        }
        _ => Err(ParseError::UnknownCommand),
    }
}

/// Rewrites a raw `exptime` into an absolute Unix second.
///
/// 0 stays 0 (never expires); a positive value up to 30 days is a relative
/// offset from `now`; anything larger is already an absolute timestamp; a
/// negative value maps to 1, an instant long in the past, so the entry is
/// stored already expired.
pub fn normalize_exptime(raw: i64, now: u64) -> u64 {
    if raw == 0 {
        0
    } else if raw < 0 {
        1
    } else if raw <= MAX_RELATIVE_EXPTIME {
        now + raw as u64
    } else {
        raw as u64
    }
}

fn parse_store<'a>(
    verb: StoreVerb,
    mut tokens: impl Iterator<Item = &'a [u8]>,
    buf: &[u8],
    line_end: usize,
) -> ParseResult<Option<(Command, usize)>> {
    let key = parse_key(tokens.next().ok_or(ParseError::MissingArgument)?)?;
    let flags: u32 = parse_num(tokens.next())?;
    let exptime_raw: i64 = parse_num(tokens.next())?;
    let bytes: usize = parse_num(tokens.next())?;

    if bytes > MAX_VALUE_LEN {
        return Err(ParseError::ValueTooLarge);
    }

    let noreply = match tokens.next() {
        None => false,
        Some(b"noreply") => true,
        Some(_) => return Err(ParseError::UnexpectedToken),
    };
    expect_end(tokens)?;

    // the command is complete only once line + payload + trailer are here
    let data_start = line_end + 2;
    let total = data_start + bytes + 2;
    if buf.len() < total {
        return Ok(None);
    }

    let data = Bytes::copy_from_slice(&buf[data_start..data_start + bytes]);

    Ok(Some((
        Command::Store {
            verb,
            key,
            flags,
            exptime: normalize_exptime(exptime_raw, unix_now()),
            data,
            noreply,
        },
        total,
    )))
}

fn parse_key(tok: &[u8]) -> ParseResult<Bytes> {
    if tok.len() > MAX_KEY_LEN {
        return Err(ParseError::KeyTooLong);
    }
    Ok(Bytes::copy_from_slice(tok))
}

fn parse_num<T: std::str::FromStr>(tok: Option<&[u8]>) -> ParseResult<T> {
    let tok = tok.ok_or(ParseError::MissingArgument)?;
    std::str::from_utf8(tok)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or(ParseError::BadNumber)
}

fn expect_end<'a>(mut tokens: impl Iterator<Item = &'a [u8]>) -> ParseResult<()> {
    if tokens.next().is_some() {
        return Err(ParseError::UnexpectedToken);
    }
    Ok(())
}

/// Finds the position of the first CRLF, returning the index of `\r`.
#[inline]
fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}
