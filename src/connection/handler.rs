//! Connection Handler
//!
//! Runs the protocol loop for a single client: accumulate bytes, parse one
//! command at a time, execute it, write the response units back. One
//! spawned task per connection; a client that stalls mid-payload parks
//! only its own task.
//!
//! ## Connection Lifecycle
//!
//! ```text
//! accept ──> ConnectionHandler::run
//!                │
//!                ▼
//!        ┌──────────────────────────────┐
//!        │ read bytes into BytesMut     │
//!        │       │                      │
//!        │       ▼                      │
//!        │ parse command (may need      │
//!        │ line + payload + trailer)    │
//!        │       │                      │
//!        │       ▼                      │
//!        │ execute + write units        │
//!        │       │                      │
//!        │       └──── loop ────────────│
//!        └──────────────────────────────┘
//!                │
//!                ▼
//!        quit / EOF / error ──> counters decremented, task ends
//! ```
//!
//! ## Error Containment
//!
//! A malformed command line answers `ERROR` (an oversized value
//! declaration answers `SERVER_ERROR`), the offending line is drained, and
//! the loop keeps going. Transport errors and mid-command EOF abandon the
//! in-flight command silently and end only this connection's task.

use crate::commands::CommandHandler;
use crate::protocol::{parse, Command, ParseError, Response, CRLF, MAX_VALUE_LEN};
use crate::stats::ServerStats;
use bytes::BytesMut;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;
use tracing::{debug, error, info, trace, warn};

/// Hard ceiling on the accumulation buffer. A maximal storage command
/// (250-byte key, 1 MiB payload, trailer) always fits below this.
const MAX_BUFFER_SIZE: usize = MAX_VALUE_LEN + 8 * 1024;

/// Initial buffer capacity
const INITIAL_BUFFER_SIZE: usize = 4096;

/// Handles a single client connection.
pub struct ConnectionHandler {
    /// The TCP stream for this connection
    stream: BufWriter<TcpStream>,

    /// Client's address (for logging)
    addr: SocketAddr,

    /// Buffer for incoming data
    buffer: BytesMut,

    /// The command handler (shared across connections)
    handler: CommandHandler,

    /// Server-wide statistics (connection counters)
    stats: Arc<ServerStats>,
}

impl ConnectionHandler {
    /// Creates a new connection handler and counts the connection.
    pub fn new(
        stream: TcpStream,
        addr: SocketAddr,
        handler: CommandHandler,
        stats: Arc<ServerStats>,
    ) -> Self {
        stats.connection_opened();

        Self {
            stream: BufWriter::new(stream),
            addr,
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_SIZE),
            handler,
            stats,
        }
    }

    /// Runs the connection to completion.
    pub async fn run(mut self) -> Result<(), ConnectionError> {
        info!(client = %self.addr, "Client connected");

        let result = self.main_loop().await;

        match &result {
            Ok(()) => info!(client = %self.addr, "Client disconnected gracefully"),
            Err(e) => match e {
                ConnectionError::ClientDisconnected => {
                    debug!(client = %self.addr, "Client disconnected")
                }
                ConnectionError::IoError(io_err)
                    if io_err.kind() == std::io::ErrorKind::ConnectionReset =>
                {
                    debug!(client = %self.addr, "Connection reset by client")
                }
                _ => warn!(client = %self.addr, error = %e, "Connection error"),
            },
        }

        self.stats.connection_closed();
        result
    }

    /// The main read-parse-execute-respond loop.
    async fn main_loop(&mut self) -> Result<(), ConnectionError> {
        loop {
            while !self.buffer.is_empty() {
                match parse(&self.buffer) {
                    Ok(Some((command, consumed))) => {
                        let _ = self.buffer.split_to(consumed);
                        trace!(
                            client = %self.addr,
                            consumed = consumed,
                            remaining = self.buffer.len(),
                            "Parsed command"
                        );

                        if matches!(command, Command::Quit) {
                            debug!(client = %self.addr, "Client issued quit");
                            return Ok(());
                        }

                        self.respond(command).await?;
                    }
                    Ok(None) => {
                        // Incomplete command - need more data
                        trace!(
                            client = %self.addr,
                            buffered = self.buffer.len(),
                            "Incomplete command, need more data"
                        );
                        break;
                    }
                    Err(e) => {
                        warn!(client = %self.addr, error = %e, "Rejected command");
                        self.report_parse_error(&e).await?;
                        self.drain_bad_line();
                    }
                }
            }

            self.read_more_data().await?;
        }
    }

    /// Executes a command and writes its response units in order.
    async fn respond(&mut self, command: Command) -> Result<(), ConnectionError> {
        let units = self.handler.execute(command);
        if units.is_empty() {
            // noreply: side effects happened, nothing goes on the wire
            return Ok(());
        }

        for unit in &units {
            let bytes = unit.serialize();
            self.stream.write_all(&bytes).await?;
        }
        self.stream.flush().await?;
        Ok(())
    }

    /// Answers a malformed line without closing the connection.
    async fn report_parse_error(&mut self, err: &ParseError) -> Result<(), ConnectionError> {
        let unit = match err {
            ParseError::ValueTooLarge => {
                Response::ServerError("object too large for cache".to_string())
            }
            _ => Response::Error,
        };
        self.stream.write_all(&unit.serialize()).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Skips past the offending command line so the next one can parse.
    fn drain_bad_line(&mut self) {
        match self.buffer.windows(2).position(|w| w == CRLF) {
            Some(pos) => {
                let _ = self.buffer.split_to(pos + 2);
            }
            None => self.buffer.clear(),
        }
    }

    /// Reads more data from the socket into the buffer.
    async fn read_more_data(&mut self) -> Result<(), ConnectionError> {
        if self.buffer.len() >= MAX_BUFFER_SIZE {
            error!(
                client = %self.addr,
                size = self.buffer.len(),
                "Buffer size limit exceeded"
            );
            return Err(ConnectionError::BufferFull);
        }

        if self.buffer.capacity() - self.buffer.len() < 1024 {
            self.buffer.reserve(4096);
        }

        let n = self.stream.get_mut().read_buf(&mut self.buffer).await?;

        if n == 0 {
            // Peer closed; an in-flight command is abandoned silently
            if self.buffer.is_empty() {
                return Err(ConnectionError::ClientDisconnected);
            } else {
                return Err(ConnectionError::UnexpectedEof);
            }
        }

        trace!(client = %self.addr, bytes = n, "Read data");
        Ok(())
    }
}

/// Errors that can occur while handling a connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// I/O error (network issue)
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Client disconnected between commands
    #[error("Client disconnected")]
    ClientDisconnected,

    /// Stream ended with a partial command buffered
    #[error("Unexpected end of stream")]
    UnexpectedEof,

    /// Buffer size limit exceeded
    #[error("Buffer size limit exceeded")]
    BufferFull,
}

/// Handles a client connection to completion.
///
/// Convenience wrapper for the accept loop: failures are contained and
/// logged here so a connection error never propagates past its own task.
pub async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    handler: CommandHandler,
    stats: Arc<ServerStats>,
) {
    let conn = ConnectionHandler::new(stream, addr, handler, stats);
    if let Err(e) = conn.run().await {
        match e {
            ConnectionError::ClientDisconnected => {}
            ConnectionError::IoError(ref io_err)
                if io_err.kind() == std::io::ErrorKind::ConnectionReset => {}
            _ => {
                debug!(client = %addr, error = %e, "Connection ended with error");
            }
        }
    }
}
