//! Connection Handler
//!
//! Each accepted client gets its own handler task that runs a loop: read
//! bytes from the socket, frame complete requests out of the buffer, execute
//! them, and write one response per request back on the same connection.
//!
//! ## Connection lifecycle
//!
//! ```text
//! 1. Client connects (TCP handshake)
//!        │
//!        ▼
//! 2. ConnectionHandler spawned
//!        │
//!        ▼
//! 3. ┌──────────────────────────────┐
//!    │      Main Loop               │
//!    │                              │
//!    │  frame requests from buffer  │
//!    │  execute each against store  │
//!    │  write responses in order    │
//!    │  read more bytes from socket │
//!    └──────────────────────────────┘
//!        │
//!        ▼
//! 4. EOF / read error
//!        │
//!        ▼
//! 5. Handler task ends, connection closed
//! ```
//!
//! ## Buffer management
//!
//! Incoming data accumulates in a `BytesMut`. TCP is a stream, so a single
//! read may carry half a command or several pipelined ones; the framer's
//! `Some((parsed, consumed))` / `None` contract handles both.
//!
//! Command errors (unknown verbs, bad arguments, failed preconditions) are
//! answered on the wire and never terminate the loop. Response write errors
//! are swallowed: the remote has presumably gone away, and the next read
//! will observe it.

use crate::commands::CommandHandler;
use crate::protocol::parser::{parse_command, ParsedCommand};
use crate::server::LogLevel;
use bytes::BytesMut;
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

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

    /// The command executor (shared store behind it)
    commands: CommandHandler,

    /// How chatty this connection should be
    log_level: LogLevel,
}

impl ConnectionHandler {
    /// Creates a new connection handler.
    pub fn new(
        stream: TcpStream,
        addr: SocketAddr,
        commands: CommandHandler,
        log_level: LogLevel,
    ) -> Self {
        Self {
            stream: BufWriter::new(stream),
            addr,
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_SIZE),
            commands,
            log_level,
        }
    }

    /// Runs the connection to completion.
    ///
    /// Reads commands from the client, executes them, and sends back
    /// responses until the client disconnects or a read error occurs.
    pub async fn run(mut self) -> Result<(), ConnectionError> {
        if self.log_level >= LogLevel::Info {
            info!(client = %self.addr, "client connected");
        }

        let result = self.main_loop().await;

        if self.log_level >= LogLevel::Info {
            match &result {
                Ok(()) | Err(ConnectionError::ClientDisconnected) => {
                    info!(client = %self.addr, "client disconnected")
                }
                Err(ConnectionError::Io(io_err))
                    if io_err.kind() == std::io::ErrorKind::ConnectionReset =>
                {
                    debug!(client = %self.addr, "connection reset by client")
                }
                Err(e) => warn!(client = %self.addr, error = %e, "connection error"),
            }
        }

        result
    }

    /// The read-frame-execute-respond loop.
    async fn main_loop(&mut self) -> Result<(), ConnectionError> {
        loop {
            // Drain every complete request currently in the buffer.
            while let Some((parsed, consumed)) = parse_command(&self.buffer) {
                let _ = self.buffer.split_to(consumed);

                let response = match parsed {
                    ParsedCommand::Dispatch(command) => self.commands.execute(command),
                    ParsedCommand::Reject(response) => response,
                };

                let bytes = response.serialize();
                if self.log_level >= LogLevel::Debug {
                    debug!(
                        client = %self.addr,
                        result = %String::from_utf8_lossy(&bytes).trim_end(),
                        "command executed"
                    );
                }

                // A failed write means the remote is gone; the next read
                // will surface it and end the loop.
                if let Err(e) = self.send_response(&bytes).await {
                    if self.log_level >= LogLevel::Debug {
                        debug!(client = %self.addr, error = %e, "response write failed");
                    }
                }
            }

            // Need more data.
            self.read_more_data().await?;
        }
    }

    /// Reads more data from the socket into the buffer.
    async fn read_more_data(&mut self) -> Result<(), ConnectionError> {
        if self.buffer.capacity() - self.buffer.len() < 1024 {
            self.buffer.reserve(INITIAL_BUFFER_SIZE);
        }

        let n = self.stream.get_mut().read_buf(&mut self.buffer).await?;

        if n == 0 {
            // Connection closed by client.
            if self.buffer.is_empty() {
                return Err(ConnectionError::ClientDisconnected);
            }
            // Partial command left in the buffer.
            return Err(ConnectionError::UnexpectedEof);
        }

        Ok(())
    }

    /// Sends a serialized response to the client.
    async fn send_response(&mut self, bytes: &[u8]) -> Result<(), std::io::Error> {
        self.stream.write_all(bytes).await?;
        self.stream.flush().await?;
        Ok(())
    }
}

/// Errors that can end a connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// I/O error (network issue)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Client disconnected normally
    #[error("client disconnected")]
    ClientDisconnected,

    /// Unexpected end of stream (partial command left unread)
    #[error("unexpected end of stream")]
    UnexpectedEof,
}

/// Handles a client connection to completion.
///
/// Convenience wrapper used by the accept loop: creates a
/// [`ConnectionHandler`] and runs it, demoting the routine exit paths to
/// silence.
pub async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    commands: CommandHandler,
    log_level: LogLevel,
) {
    let handler = ConnectionHandler::new(stream, addr, commands, log_level);
    if let Err(e) = handler.run().await {
        match e {
            ConnectionError::ClientDisconnected => {}
            ConnectionError::Io(ref io_err)
                if io_err.kind() == std::io::ErrorKind::ConnectionReset => {}
            _ => {
                if log_level >= LogLevel::Info {
                    debug!(client = %addr, error = %e, "connection ended with error");
                }
            }
        }
    }
}
