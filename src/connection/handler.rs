//! Per-Connection Handling
//!
//! One handler task per accepted socket, all multiplexed cooperatively on
//! the server's single-threaded runtime:
//!
//! ```text
//! ┌────────────────────────────────────────────┐
//! │              Connection loop               │
//! │                                            │
//! │   read bytes ──> parse frames ──> execute  │
//! │        ▲                            │      │
//! │        │          flush reply <─────┘      │
//! │        └───────────(loop)                  │
//! └────────────────────────────────────────────┘
//! ```
//!
//! TCP is a byte stream: a read may carry half a request or a dozen
//! pipelined ones. Incoming bytes accumulate in a per-connection `BytesMut`;
//! the loop executes every complete frame in the buffer (replies go out in
//! parse order) before reading again. A buffer that reaches its 64 KiB
//! ceiling without containing a complete frame ends the connection — that is
//! the backpressure bound against clients streaming garbage.
//!
//! Protocol errors are answered with `-ERR` and the buffered bytes are
//! dropped so the connection can resynchronize on the next read; only I/O
//! failures and EOF tear the connection down.

use crate::commands::CommandHandler;
use crate::protocol::{Reply, RequestParser};
use bytes::BytesMut;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;
use tracing::{debug, info, trace, warn};

/// Ceiling for a connection's read buffer.
const MAX_BUFFER_SIZE: usize = 64 * 1024;

/// Initial read buffer capacity.
const INITIAL_BUFFER_SIZE: usize = 4096;

/// Shared counters across all connections.
#[derive(Debug, Default)]
pub struct ConnectionStats {
    pub connections_accepted: AtomicU64,
    pub active_connections: AtomicU64,
    pub commands_processed: AtomicU64,
}

impl ConnectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    fn opened(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    fn closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    fn command_processed(&self) {
        self.commands_processed.fetch_add(1, Ordering::Relaxed);
    }
}

/// Errors that end a connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Clean EOF between frames.
    #[error("client disconnected")]
    ClientDisconnected,

    /// EOF with a partial frame still buffered.
    #[error("unexpected end of stream")]
    UnexpectedEof,

    /// The read buffer filled up without containing a complete frame.
    #[error("read buffer limit exceeded")]
    BufferFull,
}

/// State for one client connection.
pub struct ConnectionHandler {
    stream: BufWriter<TcpStream>,
    addr: SocketAddr,
    buffer: BytesMut,
    parser: RequestParser,
    commands: CommandHandler,
    stats: Arc<ConnectionStats>,
}

impl ConnectionHandler {
    pub fn new(
        stream: TcpStream,
        addr: SocketAddr,
        commands: CommandHandler,
        stats: Arc<ConnectionStats>,
    ) -> Self {
        stats.opened();
        Self {
            stream: BufWriter::new(stream),
            addr,
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_SIZE),
            parser: RequestParser::new(),
            commands,
            stats,
        }
    }

    /// Runs the connection to completion.
    pub async fn run(mut self) -> Result<(), ConnectionError> {
        info!(client = %self.addr, "client connected");

        let result = self.main_loop().await;
        match &result {
            Ok(()) | Err(ConnectionError::ClientDisconnected) => {
                debug!(client = %self.addr, "client disconnected");
            }
            Err(ConnectionError::Io(e))
                if e.kind() == std::io::ErrorKind::ConnectionReset =>
            {
                debug!(client = %self.addr, "connection reset by client");
            }
            Err(e) => warn!(client = %self.addr, error = %e, "connection error"),
        }

        self.stats.closed();
        result
    }

    async fn main_loop(&mut self) -> Result<(), ConnectionError> {
        loop {
            self.execute_buffered_frames().await?;
            self.read_more().await?;
        }
    }

    /// Executes every complete frame currently in the buffer.
    async fn execute_buffered_frames(&mut self) -> Result<(), ConnectionError> {
        loop {
            match self.parser.parse(&self.buffer) {
                Ok(Some((args, consumed))) => {
                    let _ = self.buffer.split_to(consumed);
                    if args.is_empty() {
                        // Blank inline line; nothing to answer.
                        continue;
                    }
                    trace!(client = %self.addr, consumed, "frame parsed");
                    let reply = self.commands.execute(args);
                    self.stats.command_processed();
                    self.send_reply(&reply).await?;
                }
                Ok(None) => return Ok(()),
                Err(e) => {
                    // Answer, drop the unparseable bytes, resynchronize at
                    // the next read.
                    warn!(client = %self.addr, error = %e, "protocol error");
                    self.send_reply(&Reply::error(format!("ERR {}", e))).await?;
                    self.buffer.clear();
                    return Ok(());
                }
            }
        }
    }

    async fn read_more(&mut self) -> Result<(), ConnectionError> {
        if self.buffer.len() >= MAX_BUFFER_SIZE {
            warn!(client = %self.addr, size = self.buffer.len(), "read buffer limit exceeded");
            return Err(ConnectionError::BufferFull);
        }

        if self.buffer.capacity() - self.buffer.len() < 1024 {
            self.buffer.reserve(INITIAL_BUFFER_SIZE);
        }

        let n = self.stream.get_mut().read_buf(&mut self.buffer).await?;
        if n == 0 {
            return if self.buffer.is_empty() {
                Err(ConnectionError::ClientDisconnected)
            } else {
                Err(ConnectionError::UnexpectedEof)
            };
        }

        trace!(client = %self.addr, bytes = n, "read");
        Ok(())
    }

    async fn send_reply(&mut self, reply: &Reply) -> Result<(), ConnectionError> {
        let bytes = reply.encode();
        self.stream.write_all(&bytes).await?;
        self.stream.flush().await?;
        trace!(client = %self.addr, bytes = bytes.len(), "reply sent");
        Ok(())
    }
}

/// Convenience wrapper: build a handler, run it, swallow expected endings.
pub async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    commands: CommandHandler,
    stats: Arc<ConnectionStats>,
) {
    let handler = ConnectionHandler::new(stream, addr, commands, stats);
    if let Err(e) = handler.run().await {
        match e {
            ConnectionError::ClientDisconnected => {}
            ConnectionError::Io(ref io_err)
                if io_err.kind() == std::io::ErrorKind::ConnectionReset => {}
            _ => debug!(client = %addr, error = %e, "connection ended with error"),
        }
    }
}
