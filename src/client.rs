//! Minimal Async Client
//!
//! Just enough client to drive a server: encode one command as an array
//! frame, write it, read bytes until the incremental reply parser yields a
//! complete reply. Used by the interactive shell, the benchmark harness and
//! as a convenient handle in integration tests.

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, ToSocketAddrs};

use crate::protocol::{parse_reply, ParseError, Reply, CRLF};

/// Errors surfaced by the client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Parse(#[from] ParseError),

    /// The server closed the connection mid-reply.
    #[error("server closed the connection")]
    Closed,
}

/// A connection to an EmberKV server.
pub struct Client {
    stream: TcpStream,
    buffer: BytesMut,
}

impl Client {
    /// Connects and disables Nagle's algorithm, matching the server side.
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        Ok(Self {
            stream,
            buffer: BytesMut::with_capacity(4096),
        })
    }

    /// Sends one command (element 0 is the command name) and awaits its reply.
    pub async fn command(&mut self, args: &[&[u8]]) -> Result<Reply, ClientError> {
        let frame = encode_request(args);
        self.stream.write_all(&frame).await?;
        self.read_reply().await
    }

    pub async fn ping(&mut self) -> Result<Reply, ClientError> {
        self.command(&[b"PING"]).await
    }

    pub async fn set(&mut self, key: &[u8], value: &[u8]) -> Result<Reply, ClientError> {
        self.command(&[b"SET", key, value]).await
    }

    pub async fn get(&mut self, key: &[u8]) -> Result<Reply, ClientError> {
        self.command(&[b"GET", key]).await
    }

    pub async fn del(&mut self, key: &[u8]) -> Result<Reply, ClientError> {
        self.command(&[b"DEL", key]).await
    }

    pub async fn flushall(&mut self) -> Result<Reply, ClientError> {
        self.command(&[b"FLUSHALL"]).await
    }

    pub async fn exit(&mut self) -> Result<Reply, ClientError> {
        self.command(&[b"EXIT"]).await
    }

    /// Reads until the buffer holds one complete reply.
    async fn read_reply(&mut self) -> Result<Reply, ClientError> {
        loop {
            if let Some((reply, consumed)) = parse_reply(&self.buffer)? {
                let _ = self.buffer.split_to(consumed);
                return Ok(reply);
            }
            let n = self.stream.read_buf(&mut self.buffer).await?;
            if n == 0 {
                return Err(ClientError::Closed);
            }
        }
    }
}

/// Encodes a command as an array of bulk strings.
fn encode_request(args: &[&[u8]]) -> Vec<u8> {
    let mut frame = Vec::new();
    frame.push(b'*');
    frame.extend_from_slice(args.len().to_string().as_bytes());
    frame.extend_from_slice(CRLF);
    for arg in args {
        frame.push(b'$');
        frame.extend_from_slice(arg.len().to_string().as_bytes());
        frame.extend_from_slice(CRLF);
        frame.extend_from_slice(arg);
        frame.extend_from_slice(CRLF);
    }
    frame
}
