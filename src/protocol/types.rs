//! Typed Wire Replies
//!
//! EmberKV answers every request with one of five reply shapes, borrowed
//! from the Redis serialization protocol (RESP):
//!
//! - Simple string: `+OK\r\n`
//! - Error: `-ERR unknown command 'foo'\r\n`
//! - Integer: `:1\r\n`
//! - Bulk string: `$5\r\nhello\r\n`
//! - Nil bulk: `$-1\r\n`
//!
//! Requests are not modeled here: the server only ever receives flat arrays
//! of bulk strings, which the [`parser`](crate::protocol::parser) decodes
//! straight into argument vectors.

use bytes::Bytes;
use std::fmt;

/// The CRLF terminator used throughout the wire protocol.
pub const CRLF: &[u8] = b"\r\n";

/// Wire protocol type prefixes.
pub mod prefix {
    pub const SIMPLE_STRING: u8 = b'+';
    pub const ERROR: u8 = b'-';
    pub const INTEGER: u8 = b':';
    pub const BULK_STRING: u8 = b'$';
    pub const ARRAY: u8 = b'*';
}

/// A single reply frame, ready to be encoded onto the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Non-binary-safe status line, e.g. "OK" or "PONG". Must not contain CRLF.
    Simple(String),

    /// Client-visible failure, e.g. "ERR wrong number of arguments".
    Error(String),

    /// 64-bit signed integer, used for DEL.
    Integer(i64),

    /// Binary-safe, length-prefixed payload, used for GET hits.
    Bulk(Bytes),

    /// Absent value: `$-1\r\n`.
    Nil,
}

impl Reply {
    /// The canonical success reply: `+OK\r\n`.
    pub fn ok() -> Self {
        Reply::Simple("OK".to_string())
    }

    /// The canonical PING reply: `+PONG\r\n`.
    pub fn pong() -> Self {
        Reply::Simple("PONG".to_string())
    }

    /// Creates an error reply.
    pub fn error(msg: impl Into<String>) -> Self {
        Reply::Error(msg.into())
    }

    /// Creates a bulk reply from anything byte-like.
    pub fn bulk(data: impl Into<Bytes>) -> Self {
        Reply::Bulk(data.into())
    }

    /// Returns true if this reply is an error.
    pub fn is_error(&self) -> bool {
        matches!(self, Reply::Error(_))
    }

    /// Encodes the reply to a fresh byte vector.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.encode_into(&mut buf);
        buf
    }

    /// Encodes the reply into an existing buffer, avoiding an allocation
    /// when the caller already holds one.
    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        match self {
            Reply::Simple(s) => {
                buf.push(prefix::SIMPLE_STRING);
                buf.extend_from_slice(s.as_bytes());
                buf.extend_from_slice(CRLF);
            }
            Reply::Error(s) => {
                buf.push(prefix::ERROR);
                buf.extend_from_slice(s.as_bytes());
                buf.extend_from_slice(CRLF);
            }
            Reply::Integer(n) => {
                buf.push(prefix::INTEGER);
                buf.extend_from_slice(n.to_string().as_bytes());
                buf.extend_from_slice(CRLF);
            }
            Reply::Bulk(data) => {
                buf.push(prefix::BULK_STRING);
                buf.extend_from_slice(data.len().to_string().as_bytes());
                buf.extend_from_slice(CRLF);
                buf.extend_from_slice(data);
                buf.extend_from_slice(CRLF);
            }
            Reply::Nil => {
                buf.push(prefix::BULK_STRING);
                buf.extend_from_slice(b"-1");
                buf.extend_from_slice(CRLF);
            }
        }
    }
}

impl fmt::Display for Reply {
    /// Human-oriented rendering for the interactive client.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Simple(s) => write!(f, "{}", s),
            Reply::Error(s) => write!(f, "(error) {}", s),
            Reply::Integer(n) => write!(f, "(integer) {}", n),
            Reply::Bulk(data) => {
                if let Ok(s) = std::str::from_utf8(data) {
                    write!(f, "\"{}\"", s)
                } else {
                    write!(f, "(binary data, {} bytes)", data.len())
                }
            }
            Reply::Nil => write!(f, "(nil)"),
        }
    }
}
