//! Incremental Frame Parsers
//!
//! TCP delivers byte streams, not frames: a single request may arrive split
//! across many reads, and one read may carry several pipelined requests. Both
//! parsers here are therefore incremental and return:
//!
//! - `Ok(Some((frame, consumed)))` - a complete frame; advance the buffer by
//!   `consumed` bytes
//! - `Ok(None)` - the buffer holds only a partial frame; leave it untouched
//!   and read more
//! - `Err(ParseError)` - the bytes cannot be a valid frame
//!
//! [`RequestParser`] decodes client requests. The canonical form is an array
//! of bulk strings (`*2\r\n$3\r\nGET\r\n$3\r\nfoo\r\n`); any line starting
//! with a different byte is treated as a legacy inline command and split on
//! whitespace, which keeps hand-typed `telnet` sessions working.
//!
//! [`parse_reply`] decodes server replies and exists for the client half of
//! the crate (interactive shell, benchmark harness, end-to-end tests).

use crate::protocol::types::{prefix, Reply, CRLF};
use bytes::Bytes;
use thiserror::Error;

/// Hard ceiling on a single bulk-string length accepted from the wire.
///
/// This is a framing guard against hostile `$999999999` headers, not the
/// key/value size limit; those are enforced per command with proper `-ERR`
/// replies. Kept well below the connection's read-buffer ceiling so any
/// frame the parser accepts can actually be buffered.
pub const MAX_BULK_LEN: usize = 16 * 1024;

/// Hard ceiling on the number of elements in a request array.
pub const MAX_REQUEST_ARGS: usize = 64;

/// Errors produced while decoding a frame.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    /// A length or count field was not a valid decimal integer.
    #[error("invalid length: {0}")]
    InvalidLength(String),

    /// A bulk string declared a length above [`MAX_BULK_LEN`].
    #[error("bulk string too large: {size} bytes (max: {max})")]
    BulkTooLarge { size: usize, max: usize },

    /// A request array declared more than [`MAX_REQUEST_ARGS`] elements.
    #[error("too many arguments: {count} (max: {max})")]
    TooManyArguments { count: usize, max: usize },

    /// Structural violation: wrong prefix byte, missing CRLF, negative count.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A simple string or error line was not valid UTF-8.
    #[error("invalid UTF-8: {0}")]
    InvalidUtf8(String),
}

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// Parses client requests into argument vectors.
///
/// The parser is stateless between frames; per-connection state lives in the
/// connection's read buffer.
#[derive(Debug, Default)]
pub struct RequestParser;

impl RequestParser {
    pub fn new() -> Self {
        Self
    }

    /// Attempts to parse one complete request from `buf`.
    ///
    /// Returns the request's arguments (element 0 is the command name) and
    /// the number of bytes consumed. An empty inline line parses to an empty
    /// argument vector, which callers should skip silently.
    pub fn parse(&self, buf: &[u8]) -> ParseResult<Option<(Vec<Bytes>, usize)>> {
        if buf.is_empty() {
            return Ok(None);
        }
        if buf[0] == prefix::ARRAY {
            self.parse_array(buf)
        } else {
            self.parse_inline(buf)
        }
    }

    /// Parses `*<N>\r\n` followed by N bulk strings.
    fn parse_array(&self, buf: &[u8]) -> ParseResult<Option<(Vec<Bytes>, usize)>> {
        let (count, mut cursor) = match parse_prefixed_integer(buf)? {
            Some(v) => v,
            None => return Ok(None),
        };

        if count < 1 {
            return Err(ParseError::Protocol(format!(
                "invalid request array length {}",
                count
            )));
        }
        let count = count as usize;
        if count > MAX_REQUEST_ARGS {
            return Err(ParseError::TooManyArguments {
                count,
                max: MAX_REQUEST_ARGS,
            });
        }

        let mut args = Vec::with_capacity(count);
        for _ in 0..count {
            match self.parse_bulk(&buf[cursor..])? {
                Some((arg, used)) => {
                    args.push(arg);
                    cursor += used;
                }
                None => return Ok(None),
            }
        }

        Ok(Some((args, cursor)))
    }

    /// Parses one `$<L>\r\n<L bytes>\r\n` element.
    fn parse_bulk(&self, buf: &[u8]) -> ParseResult<Option<(Bytes, usize)>> {
        if buf.is_empty() {
            return Ok(None);
        }
        if buf[0] != prefix::BULK_STRING {
            return Err(ParseError::Protocol(format!(
                "expected bulk string, got prefix {:#04x}",
                buf[0]
            )));
        }

        let (len, data_start) = match parse_prefixed_integer(buf)? {
            Some(v) => v,
            None => return Ok(None),
        };

        if len < 0 {
            return Err(ParseError::Protocol(format!(
                "invalid bulk string length {}",
                len
            )));
        }
        let len = len as usize;
        if len > MAX_BULK_LEN {
            return Err(ParseError::BulkTooLarge {
                size: len,
                max: MAX_BULK_LEN,
            });
        }

        let total = data_start + len + CRLF.len();
        if buf.len() < total {
            return Ok(None);
        }
        if &buf[data_start + len..total] != CRLF {
            return Err(ParseError::Protocol(
                "bulk string missing trailing CRLF".to_string(),
            ));
        }

        let data = Bytes::copy_from_slice(&buf[data_start..data_start + len]);
        Ok(Some((data, total)))
    }

    /// Parses a legacy inline command: one whitespace-separated line.
    fn parse_inline(&self, buf: &[u8]) -> ParseResult<Option<(Vec<Bytes>, usize)>> {
        let line_end = match find_crlf(buf) {
            Some(pos) => pos,
            None => return Ok(None),
        };

        let line = std::str::from_utf8(&buf[..line_end])
            .map_err(|e| ParseError::InvalidUtf8(e.to_string()))?;

        let args = line
            .split_whitespace()
            .map(|tok| Bytes::copy_from_slice(tok.as_bytes()))
            .collect();

        Ok(Some((args, line_end + CRLF.len())))
    }
}

/// Attempts to parse one complete reply from `buf`.
///
/// Same incremental contract as [`RequestParser::parse`].
pub fn parse_reply(buf: &[u8]) -> ParseResult<Option<(Reply, usize)>> {
    if buf.is_empty() {
        return Ok(None);
    }

    match buf[0] {
        prefix::SIMPLE_STRING | prefix::ERROR => {
            let line_end = match find_crlf(&buf[1..]) {
                Some(pos) => pos,
                None => return Ok(None),
            };
            let text = std::str::from_utf8(&buf[1..1 + line_end])
                .map_err(|e| ParseError::InvalidUtf8(e.to_string()))?
                .to_string();
            let consumed = 1 + line_end + CRLF.len();
            let reply = if buf[0] == prefix::SIMPLE_STRING {
                Reply::Simple(text)
            } else {
                Reply::Error(text)
            };
            Ok(Some((reply, consumed)))
        }
        prefix::INTEGER => {
            let (n, consumed) = match parse_prefixed_integer(buf)? {
                Some(v) => v,
                None => return Ok(None),
            };
            Ok(Some((Reply::Integer(n), consumed)))
        }
        prefix::BULK_STRING => {
            let (len, data_start) = match parse_prefixed_integer(buf)? {
                Some(v) => v,
                None => return Ok(None),
            };
            if len == -1 {
                return Ok(Some((Reply::Nil, data_start)));
            }
            if len < 0 {
                return Err(ParseError::Protocol(format!(
                    "invalid bulk string length {}",
                    len
                )));
            }
            let len = len as usize;
            let total = data_start + len + CRLF.len();
            if buf.len() < total {
                return Ok(None);
            }
            if &buf[data_start + len..total] != CRLF {
                return Err(ParseError::Protocol(
                    "bulk string missing trailing CRLF".to_string(),
                ));
            }
            let data = Bytes::copy_from_slice(&buf[data_start..data_start + len]);
            Ok(Some((Reply::Bulk(data), total)))
        }
        other => Err(ParseError::Protocol(format!(
            "unknown reply prefix {:#04x}",
            other
        ))),
    }
}

/// Parses `<prefix><decimal>\r\n` at the start of `buf`, returning the value
/// and the cursor just past the CRLF. The prefix byte is not validated here.
fn parse_prefixed_integer(buf: &[u8]) -> ParseResult<Option<(i64, usize)>> {
    let line_end = match find_crlf(&buf[1..]) {
        Some(pos) => pos,
        None => return Ok(None),
    };

    let digits = std::str::from_utf8(&buf[1..1 + line_end])
        .map_err(|e| ParseError::InvalidUtf8(e.to_string()))?;
    let value: i64 = digits
        .parse()
        .map_err(|_| ParseError::InvalidLength(digits.to_string()))?;

    Ok(Some((value, 1 + line_end + CRLF.len())))
}

/// Finds the position of the first CRLF pair in `buf`.
#[inline]
fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == CRLF)
}
