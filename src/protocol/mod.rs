//! Wire Protocol Module
//!
//! EmberKV speaks a line-oriented, length-prefixed binary framing compatible
//! with the Redis serialization protocol (RESP):
//!
//! ```text
//! Request:  *2\r\n$3\r\nGET\r\n$3\r\nfoo\r\n
//! Replies:  +OK\r\n   -ERR ...\r\n   :1\r\n   $3\r\nbar\r\n   $-1\r\n
//! ```
//!
//! The split of responsibilities:
//!
//! - [`types`]: the [`Reply`] enum and its byte-exact encoding
//! - [`parser`]: incremental request and reply parsers that tolerate frames
//!   arriving split across arbitrarily many reads

pub mod parser;
pub mod types;

pub use parser::{parse_reply, ParseError, RequestParser, MAX_BULK_LEN, MAX_REQUEST_ARGS};
pub use types::{Reply, CRLF};
