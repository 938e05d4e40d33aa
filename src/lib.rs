//! # EmberKV - A Persistent Key-Value Store
//!
//! EmberKV is a single-node key-value database speaking the Redis wire
//! protocol. Values survive restarts: every write lands in an append-only
//! on-disk log behind a bounded in-memory LRU cache.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                            EmberKV                               │
//! │                                                                  │
//! │  ┌────────────┐   ┌─────────────┐   ┌──────────────┐             │
//! │  │ TCP accept │──>│ Connection  │──>│   Command    │             │
//! │  │  (main.rs) │   │   Handler   │   │   Handler    │             │
//! │  └────────────┘   └─────────────┘   └──────┬───────┘             │
//! │        all on one cooperative runtime      │                     │
//! │                                            ▼                     │
//! │  ┌────────────┐   ┌──────────────────────────────────────────┐   │
//! │  │  Request/  │   │              StorageEngine               │   │
//! │  │   Reply    │   │  ┌──────────┐  pending   ┌────────────┐  │   │
//! │  │  parsers   │   │  │ LruCache │──── map ──>│  DiskLog   │  │   │
//! │  └────────────┘   │  └──────────┘            └────────────┘  │   │
//! │                   └──────────────────────▲───────────────────┘   │
//! │                                          │ append                │
//! │                          ┌───────────────┴──────────────┐        │
//! │                          │     write-behind worker      │        │
//! │                          │      (dedicated thread)      │        │
//! │                          └──────────────────────────────┘        │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design highlights
//!
//! - **Single-threaded event loop**: all network I/O and command dispatch
//!   run cooperatively on a current-thread tokio runtime; nothing on the hot
//!   path blocks on the disk.
//! - **Write-behind persistence**: SET is acknowledged once memory holds the
//!   value; a dedicated worker thread drains the write queue into the log.
//!   `EXIT` or a signal drains the queue before the process ends.
//! - **Bounded memory**: the cache holds at most its configured capacity;
//!   evicted keys fall through to the log on GET.
//! - **Incremental parsing**: requests split across arbitrarily many reads
//!   are reassembled per connection, and pipelined requests are answered in
//!   order.
//!
//! ## Supported commands
//!
//! `PING`, `SET key value`, `GET key`, `DEL key`,
//! `FLUSHALL` / `FLUSHDB` / `CLEAR`, `EXIT`.
//!
//! ## Module overview
//!
//! - [`protocol`]: wire framing - reply types and incremental parsers
//! - [`commands`]: dispatch and validation
//! - [`connection`]: per-client buffering and the read-execute-reply loop
//! - [`storage`]: LRU cache, disk log + index, the unified engine
//! - [`client`]: a minimal async client for tooling and tests

pub mod client;
pub mod commands;
pub mod connection;
pub mod protocol;
pub mod storage;

pub use client::{Client, ClientError};
pub use commands::CommandHandler;
pub use connection::{handle_connection, ConnectionError, ConnectionStats};
pub use protocol::{ParseError, Reply, RequestParser};
pub use storage::{EngineConfig, EngineError, StorageEngine};

/// The default port EmberKV listens on.
pub const DEFAULT_PORT: u16 = 9001;

/// The default host EmberKV binds to.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Version of EmberKV.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
