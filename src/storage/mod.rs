//! Storage Module
//!
//! The persistent heart of EmberKV: a bounded in-memory cache fronting an
//! append-only on-disk log.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      StorageEngine                          │
//! │                                                             │
//! │   ┌──────────┐   pending map    ┌────────────────────────┐  │
//! │   │ LruCache │ ───────────────> │  write-behind worker   │  │
//! │   └──────────┘                  └───────────┬────────────┘  │
//! │        │ miss                               │ append        │
//! │        ▼                                    ▼               │
//! │   ┌─────────────────────────────────────────────────────┐   │
//! │   │   DiskLog: data.dat (log) + index.dat (key→offset)  │   │
//! │   └─────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! - [`cache`]: bounded LRU map, arena-backed recency list
//! - [`disk`]: append-only log plus the persisted index
//! - [`engine`]: composition, size validation, write-behind worker

pub mod cache;
pub mod disk;
pub mod engine;

/// Maximum key length in bytes, enforced on the ingress path.
pub const MAX_KEY_LEN: usize = 256;

/// Maximum value length in bytes, enforced on the ingress path.
pub const MAX_VALUE_LEN: usize = 1024;

pub use cache::{LruCache, PutOutcome};
pub use disk::{DiskError, DiskLog, IndexEntry};
pub use engine::{
    EngineConfig, EngineError, StorageEngine, DEFAULT_CACHE_CAPACITY, DEFAULT_STORAGE_DIR,
};
