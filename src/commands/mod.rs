//! Command Layer
//!
//! Sits between the wire protocol and the storage engine:
//!
//! ```text
//! parsed args ──> CommandHandler ──> StorageEngine ──> Reply
//! ```
//!
//! Dispatch, arity checks and the mapping from engine errors to `-ERR`
//! replies all live in [`handler`].

pub mod handler;

pub use handler::CommandHandler;
