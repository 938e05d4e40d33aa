//! Connection Module
//!
//! Owns everything between an accepted TCP socket and the command layer:
//! per-connection read buffering, incremental frame parsing, reply
//! encoding and the error handling that decides whether a connection
//! survives a failure.
//!
//! The server's accept loop (in `main.rs`) spawns one
//! [`handle_connection`] task per client on the single-threaded runtime,
//! so the whole network path is cooperatively scheduled.

pub mod handler;

pub use handler::{handle_connection, ConnectionError, ConnectionHandler, ConnectionStats};
