//! Command Execution
//!
//! Takes the argument vectors produced by the request parser, validates
//! arity and sizes, runs the operation against the storage engine and
//! produces the typed reply. Every failure a client can cause comes back as
//! an `-ERR ...` reply; the connection itself stays healthy.
//!
//! ## Supported commands
//!
//! | Command                       | Reply                          |
//! |-------------------------------|--------------------------------|
//! | `PING`                        | `+PONG`                        |
//! | `SET key value`               | `+OK`                          |
//! | `GET key`                     | bulk value, `$0` empty, or nil |
//! | `DEL key`                     | `:1` removed, `:0` absent      |
//! | `FLUSHALL` / `FLUSHDB` / `CLEAR` | `+OK`                       |
//! | `EXIT`                        | `+OK`, then graceful shutdown  |
//!
//! Command names are case-insensitive ASCII.

use bytes::Bytes;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};

use crate::protocol::Reply;
use crate::storage::StorageEngine;

/// Executes parsed commands against the storage engine.
///
/// Cheap to clone; one is handed to every connection task.
#[derive(Clone)]
pub struct CommandHandler {
    engine: Arc<StorageEngine>,
    /// Flipping this to true asks the server to shut down gracefully.
    shutdown: Arc<watch::Sender<bool>>,
    /// Bug-compatibility switch: report empty values as nil, the way the
    /// pre-rewrite server did, instead of `$0\r\n\r\n`.
    legacy_empty_nil: bool,
}

impl CommandHandler {
    pub fn new(engine: Arc<StorageEngine>, shutdown: watch::Sender<bool>) -> Self {
        Self {
            engine,
            shutdown: Arc::new(shutdown),
            legacy_empty_nil: false,
        }
    }

    /// Enables nil replies for empty values (legacy behavior).
    pub fn with_legacy_empty_nil(mut self, enabled: bool) -> Self {
        self.legacy_empty_nil = enabled;
        self
    }

    /// Executes one command. Element 0 is the command name.
    pub fn execute(&self, args: Vec<Bytes>) -> Reply {
        let Some(name) = args.first() else {
            return Reply::error("ERR empty command");
        };
        let Ok(name) = std::str::from_utf8(name) else {
            return Reply::error("ERR invalid command name");
        };

        match name.to_ascii_uppercase().as_str() {
            "PING" => self.cmd_ping(&args[1..]),
            "SET" => self.cmd_set(&args[1..]),
            "GET" => self.cmd_get(&args[1..]),
            "DEL" => self.cmd_del(&args[1..]),
            "FLUSHALL" | "FLUSHDB" | "CLEAR" => self.cmd_flush(&args[1..]),
            "EXIT" => self.cmd_exit(&args[1..]),
            _ => Reply::error(format!("ERR unknown command '{}'", name)),
        }
    }

    fn cmd_ping(&self, args: &[Bytes]) -> Reply {
        if !args.is_empty() {
            return wrong_arity("ping");
        }
        Reply::pong()
    }

    fn cmd_set(&self, args: &[Bytes]) -> Reply {
        let [key, value] = args else {
            return wrong_arity("set");
        };
        match self.engine.put(key.clone(), value.clone()) {
            Ok(()) => Reply::ok(),
            Err(e) => Reply::error(format!("ERR {}", e)),
        }
    }

    fn cmd_get(&self, args: &[Bytes]) -> Reply {
        let [key] = args else {
            return wrong_arity("get");
        };
        match self.engine.get(key) {
            Some(value) if value.is_empty() && self.legacy_empty_nil => Reply::Nil,
            Some(value) => Reply::Bulk(value),
            None => Reply::Nil,
        }
    }

    fn cmd_del(&self, args: &[Bytes]) -> Reply {
        let [key] = args else {
            return wrong_arity("del");
        };
        match self.engine.del(key) {
            Ok(true) => Reply::Integer(1),
            Ok(false) => Reply::Integer(0),
            Err(e) => {
                error!(error = %e, "DEL failed");
                Reply::error(format!("ERR {}", e))
            }
        }
    }

    fn cmd_flush(&self, args: &[Bytes]) -> Reply {
        if !args.is_empty() {
            return wrong_arity("flushall");
        }
        match self.engine.clear() {
            Ok(()) => Reply::ok(),
            Err(e) => {
                error!(error = %e, "FLUSH failed");
                Reply::error(format!("ERR {}", e))
            }
        }
    }

    fn cmd_exit(&self, args: &[Bytes]) -> Reply {
        if !args.is_empty() {
            return wrong_arity("exit");
        }
        info!("EXIT received, requesting graceful shutdown");
        let _ = self.shutdown.send(true);
        Reply::ok()
    }
}

fn wrong_arity(cmd: &str) -> Reply {
    Reply::error(format!(
        "ERR wrong number of arguments for '{}' command",
        cmd
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{EngineConfig, MAX_KEY_LEN, MAX_VALUE_LEN};
    use tempfile::TempDir;

    fn handler() -> (CommandHandler, watch::Receiver<bool>, TempDir) {
        let dir = TempDir::new().unwrap();
        let engine = StorageEngine::open(EngineConfig {
            dir: dir.path().to_path_buf(),
            cache_capacity: 16,
        })
        .unwrap();
        let (tx, rx) = watch::channel(false);
        (CommandHandler::new(Arc::new(engine), tx), rx, dir)
    }

    fn cmd(parts: &[&str]) -> Vec<Bytes> {
        parts
            .iter()
            .map(|p| Bytes::copy_from_slice(p.as_bytes()))
            .collect()
    }

    #[test]
    fn ping() {
        let (handler, _rx, _dir) = handler();
        assert_eq!(handler.execute(cmd(&["PING"])), Reply::pong());
        assert_eq!(handler.execute(cmd(&["ping"])), Reply::pong());
    }

    #[test]
    fn set_get_del_flow() {
        let (handler, _rx, _dir) = handler();

        assert_eq!(handler.execute(cmd(&["SET", "foo", "bar"])), Reply::ok());
        assert_eq!(
            handler.execute(cmd(&["GET", "foo"])),
            Reply::bulk("bar")
        );
        assert_eq!(handler.execute(cmd(&["DEL", "foo"])), Reply::Integer(1));
        assert_eq!(handler.execute(cmd(&["DEL", "foo"])), Reply::Integer(0));
        assert_eq!(handler.execute(cmd(&["GET", "foo"])), Reply::Nil);
    }

    #[test]
    fn get_missing_is_nil() {
        let (handler, _rx, _dir) = handler();
        assert_eq!(handler.execute(cmd(&["GET", "nope"])), Reply::Nil);
    }

    #[test]
    fn empty_value_is_zero_length_bulk() {
        let (handler, _rx, _dir) = handler();
        handler.execute(cmd(&["SET", "k", ""]));
        assert_eq!(handler.execute(cmd(&["GET", "k"])), Reply::bulk(""));
    }

    #[test]
    fn legacy_mode_reports_empty_as_nil() {
        let (handler, _rx, _dir) = handler();
        let handler = handler.with_legacy_empty_nil(true);
        handler.execute(cmd(&["SET", "k", ""]));
        assert_eq!(handler.execute(cmd(&["GET", "k"])), Reply::Nil);
    }

    #[test]
    fn arity_errors() {
        let (handler, _rx, _dir) = handler();
        assert_eq!(
            handler.execute(cmd(&["SET", "only-key"])),
            Reply::error("ERR wrong number of arguments for 'set' command")
        );
        assert_eq!(
            handler.execute(cmd(&["GET"])),
            Reply::error("ERR wrong number of arguments for 'get' command")
        );
        assert_eq!(
            handler.execute(cmd(&["DEL", "a", "b"])),
            Reply::error("ERR wrong number of arguments for 'del' command")
        );
        assert_eq!(
            handler.execute(cmd(&["PING", "extra"])),
            Reply::error("ERR wrong number of arguments for 'ping' command")
        );
    }

    #[test]
    fn size_limits_are_err_replies() {
        let (handler, _rx, _dir) = handler();

        let long_key = "k".repeat(MAX_KEY_LEN + 1);
        let reply = handler.execute(cmd(&["SET", &long_key, "v"]));
        assert!(reply.is_error(), "got {:?}", reply);

        let long_value = "v".repeat(MAX_VALUE_LEN + 1);
        let reply = handler.execute(cmd(&["SET", "k", &long_value]));
        assert!(reply.is_error(), "got {:?}", reply);

        // Boundary sizes are accepted.
        let max_key = "k".repeat(MAX_KEY_LEN);
        let max_value = "v".repeat(MAX_VALUE_LEN);
        assert_eq!(
            handler.execute(cmd(&["SET", &max_key, &max_value])),
            Reply::ok()
        );
    }

    #[test]
    fn flush_aliases_clear_the_store() {
        let (handler, _rx, _dir) = handler();
        for alias in ["FLUSHALL", "FLUSHDB", "CLEAR"] {
            handler.execute(cmd(&["SET", "k", "v"]));
            assert_eq!(handler.execute(cmd(&[alias])), Reply::ok());
            assert_eq!(handler.execute(cmd(&["GET", "k"])), Reply::Nil);
        }
    }

    #[test]
    fn exit_flips_the_shutdown_flag() {
        let (handler, rx, _dir) = handler();
        assert!(!*rx.borrow());
        assert_eq!(handler.execute(cmd(&["EXIT"])), Reply::ok());
        assert!(*rx.borrow());
    }

    #[test]
    fn unknown_command_keeps_original_case() {
        let (handler, _rx, _dir) = handler();
        assert_eq!(
            handler.execute(cmd(&["FrobNicate"])),
            Reply::error("ERR unknown command 'FrobNicate'")
        );
    }

    #[test]
    fn empty_command_is_an_error() {
        let (handler, _rx, _dir) = handler();
        assert_eq!(handler.execute(vec![]), Reply::error("ERR empty command"));
    }
}
