//! EmberKV Server
//!
//! The server binary: parses configuration, opens the storage engine, binds
//! the listener and multiplexes every client on a single-threaded runtime.
//! `SIGINT`, `SIGTERM` and the `EXIT` command all end in the same place: the
//! accept loop stops, the write-behind queue is drained, the process exits 0.

use anyhow::Context;
use emberkv::commands::CommandHandler;
use emberkv::connection::{handle_connection, ConnectionStats};
use emberkv::storage::{EngineConfig, StorageEngine, DEFAULT_CACHE_CAPACITY, DEFAULT_STORAGE_DIR};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpSocket};
use tokio::signal;
use tokio::signal::unix::{signal as unix_signal, SignalKind};
use tokio::sync::watch;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

/// Listen backlog for the server socket.
const LISTEN_BACKLOG: u32 = 128;

/// Send buffer size requested for the server socket; accepted sockets
/// inherit it.
const SEND_BUFFER_SIZE: u32 = 64 * 1024;

/// Server configuration.
struct Config {
    host: String,
    port: u16,
    dir: PathBuf,
    cache_capacity: usize,
    legacy_empty_nil: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: emberkv::DEFAULT_HOST.to_string(),
            port: emberkv::DEFAULT_PORT,
            dir: PathBuf::from(DEFAULT_STORAGE_DIR),
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            legacy_empty_nil: false,
        }
    }
}

impl Config {
    /// Parses configuration from command-line arguments.
    fn from_args() -> Self {
        let mut config = Config::default();
        let args: Vec<String> = std::env::args().collect();

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--host" | "-h" => {
                    config.host = take_value(&args, &mut i, "--host");
                }
                "--port" | "-p" => {
                    config.port = take_value(&args, &mut i, "--port")
                        .parse()
                        .unwrap_or_else(|_| {
                            eprintln!("Error: invalid port number");
                            std::process::exit(1);
                        });
                }
                "--dir" | "-d" => {
                    config.dir = PathBuf::from(take_value(&args, &mut i, "--dir"));
                }
                "--cache-capacity" => {
                    config.cache_capacity = take_value(&args, &mut i, "--cache-capacity")
                        .parse()
                        .unwrap_or_else(|_| {
                            eprintln!("Error: invalid cache capacity");
                            std::process::exit(1);
                        });
                }
                "--legacy-empty-nil" => {
                    config.legacy_empty_nil = true;
                    i += 1;
                }
                "--help" => {
                    print_help();
                    std::process::exit(0);
                }
                "--version" | "-v" => {
                    println!("EmberKV version {}", emberkv::VERSION);
                    std::process::exit(0);
                }
                other => {
                    eprintln!("Unknown argument: {}", other);
                    print_help();
                    std::process::exit(1);
                }
            }
        }

        config
    }

    fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Consumes the value following a flag, advancing the cursor past both.
fn take_value(args: &[String], i: &mut usize, flag: &str) -> String {
    if *i + 1 >= args.len() {
        eprintln!("Error: {} requires a value", flag);
        std::process::exit(1);
    }
    let value = args[*i + 1].clone();
    *i += 2;
    value
}

fn print_help() {
    println!(
        r#"
EmberKV - A Persistent Key-Value Store

USAGE:
    emberkv [OPTIONS]

OPTIONS:
    -h, --host <HOST>          Host to bind to (default: 127.0.0.1)
    -p, --port <PORT>          Port to listen on (default: 9001)
    -d, --dir <DIR>            Storage directory (default: disk_storage)
        --cache-capacity <N>   Max entries held in memory (default: 1000000)
        --legacy-empty-nil     Report empty values as nil instead of $0
    -v, --version              Print version information
        --help                 Print this help message

CONNECTING:
    Any Redis client works:
    $ redis-cli -p 9001
    127.0.0.1:9001> SET name ember
    OK
    127.0.0.1:9001> GET name
    "ember"
"#
    );
}

fn print_banner(config: &Config) {
    println!(
        r#"
EmberKV v{} - persistent key-value store
────────────────────────────────────────
Listening on {}
Storage directory: {}
Use Ctrl+C or the EXIT command to shut down gracefully.
"#,
        emberkv::VERSION,
        config.bind_address(),
        config.dir.display(),
    );
}

fn main() -> anyhow::Result<()> {
    let config = Config::from_args();

    // All network I/O and command dispatch share one cooperative thread;
    // only the write-behind worker runs elsewhere.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build runtime")?;

    runtime.block_on(run(config))
}

async fn run(config: Config) -> anyhow::Result<()> {
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .init();

    print_banner(&config);

    let engine = Arc::new(
        StorageEngine::open(EngineConfig {
            dir: config.dir.clone(),
            cache_capacity: config.cache_capacity,
        })
        .with_context(|| format!("failed to open storage in {}", config.dir.display()))?,
    );
    info!(
        keys = engine.len(),
        cached = engine.cache_len(),
        "storage engine ready"
    );

    let listener = bind_listener(&config).await?;
    info!("listening on {}", config.bind_address());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let commands = CommandHandler::new(Arc::clone(&engine), shutdown_tx)
        .with_legacy_empty_nil(config.legacy_empty_nil);
    let stats = Arc::new(ConnectionStats::new());

    let mut sigterm =
        unix_signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;

    tokio::select! {
        _ = accept_loop(listener, commands, stats, shutdown_rx) => {}
        _ = signal::ctrl_c() => info!("SIGINT received, shutting down"),
        _ = sigterm.recv() => info!("SIGTERM received, shutting down"),
    }

    // Connection tasks die with the runtime; the engine drains its queue
    // synchronously before we return.
    info!("draining pending writes");
    engine.shutdown();
    info!("server shutdown complete");

    Ok(())
}

async fn bind_listener(config: &Config) -> anyhow::Result<TcpListener> {
    let addr: SocketAddr = config
        .bind_address()
        .parse()
        .with_context(|| format!("invalid bind address {}", config.bind_address()))?;

    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()
    } else {
        TcpSocket::new_v6()
    }
    .context("failed to create socket")?;

    socket.set_reuseaddr(true)?;
    if let Err(e) = socket.set_send_buffer_size(SEND_BUFFER_SIZE) {
        warn!(error = %e, "failed to set send buffer size");
    }
    socket
        .bind(addr)
        .with_context(|| format!("failed to bind {}", addr))?;

    socket
        .listen(LISTEN_BACKLOG)
        .context("failed to listen")
}

/// Accepts connections until the shutdown flag flips.
async fn accept_loop(
    listener: TcpListener,
    commands: CommandHandler,
    stats: Arc<ConnectionStats>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            result = listener.accept() => match result {
                Ok((stream, addr)) => {
                    if let Err(e) = stream.set_nodelay(true) {
                        warn!(client = %addr, error = %e, "failed to set TCP_NODELAY");
                    }
                    let commands = commands.clone();
                    let stats = Arc::clone(&stats);
                    tokio::spawn(handle_connection(stream, addr, commands, stats));
                }
                Err(e) => {
                    error!(error = %e, "failed to accept connection");
                }
            },
            _ = shutdown_rx.changed() => {
                info!("shutdown requested, no longer accepting connections");
                return;
            }
        }
    }
}
