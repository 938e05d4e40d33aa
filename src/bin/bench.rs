//! EmberKV Benchmark Harness
//!
//! Measures server throughput over real sockets:
//!
//! ```text
//! $ emberkv-bench <num_operations> <num_connections> [addr]
//! ```
//!
//! The operation count is split evenly across the connections. Phase one
//! issues SETs, phase two reads every key back and verifies the value; each
//! phase reports aggregate operations per second.

use anyhow::{bail, Context};
use emberkv::client::Client;
use emberkv::protocol::Reply;
use std::time::Instant;

struct BenchConfig {
    num_operations: usize,
    num_connections: usize,
    addr: String,
}

fn parse_args() -> anyhow::Result<BenchConfig> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 3 {
        bail!("usage: emberkv-bench <num_operations> <num_connections> [addr]");
    }

    let num_operations: usize = args[1]
        .parse()
        .context("num_operations must be a positive integer")?;
    let num_connections: usize = args[2]
        .parse()
        .context("num_connections must be a positive integer")?;
    if num_operations == 0 || num_connections == 0 {
        bail!("num_operations and num_connections must be at least 1");
    }

    let addr = args
        .get(3)
        .cloned()
        .unwrap_or_else(|| format!("{}:{}", emberkv::DEFAULT_HOST, emberkv::DEFAULT_PORT));

    Ok(BenchConfig {
        num_operations,
        num_connections,
        addr,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = parse_args()?;
    let ops_per_conn = config.num_operations / config.num_connections;
    let total_ops = ops_per_conn * config.num_connections;

    // Fail fast if the server is not there.
    let mut probe = Client::connect(&config.addr)
        .await
        .with_context(|| format!("failed to connect to {}", config.addr))?;
    match probe.ping().await? {
        Reply::Simple(s) if s == "PONG" => {}
        other => bail!("unexpected PING reply: {}", other),
    }

    println!(
        "Benchmarking {} with {} operations across {} connections",
        config.addr, total_ops, config.num_connections
    );

    let set_rate = run_phase(&config, ops_per_conn, Phase::Set).await?;
    println!("SET: {:.0} ops/sec", set_rate);

    let get_rate = run_phase(&config, ops_per_conn, Phase::Get).await?;
    println!("GET: {:.0} ops/sec", get_rate);

    Ok(())
}

#[derive(Clone, Copy, PartialEq)]
enum Phase {
    Set,
    Get,
}

/// Runs one phase across all connections and returns aggregate ops/sec.
async fn run_phase(
    config: &BenchConfig,
    ops_per_conn: usize,
    phase: Phase,
) -> anyhow::Result<f64> {
    let start = Instant::now();

    let mut handles = Vec::with_capacity(config.num_connections);
    for conn in 0..config.num_connections {
        let addr = config.addr.clone();
        handles.push(tokio::spawn(async move {
            run_connection(&addr, conn, ops_per_conn, phase).await
        }));
    }
    for handle in handles {
        handle.await.context("benchmark task panicked")??;
    }

    let elapsed = start.elapsed();
    let total_ops = ops_per_conn * config.num_connections;
    Ok(total_ops as f64 / elapsed.as_secs_f64())
}

async fn run_connection(
    addr: &str,
    conn: usize,
    ops: usize,
    phase: Phase,
) -> anyhow::Result<()> {
    let mut client = Client::connect(addr).await?;

    for i in 0..ops {
        let key = format!("key:{}:{}", conn, i);
        let value = format!("value:{}:{}", conn, i);

        match phase {
            Phase::Set => {
                let reply = client.set(key.as_bytes(), value.as_bytes()).await?;
                if !matches!(&reply, Reply::Simple(s) if s == "OK") {
                    bail!("SET {} failed: {}", key, reply);
                }
            }
            Phase::Get => {
                let reply = client.get(key.as_bytes()).await?;
                match reply {
                    Reply::Bulk(data) if data == value.as_bytes() => {}
                    other => bail!("GET {} returned {}", key, other),
                }
            }
        }
    }

    Ok(())
}
