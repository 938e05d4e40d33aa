//! EmberKV Interactive Client
//!
//! A small line-oriented shell: reads commands from stdin, ships each one to
//! the server as an array frame and pretty-prints the typed reply.
//!
//! ```text
//! $ emberkv-cli
//! emberkv> SET name ember
//! OK
//! emberkv> GET name
//! "ember"
//! emberkv> quit
//! ```

use anyhow::Context;
use emberkv::client::{Client, ClientError};
use std::io::Write as _;
use tokio::io::{AsyncBufReadExt, BufReader};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let addr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| format!("{}:{}", emberkv::DEFAULT_HOST, emberkv::DEFAULT_PORT));

    let mut client = Client::connect(&addr)
        .await
        .with_context(|| format!("failed to connect to {}", addr))?;
    println!("Connected to {}. Type 'quit' to leave.", addr);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("emberkv> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break; // stdin closed
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.eq_ignore_ascii_case("quit") {
            break;
        }

        let args: Vec<&[u8]> = line.split_whitespace().map(str::as_bytes).collect();
        match client.command(&args).await {
            Ok(reply) => println!("{}", reply),
            Err(ClientError::Closed) => {
                println!("Server closed the connection.");
                break;
            }
            Err(e) => return Err(e).context("request failed"),
        }
    }

    Ok(())
}
