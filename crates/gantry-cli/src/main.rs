//! gantry - client for the Gantry daemon.
//!
//! Sends one command to a running `gantryd` using the RPC mapping (final
//! path segment + repeated `q` query parameters) and streams the plain-text
//! response to stdout as it arrives.

use clap::Parser;
use color_eyre::eyre::Result;
use futures::StreamExt;
use tokio::io::AsyncWriteExt;

/// Gantry - client for the Gantry daemon
#[derive(Parser, Debug)]
#[command(name = "gantry")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Base URL of the daemon
    #[arg(long, env = "GANTRY_HOST", default_value = "http://127.0.0.1:4242")]
    host: String,

    /// Command to invoke, followed by its arguments
    #[arg(value_name = "COMMAND", trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Args::parse();

    let command = args.command.first().cloned().unwrap_or_default();
    let command_args = args.command.get(1..).unwrap_or_default();
    let url = format!("{}/{}", args.host.trim_end_matches('/'), command);
    let query: Vec<(&str, &String)> = command_args.iter().map(|arg| ("q", arg)).collect();

    let response = reqwest::Client::new()
        .get(&url)
        .query(&query)
        .send()
        .await?;

    let mut stdout = tokio::io::stdout();
    let mut body = response.bytes_stream();
    while let Some(chunk) = body.next().await {
        stdout.write_all(&chunk?).await?;
        stdout.flush().await?;
    }

    Ok(())
}
