//! gantryd - Gantry daemon.
//!
//! Serves the command dispatcher over an HTTP RPC mapping; see
//! [`gantryd::api::server`] for the call shape.

use std::sync::Arc;

use clap::Parser;
use gantry::{Engine, EntropyEstimator};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to listen on
    #[arg(long, default_value = "0.0.0.0:4242")]
    listen: std::net::SocketAddr,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let engine = Arc::new(Engine::new(Box::new(EntropyEstimator)));
    let app = gantryd::api::server::app(engine);

    // All registry state is process-lifetime; a failed bind is the one
    // fatal error.
    let listener = tokio::net::TcpListener::bind(args.listen).await?;
    tracing::info!("gantryd listening on {}", args.listen);
    axum::serve(listener, app).await?;

    Ok(())
}
