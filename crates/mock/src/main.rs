use std::net::SocketAddr;

use anyhow::{Context, Result};
use apirig_mock::{UserStore, router};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;

/// Serve the in-memory user service.
#[derive(Debug, Parser)]
#[command(name = "apirig-mock", version)]
struct Args {
    /// Port to listen on.
    #[arg(long, env = "PORT", default_value_t = 3000)]
    port: u16,

    /// Address to bind.
    #[arg(long, default_value = "127.0.0.1")]
    host: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();
    let addr: SocketAddr = format!("{}:{}", args.host, args.port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{}", args.host, args.port))?;

    let listener = TcpListener::bind(addr).await.with_context(|| format!("bind {addr}"))?;
    info!(addr = %addr, "mock user service running");
    axum::serve(listener, router(UserStore::default()))
        .await
        .context("serve mock user service")
}

fn init_tracing() {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into());
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
