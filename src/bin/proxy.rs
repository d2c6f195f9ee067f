//! Same-origin credential-injecting gateway for the Campaign Monitor API.
//!
//! Run with `PORT` and `CM_API_BASE_URL` in the environment (or a `.env`
//! file). Logging is controlled by `RUST_LOG`, e.g. `RUST_LOG=debug`.

use std::io;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use hookcache::config::ProxyConfig;
use hookcache::proxy;

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    init_tracing();
    info!("hookcache proxy starting");

    let config = ProxyConfig::from_env();
    proxy::serve(config).await
}
