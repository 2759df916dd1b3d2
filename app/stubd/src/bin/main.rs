//! Stub receptor daemon binary entry point.
//!
//! Loads TOML configuration (first argument, default `stubd.toml`), binds
//! the control socket, and serves until ctrl-c.

use anyhow::Result;
use receptor_stubd::{StubConfig, serve, serve_with_config};
use std::path::PathBuf;
use tokio::signal;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let handle = match std::env::args().nth(1).map(PathBuf::from) {
        Some(path) => serve(&path).await?,
        None => {
            let default = PathBuf::from("stubd.toml");
            if default.exists() {
                serve(&default).await?
            } else {
                tracing::info!("no stubd.toml found, serving the default echo worker");
                serve_with_config(&StubConfig::default()).await?
            }
        }
    };

    shutdown_signal().await;
    handle.shutdown().await?;
    tracing::info!("stub daemon shut down");
    Ok(())
}

/// Wait for ctrl-c signal for graceful shutdown.
async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        tracing::error!("failed to listen for ctrl-c: {e}");
        return;
    }
    tracing::info!("received shutdown signal");
}
