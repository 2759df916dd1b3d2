//! Serve entrypoint shared by the binary and the tests.

use crate::StubConfig;
use crate::daemon::{Daemon, uds};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::sync::oneshot;

/// Handle returned by [`serve`]: the socket path and shutdown trigger.
pub struct ServeHandle {
    /// The Unix domain socket path the daemon is listening on.
    pub socket_path: PathBuf,
    /// Shared state, exposed so callers can inspect submitted units.
    pub daemon: Daemon,
    shutdown_tx: Option<oneshot::Sender<()>>,
    join: Option<tokio::task::JoinHandle<()>>,
}

impl ServeHandle {
    /// Trigger graceful shutdown and wait for the accept loop to stop.
    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(join) = self.join.take() {
            join.await?;
        }
        let _ = std::fs::remove_file(&self.socket_path);
        Ok(())
    }
}

/// Load config from a TOML file, bind the socket, and start serving.
pub async fn serve(config_path: &Path) -> Result<ServeHandle> {
    let config = StubConfig::load(config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;
    tracing::info!("loaded configuration from {}", config_path.display());
    serve_with_config(&config).await
}

/// Serve with an already-loaded config.
pub async fn serve_with_config(config: &StubConfig) -> Result<ServeHandle> {
    let daemon = Daemon::new(config);
    let socket_path = config.socket_path();

    if let Some(parent) = socket_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    // Remove stale socket file if present.
    if socket_path.exists() {
        std::fs::remove_file(&socket_path)
            .with_context(|| format!("failed to remove stale {}", socket_path.display()))?;
    }

    let listener = tokio::net::UnixListener::bind(&socket_path)
        .with_context(|| format!("failed to bind {}", socket_path.display()))?;
    tracing::info!(
        "node {} listening on {} with {} work type(s)",
        daemon.node_id,
        socket_path.display(),
        daemon.workers.len()
    );

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let join = tokio::spawn(uds::accept_loop(listener, daemon.clone(), shutdown_rx));

    Ok(ServeHandle {
        socket_path,
        daemon,
        shutdown_tx: Some(shutdown_tx),
        join: Some(join),
    })
}
