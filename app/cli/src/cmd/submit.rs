//! Work submission command.

use crate::cmd::results;
use anyhow::{Context, Result};
use clap::Args;
use client::Connection;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Submit a payload as a new unit of work.
#[derive(Args, Debug)]
pub struct Submit {
    /// Work type registered on the target node.
    #[arg(long)]
    pub work_type: String,

    /// Target node.
    #[arg(long, default_value = client::DEFAULT_NODE)]
    pub node: String,

    /// Wait for the unit, stream its output, then release it.
    #[arg(long)]
    pub follow: bool,

    /// Payload file, or `-` for stdin.
    pub payload: PathBuf,
}

impl Submit {
    /// Submit the payload. Prints the unit id, or the unit's output with
    /// `--follow`.
    pub async fn run(
        self,
        conn: &mut Connection,
        out: &mut (impl AsyncWrite + Unpin),
    ) -> Result<()> {
        let payload = read_payload(&self.payload).await?;
        let handle = conn
            .submit(&self.work_type, &payload, &self.node)
            .await
            .with_context(|| format!("failed to submit {} work", self.work_type))?;
        tracing::info!("submitted unit {handle}");

        if !self.follow {
            out.write_all(format!("{handle}\n").as_bytes()).await?;
            out.flush().await?;
            return Ok(());
        }

        results::stream_and_release(conn, handle, out).await
    }
}

async fn read_payload(path: &Path) -> Result<Vec<u8>> {
    if path == Path::new("-") {
        let mut payload = Vec::new();
        tokio::io::stdin()
            .read_to_end(&mut payload)
            .await
            .context("failed to read payload from stdin")?;
        return Ok(payload);
    }
    tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read payload {}", path.display()))
}
