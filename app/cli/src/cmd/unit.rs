//! Unit management commands: status, release, cancel, list.

use anyhow::{Context, Result};
use client::{Connection, SubmissionHandle};
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Print a unit's status as JSON.
pub async fn status(
    conn: &mut Connection,
    id: &str,
    out: &mut (impl AsyncWrite + Unpin),
) -> Result<()> {
    let status = conn
        .status(&SubmissionHandle::new(id))
        .await
        .with_context(|| format!("failed to query unit {id}"))?;
    write_json(out, &status).await
}

/// Release a unit.
pub async fn release(
    conn: &mut Connection,
    id: &str,
    out: &mut (impl AsyncWrite + Unpin),
) -> Result<()> {
    conn.release(SubmissionHandle::new(id))
        .await
        .with_context(|| format!("failed to release unit {id}"))?;
    writeln(out, &format!("released {id}")).await
}

/// Cancel a unit.
pub async fn cancel(
    conn: &mut Connection,
    id: &str,
    out: &mut (impl AsyncWrite + Unpin),
) -> Result<()> {
    conn.cancel(&SubmissionHandle::new(id))
        .await
        .with_context(|| format!("failed to cancel unit {id}"))?;
    writeln(out, &format!("cancelled {id}")).await
}

/// Print every unit's status as a JSON object keyed by unit id.
pub async fn list(conn: &mut Connection, out: &mut (impl AsyncWrite + Unpin)) -> Result<()> {
    let units = conn.list().await.context("failed to list units")?;
    write_json(out, &units).await
}

async fn write_json(
    out: &mut (impl AsyncWrite + Unpin),
    value: &impl serde::Serialize,
) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    writeln(out, &json).await
}

async fn writeln(out: &mut (impl AsyncWrite + Unpin), line: &str) -> Result<()> {
    out.write_all(line.as_bytes()).await?;
    out.write_all(b"\n").await?;
    out.flush().await?;
    Ok(())
}
