//! Result streaming command.

use anyhow::{Context, Result};
use clap::Args;
use client::{Connection, SubmissionHandle};
use futures_util::StreamExt;
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Stream the output of a unit, waiting for it to finish.
#[derive(Args, Debug)]
pub struct Results {
    /// Unit id.
    pub id: String,

    /// Release the unit once its output has been read.
    #[arg(long)]
    pub release: bool,
}

impl Results {
    /// Wait for the unit and copy its output to `out`.
    pub async fn run(
        self,
        conn: &mut Connection,
        out: &mut (impl AsyncWrite + Unpin),
    ) -> Result<()> {
        let handle = SubmissionHandle::new(self.id);
        if self.release {
            return stream_and_release(conn, handle, out).await;
        }
        stream(conn, &handle, out).await
    }
}

/// Copy a unit's output to `out`, then release the unit even if the output
/// could not be read.
pub(crate) async fn stream_and_release(
    conn: &mut Connection,
    handle: SubmissionHandle,
    out: &mut (impl AsyncWrite + Unpin),
) -> Result<()> {
    let streamed = stream(conn, &handle, out).await;
    let id = handle.to_string();
    let released = conn
        .release(handle)
        .await
        .with_context(|| format!("failed to release unit {id}"));
    match (streamed, released) {
        (Err(e), Err(release_err)) => {
            tracing::debug!("release after failed read: {release_err:#}");
            Err(e)
        }
        (streamed, released) => streamed.and(released),
    }
}

/// Copy a unit's output to `out` as it arrives.
pub(crate) async fn stream(
    conn: &mut Connection,
    handle: &SubmissionHandle,
    out: &mut (impl AsyncWrite + Unpin),
) -> Result<()> {
    let stream = conn
        .fetch_result(handle)
        .await
        .with_context(|| format!("no result for unit {handle}"))?;

    let mut chunks = std::pin::pin!(stream.into_chunks());
    let mut total = 0;
    while let Some(chunk) = chunks.next().await {
        let chunk = chunk.with_context(|| format!("reading output of unit {handle}"))?;
        total += chunk.len();
        out.write_all(&chunk).await?;
    }
    out.flush().await?;
    tracing::debug!("wrote {total} bytes of unit {handle}");
    Ok(())
}
