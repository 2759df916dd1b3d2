//! Unix domain socket server: accept loop and per-connection request handler.
//!
//! Each accepted stream carries exactly one control request: greeting,
//! request line, reply, close.

use crate::daemon::Daemon;
use crate::worker::Outcome;
use bytes::Bytes;
use compact_str::CompactString;
use protocol::codec::{self, LineError};
use protocol::{Cancelled, Released, Request, SubmitAck, WorkCommand};
use serde::Serialize;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixListener;
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::oneshot;

/// Accept connections on the given `UnixListener` until shutdown is signalled.
pub async fn accept_loop(
    listener: UnixListener,
    daemon: Daemon,
    mut shutdown: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, _addr)) => {
                        let daemon = daemon.clone();
                        tokio::spawn(async move {
                            handle_connection(stream, daemon).await;
                        });
                    }
                    Err(e) => {
                        tracing::error!("failed to accept connection: {e}");
                    }
                }
            }
            _ = &mut shutdown => {
                tracing::info!("accept loop shutting down");
                break;
            }
        }
    }
}

/// Serve one control session, then close the stream.
async fn handle_connection(stream: tokio::net::UnixStream, daemon: Daemon) {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);

    if let Err(e) = serve_request(&mut reader, &mut writer, &daemon).await {
        tracing::debug!("control session ended early: {e}");
    }
    let _ = writer.shutdown().await;
}

async fn serve_request(
    reader: &mut BufReader<OwnedReadHalf>,
    writer: &mut OwnedWriteHalf,
    daemon: &Daemon,
) -> Result<(), LineError> {
    codec::write_line(writer, &protocol::greeting(&daemon.node_id)).await?;

    let line = match codec::read_line(reader).await {
        Ok(line) => line,
        Err(LineError::ConnectionClosed) => return Ok(()),
        Err(e) => return Err(e),
    };
    let request = match Request::parse(&line) {
        Ok(request) => request,
        Err(e) => return reply_error(writer, &e.to_string()).await,
    };
    tracing::debug!("control request: {:?}", request.work);

    match request.work {
        WorkCommand::Submit { node, worktype } => {
            submit(reader, writer, daemon, node, worktype).await
        }
        WorkCommand::Status { unitid } => match daemon.units.get(&unitid) {
            Some(unit) => reply_json(writer, &unit.status()).await,
            None => reply_error(writer, &protocol::unknown_unit(&unitid)).await,
        },
        WorkCommand::Results { unitid, startpos } => {
            results(writer, daemon, &unitid, startpos).await
        }
        WorkCommand::Release { unitid } => match daemon.units.remove(&unitid) {
            Some(unit) => {
                unit.cancel();
                tracing::info!("released unit {unitid}");
                reply_json(writer, &Released { released: unitid }).await
            }
            None => reply_error(writer, &protocol::unknown_unit(&unitid)).await,
        },
        WorkCommand::Cancel { unitid } => match daemon.units.get(&unitid) {
            Some(unit) => {
                unit.cancel();
                tracing::info!("cancelled unit {unitid}");
                reply_json(writer, &Cancelled { cancelled: unitid }).await
            }
            None => reply_error(writer, &protocol::unknown_unit(&unitid)).await,
        },
        WorkCommand::List => reply_json(writer, &daemon.units.list()).await,
    }
}

async fn submit(
    reader: &mut BufReader<OwnedReadHalf>,
    writer: &mut OwnedWriteHalf,
    daemon: &Daemon,
    node: CompactString,
    worktype: CompactString,
) -> Result<(), LineError> {
    let Some(worker) = daemon.workers.get(&worktype).cloned() else {
        tracing::warn!("rejected submission of unknown work type {worktype}");
        return reply_error(writer, &format!("unknown work type {worktype}")).await;
    };

    let (unit_id, unit) = daemon.units.insert(worktype, node);
    codec::write_line(writer, &protocol::submit_prompt(&unit_id)).await?;

    let mut payload = Vec::new();
    if let Err(e) = reader.read_to_end(&mut payload).await {
        unit.finish(Outcome {
            stdout: Vec::new(),
            failure: Some(format!("failed to read payload: {e}")),
        });
        return Err(e.into());
    }
    tracing::info!(
        "unit {unit_id} ({} on {}) received {} payload bytes",
        unit.work_type,
        unit.node,
        payload.len()
    );

    let task = {
        let unit = Arc::clone(&unit);
        let unit_id = unit_id.clone();
        tokio::spawn(async move {
            unit.start();
            let outcome = worker.run(Bytes::from(payload)).await;
            unit.finish(outcome);
            tracing::debug!("unit {unit_id} finished: {}", unit.status().state);
        })
    };
    unit.set_task(task.abort_handle());

    reply_json(writer, &SubmitAck::started(unit_id)).await
}

async fn results(
    writer: &mut OwnedWriteHalf,
    daemon: &Daemon,
    unit_id: &str,
    startpos: u64,
) -> Result<(), LineError> {
    let Some(unit) = daemon.units.get(unit_id) else {
        return reply_error(writer, &protocol::unknown_unit(unit_id)).await;
    };
    codec::write_line(writer, &protocol::streaming_line(unit_id)).await?;

    let progress = unit.finished().await;
    let start = usize::try_from(startpos)
        .unwrap_or(usize::MAX)
        .min(progress.stdout.len());
    writer.write_all(&progress.stdout[start..]).await?;
    writer.flush().await?;
    Ok(())
}

/// Send a JSON reply document, or an error line when it cannot be encoded.
async fn reply_json<T: Serialize>(
    writer: &mut OwnedWriteHalf,
    reply: &T,
) -> Result<(), LineError> {
    match codec::write_json(writer, reply).await {
        Err(e @ (LineError::TooLong { .. } | LineError::Json(_))) => {
            tracing::warn!("cannot encode reply: {e}");
            reply_error(writer, &format!("cannot encode reply: {e}")).await
        }
        sent => sent,
    }
}

async fn reply_error(writer: &mut OwnedWriteHalf, message: &str) -> Result<(), LineError> {
    codec::write_line(writer, &protocol::error_line(message)).await
}
