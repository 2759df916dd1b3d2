//! Newline-delimited framing for the control socket.
//!
//! Control lines are UTF-8 text terminated by `\n` (a trailing `\r` is
//! tolerated). Payloads and result streams are raw bytes outside this codec.
//!
//! Protocol lines (greeting, request, prompt, stream header) are capped at
//! [`MAX_LINE_SIZE`]. JSON reply documents such as a `work list` answer are
//! capped at [`MAX_DOCUMENT_SIZE`].

use serde::Serialize;
use std::io;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Maximum protocol line size: 64 KiB.
pub const MAX_LINE_SIZE: usize = 64 * 1024;

/// Maximum JSON document line size: 16 MiB.
pub const MAX_DOCUMENT_SIZE: usize = 16 * 1024 * 1024;

/// Errors that can occur during line read/write.
#[derive(Debug)]
pub enum LineError {
    /// Underlying I/O error.
    Io(io::Error),
    /// Line exceeds the maximum allowed size.
    TooLong { size: usize, limit: usize },
    /// Line is not valid UTF-8.
    Utf8(std::string::FromUtf8Error),
    /// JSON serialization error.
    Json(serde_json::Error),
    /// The connection was closed before a line arrived.
    ConnectionClosed,
}

impl std::fmt::Display for LineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "io error: {e}"),
            Self::TooLong { size, limit } => {
                write!(f, "line too long: {size} bytes (max {limit})")
            }
            Self::Utf8(e) => write!(f, "invalid utf-8: {e}"),
            Self::Json(e) => write!(f, "json error: {e}"),
            Self::ConnectionClosed => write!(f, "connection closed"),
        }
    }
}

impl std::error::Error for LineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Utf8(e) => Some(e),
            Self::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for LineError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_json::Error> for LineError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}

/// Read one protocol line, without its terminator.
///
/// A final line missing its `\n` is returned as-is; EOF before any byte is
/// [`LineError::ConnectionClosed`].
pub async fn read_line<R>(reader: &mut R) -> Result<String, LineError>
where
    R: AsyncBufRead + Unpin,
{
    read_limited(reader, MAX_LINE_SIZE).await
}

/// Read one reply line that may carry a JSON document.
pub async fn read_document<R>(reader: &mut R) -> Result<String, LineError>
where
    R: AsyncBufRead + Unpin,
{
    read_limited(reader, MAX_DOCUMENT_SIZE).await
}

async fn read_limited<R>(reader: &mut R, limit: usize) -> Result<String, LineError>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    let read = (&mut *reader)
        .take(limit as u64 + 1)
        .read_until(b'\n', &mut buf)
        .await?;
    if read == 0 {
        return Err(LineError::ConnectionClosed);
    }

    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    } else if buf.len() > limit {
        return Err(LineError::TooLong {
            size: buf.len(),
            limit,
        });
    }

    String::from_utf8(buf).map_err(LineError::Utf8)
}

/// Write one protocol line and flush.
pub async fn write_line<W>(writer: &mut W, line: &str) -> Result<(), LineError>
where
    W: AsyncWrite + Unpin,
{
    write_limited(writer, line, MAX_LINE_SIZE).await
}

/// Serialize a value as a single JSON document line.
///
/// Nothing is written when the value does not serialize or exceeds
/// [`MAX_DOCUMENT_SIZE`].
pub async fn write_json<W, T>(writer: &mut W, msg: &T) -> Result<(), LineError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let line = serde_json::to_string(msg)?;
    write_limited(writer, &line, MAX_DOCUMENT_SIZE).await
}

async fn write_limited<W>(writer: &mut W, line: &str, limit: usize) -> Result<(), LineError>
where
    W: AsyncWrite + Unpin,
{
    if line.len() > limit {
        return Err(LineError::TooLong {
            size: line.len(),
            limit,
        });
    }
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}
