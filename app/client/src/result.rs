//! Result streams for finished units.

use bytes::Bytes;
use compact_str::CompactString;
use futures_core::Stream;
use protocol::WorkStatus;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader, ReadBuf};
use tokio::net::unix::OwnedReadHalf;

/// Outcome of a single, non-waiting result probe.
#[derive(Debug)]
pub enum ResultPoll {
    /// The unit has not finished; carries its current status.
    Pending(WorkStatus),
    /// The unit succeeded and its output is ready to read.
    Ready(ResultStream),
}

/// Stdout of one finished unit, read until end of stream.
///
/// Owns the control session it arrived on; dropping it closes the socket.
#[derive(Debug)]
pub struct ResultStream {
    unit_id: CompactString,
    reader: BufReader<OwnedReadHalf>,
}

impl ResultStream {
    pub(crate) fn new(unit_id: impl Into<CompactString>, reader: BufReader<OwnedReadHalf>) -> Self {
        Self {
            unit_id: unit_id.into(),
            reader,
        }
    }

    /// Unit this output belongs to.
    pub fn unit_id(&self) -> &str {
        &self.unit_id
    }

    /// Read the whole output.
    pub async fn read_to_end(mut self) -> io::Result<Vec<u8>> {
        let mut output = Vec::new();
        self.reader.read_to_end(&mut output).await?;
        tracing::debug!("read {} result bytes for unit {}", output.len(), self.unit_id);
        Ok(output)
    }

    /// Yield the output as it arrives, one buffered chunk at a time.
    pub fn into_chunks(self) -> impl Stream<Item = io::Result<Bytes>> {
        let mut reader = self.reader;
        async_stream::try_stream! {
            loop {
                let buf = reader.fill_buf().await?;
                if buf.is_empty() {
                    break;
                }
                let chunk = Bytes::copy_from_slice(buf);
                reader.consume(chunk.len());
                yield chunk;
            }
        }
    }
}

impl AsyncRead for ResultStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().reader).poll_read(cx, buf)
    }
}
