//! Control socket connection to a receptor node.
//!
//! The control service answers one request per socket stream and then
//! closes it. A [`Connection`] keeps the stream opened by `connect` for its
//! first request and dials a fresh, handshaken stream for every later one, so
//! callers see a single long-lived connection. Each stream is owned by the
//! operation that uses it and dropped on every exit path.

use crate::ClientConfig;
use crate::error::{ConnectionError, Error, ResultError, SubmissionError};
use crate::handle::SubmissionHandle;
use crate::result::{ResultPoll, ResultStream};
use compact_str::CompactString;
use protocol::codec::{self, LineError};
use protocol::{
    Cancelled, Released, Reply, Request, SubmitAck, UnitList, WorkCommand, WorkState, WorkStatus,
};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::time::Instant;
use tracing::{Instrument, Span};

/// An established connection to a receptor control socket.
///
/// Not Clone: one connection per caller. Concurrent submissions each use
/// their own connection. Use [`super::ReceptorClient::connect`] to create one.
#[derive(Debug)]
pub struct Connection {
    socket_path: PathBuf,
    node_id: CompactString,
    poll_interval: Duration,
    result_timeout: Option<Duration>,
    span: Span,
    session: Option<Session>,
    closed: bool,
}

/// One handshaken control stream.
#[derive(Debug)]
struct Session {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl Session {
    /// Dial the socket and consume the greeting. Returns the remote node id.
    async fn dial(path: &Path) -> Result<(Self, CompactString), ConnectionError> {
        let stream =
            UnixStream::connect(path)
                .await
                .map_err(|source| ConnectionError::Unreachable {
                    path: path.to_path_buf(),
                    source,
                })?;
        let (reader, writer) = stream.into_split();
        let mut session = Self {
            reader: BufReader::new(reader),
            writer,
        };

        let greeting = match codec::read_line(&mut session.reader).await {
            Ok(line) => line,
            Err(LineError::ConnectionClosed) => {
                return Err(ConnectionError::Handshake(String::new()));
            }
            Err(e) => return Err(e.into()),
        };
        let node_id = protocol::parse_greeting(&greeting)
            .map(CompactString::from)
            .ok_or_else(|| ConnectionError::Handshake(greeting.clone()))?;
        Ok((session, node_id))
    }

    async fn send(&mut self, work: WorkCommand) -> Result<(), ConnectionError> {
        codec::write_json(&mut self.writer, &Request::work(work)).await?;
        Ok(())
    }

    /// Read a protocol line: a prompt, a stream header, or an error.
    async fn reply(&mut self) -> Result<String, ConnectionError> {
        Ok(codec::read_line(&mut self.reader).await?)
    }

    /// Read a JSON reply document, or an error line in its place.
    async fn document(&mut self) -> Result<String, ConnectionError> {
        Ok(codec::read_document(&mut self.reader).await?)
    }
}

impl Connection {
    /// Connect to the control socket named in `config`.
    pub(crate) async fn connect(
        config: &ClientConfig,
        span: Span,
    ) -> Result<Self, ConnectionError> {
        let dial = Session::dial(&config.socket_path);
        let (session, node_id) = dial.instrument(span.clone()).await?;
        span.in_scope(|| {
            tracing::debug!(
                "connected to node {node_id} at {}",
                config.socket_path.display()
            )
        });
        Ok(Self {
            socket_path: config.socket_path.clone(),
            node_id,
            poll_interval: config.poll_interval,
            result_timeout: config.result_timeout,
            span,
            session: Some(session),
            closed: false,
        })
    }

    /// Node id the control service announced.
    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    /// Socket path this connection dials.
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Whether [`Connection::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Submit a payload as one unit of `work_type` on `node`.
    ///
    /// Each call creates a new unit with a new handle, even for identical
    /// inputs.
    pub async fn submit(
        &mut self,
        work_type: &str,
        payload: &[u8],
        node: &str,
    ) -> Result<SubmissionHandle, Error> {
        let span = self.span.clone();
        self.submit_once(work_type, payload, node)
            .instrument(span)
            .await
    }

    /// Query a unit's current status.
    pub async fn status(&mut self, handle: &SubmissionHandle) -> Result<WorkStatus, Error> {
        let span = self.span.clone();
        self.status_of(handle.as_str()).instrument(span).await
    }

    /// Probe once for a result without waiting.
    ///
    /// Returns [`ResultPoll::Pending`] while the unit is still pending or
    /// running.
    pub async fn try_fetch_result(
        &mut self,
        handle: &SubmissionHandle,
    ) -> Result<ResultPoll, Error> {
        let span = self.span.clone();
        self.probe(handle.as_str()).instrument(span).await
    }

    /// Wait until the unit finishes, then return its output stream.
    ///
    /// Polls the unit status at the configured interval. Fails at once for an
    /// unknown handle, with [`ResultError::ExecutionFailed`] for a failed or
    /// canceled unit, and with [`ResultError::TimedOut`] when a result
    /// timeout is configured and exceeded.
    pub async fn fetch_result(&mut self, handle: &SubmissionHandle) -> Result<ResultStream, Error> {
        let span = self.span.clone();
        self.wait_for_result(handle.as_str()).instrument(span).await
    }

    /// Tell the daemon to forget a unit. Consumes the handle.
    pub async fn release(&mut self, handle: SubmissionHandle) -> Result<(), Error> {
        let span = self.span.clone();
        self.release_unit(handle.as_str()).instrument(span).await
    }

    /// Cancel a running unit.
    pub async fn cancel(&mut self, handle: &SubmissionHandle) -> Result<(), Error> {
        let span = self.span.clone();
        self.cancel_unit(handle.as_str()).instrument(span).await
    }

    /// Status of every unit the daemon knows.
    pub async fn list(&mut self) -> Result<UnitList, Error> {
        let span = self.span.clone();
        self.list_units().instrument(span).await
    }

    /// Submit, wait, read the whole output, and release the unit.
    ///
    /// Once the unit exists it is released whether or not its output could
    /// be read; a fetch error wins over a release error.
    pub async fn run(
        &mut self,
        work_type: &str,
        payload: &[u8],
        node: &str,
    ) -> Result<Vec<u8>, Error> {
        let handle = self.submit(work_type, payload, node).await?;
        let output = self.read_output(&handle).await;
        let released = self.release(handle).await;
        match (output, released) {
            (Ok(output), Ok(())) => Ok(output),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), released) => {
                if let Err(release_err) = released {
                    self.span
                        .in_scope(|| tracing::debug!("release after failed fetch: {release_err}"));
                }
                Err(e)
            }
        }
    }

    /// Close the connection. Every later operation fails with
    /// [`ConnectionError::Closed`].
    pub fn close(&mut self) {
        if !self.closed {
            self.span.in_scope(|| {
                tracing::debug!("closing connection to {}", self.socket_path.display())
            });
        }
        self.closed = true;
        self.session = None;
    }

    /// Take the idle stream or dial a new one.
    async fn session(&mut self) -> Result<Session, ConnectionError> {
        if self.closed {
            return Err(ConnectionError::Closed);
        }
        if let Some(session) = self.session.take() {
            return Ok(session);
        }
        let (session, node_id) = Session::dial(&self.socket_path).await?;
        if node_id != self.node_id {
            tracing::warn!("control socket now reports node {node_id}, was {}", self.node_id);
            self.node_id = node_id;
        }
        Ok(session)
    }

    async fn submit_once(
        &mut self,
        work_type: &str,
        payload: &[u8],
        node: &str,
    ) -> Result<SubmissionHandle, Error> {
        let mut session = self.session().await?;
        tracing::debug!("submitting {} bytes of {work_type} work to {node}", payload.len());
        session
            .send(WorkCommand::Submit {
                node: node.into(),
                worktype: work_type.into(),
            })
            .await?;

        let line = session.reply().await?;
        if protocol::parse_submit_prompt(&line).is_none() {
            return Err(rejection(work_type, line).into());
        }

        session
            .writer
            .write_all(payload)
            .await
            .map_err(ConnectionError::Io)?;
        session.writer.shutdown().await.map_err(ConnectionError::Io)?;

        let line = session.document().await?;
        match Reply::<SubmitAck>::parse(&line) {
            Ok(Reply::Ok(ack)) => {
                tracing::info!("submitted unit {} ({work_type} on {node})", ack.unitid);
                Ok(SubmissionHandle::new(ack.unitid))
            }
            Ok(Reply::Error(message)) => Err(SubmissionError::Rejected {
                work_type: work_type.into(),
                message,
            }
            .into()),
            Err(_) => Err(SubmissionError::Malformed(line).into()),
        }
    }

    async fn release_unit(&mut self, id: &str) -> Result<(), Error> {
        let mut session = self.session().await?;
        session.send(WorkCommand::Release { unitid: id.into() }).await?;
        let line = session.document().await?;
        match Reply::<Released>::parse(&line) {
            Ok(Reply::Ok(_)) => {
                tracing::debug!("released unit {id}");
                Ok(())
            }
            Ok(Reply::Error(message)) => Err(ResultError::from_remote(id, message).into()),
            Err(_) => Err(ResultError::Malformed(line).into()),
        }
    }

    async fn cancel_unit(&mut self, id: &str) -> Result<(), Error> {
        let mut session = self.session().await?;
        session.send(WorkCommand::Cancel { unitid: id.into() }).await?;
        let line = session.document().await?;
        match Reply::<Cancelled>::parse(&line) {
            Ok(Reply::Ok(_)) => {
                tracing::info!("cancelled unit {id}");
                Ok(())
            }
            Ok(Reply::Error(message)) => Err(ResultError::from_remote(id, message).into()),
            Err(_) => Err(ResultError::Malformed(line).into()),
        }
    }

    async fn list_units(&mut self) -> Result<UnitList, Error> {
        let mut session = self.session().await?;
        session.send(WorkCommand::List).await?;
        let line = session.document().await?;
        match Reply::<UnitList>::parse(&line) {
            Ok(Reply::Ok(units)) => Ok(units),
            Ok(Reply::Error(message)) => Err(ResultError::Remote(message).into()),
            Err(_) => Err(ResultError::Malformed(line).into()),
        }
    }

    async fn read_output(&mut self, handle: &SubmissionHandle) -> Result<Vec<u8>, Error> {
        let stream = self.fetch_result(handle).await?;
        Ok(stream.read_to_end().await?)
    }

    async fn status_of(&mut self, id: &str) -> Result<WorkStatus, Error> {
        let mut session = self.session().await?;
        session.send(WorkCommand::Status { unitid: id.into() }).await?;
        let line = session.document().await?;
        match Reply::<WorkStatus>::parse(&line) {
            Ok(Reply::Ok(status)) => Ok(status),
            Ok(Reply::Error(message)) => Err(ResultError::from_remote(id, message).into()),
            Err(_) => Err(ResultError::Malformed(line).into()),
        }
    }

    async fn probe(&mut self, id: &str) -> Result<ResultPoll, Error> {
        let status = self.status_of(id).await?;
        match status.state {
            WorkState::Pending | WorkState::Running => Ok(ResultPoll::Pending(status)),
            WorkState::Succeeded => self.open_results(id).await.map(ResultPoll::Ready),
            state @ (WorkState::Failed | WorkState::Canceled) => {
                Err(ResultError::ExecutionFailed {
                    id: id.into(),
                    state,
                    detail: status.detail,
                }
                .into())
            }
        }
    }

    async fn wait_for_result(&mut self, id: &str) -> Result<ResultStream, Error> {
        let started = Instant::now();
        loop {
            match self.probe(id).await? {
                ResultPoll::Ready(stream) => return Ok(stream),
                ResultPoll::Pending(status) => {
                    let waited = started.elapsed();
                    if self.result_timeout.is_some_and(|limit| waited >= limit) {
                        return Err(ResultError::TimedOut {
                            id: id.into(),
                            waited,
                        }
                        .into());
                    }
                    tracing::trace!("unit {id} is {}, polling again", status.state);
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }
    }

    async fn open_results(&mut self, id: &str) -> Result<ResultStream, Error> {
        let mut session = self.session().await?;
        session
            .send(WorkCommand::Results {
                unitid: id.into(),
                startpos: 0,
            })
            .await?;
        let line = session.reply().await?;
        if protocol::parse_streaming(&line).is_some() {
            return Ok(ResultStream::new(id, session.reader));
        }
        match protocol::parse_error(&line).map(str::to_owned) {
            Some(message) => Err(ResultError::from_remote(id, message).into()),
            None => Err(ResultError::Malformed(line).into()),
        }
    }
}

/// Classify a reply that should have been the submit prompt.
fn rejection(work_type: &str, line: String) -> SubmissionError {
    match protocol::parse_error(&line).map(str::to_owned) {
        Some(message) => SubmissionError::Rejected {
            work_type: work_type.into(),
            message,
        },
        None => SubmissionError::Malformed(line),
    }
}
