//! Client error taxonomy.
//!
//! Every operation returns [`Error`], which keeps the three failure classes
//! apart: the endpoint could not be used, the daemon refused the work, or the
//! result could not be produced.

use compact_str::CompactString;
use protocol::WorkState;
use protocol::codec::LineError;
use std::path::PathBuf;
use std::time::Duration;

/// Any failure from a client operation.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The control endpoint could not be used.
    #[error(transparent)]
    Connection(#[from] ConnectionError),
    /// The daemon rejected a submission.
    #[error(transparent)]
    Submission(#[from] SubmissionError),
    /// A result could not be fetched.
    #[error(transparent)]
    Result(#[from] ResultError),
}

/// The control endpoint is unreachable or the session broke.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// The socket is missing, refused the connection, or denied access.
    #[error("cannot reach control socket {}: {source}", .path.display())]
    Unreachable {
        /// Socket path that was dialled.
        path: PathBuf,
        /// Underlying connect error.
        source: std::io::Error,
    },
    /// The peer did not greet like a receptor control service.
    #[error("not a receptor control socket, greeting was {0:?}")]
    Handshake(String),
    /// The connection was closed by the caller.
    #[error("connection is closed")]
    Closed,
    /// I/O failure on an established session.
    #[error("control session io error: {0}")]
    Io(#[from] std::io::Error),
    /// A control line could not be read or written.
    #[error("control session line error: {0}")]
    Line(#[from] LineError),
}

/// The daemon refused a unit of work.
#[derive(Debug, thiserror::Error)]
pub enum SubmissionError {
    /// Explicit rejection: unknown work type, unreachable node, bad payload.
    #[error("daemon rejected {work_type} work: {message}")]
    Rejected {
        /// Work type of the rejected submission.
        work_type: CompactString,
        /// Daemon's error message.
        message: String,
    },
    /// The daemon answered with something other than a submit reply.
    #[error("unexpected submit reply: {0:?}")]
    Malformed(String),
}

/// A result could not be produced for a handle.
#[derive(Debug, thiserror::Error)]
pub enum ResultError {
    /// The daemon does not know this handle.
    #[error("unknown work unit {0}")]
    UnknownHandle(CompactString),
    /// The unit ran and failed, or was canceled.
    #[error("work unit {id} {state}: {detail}")]
    ExecutionFailed {
        /// Unit id.
        id: CompactString,
        /// Terminal state, `Failed` or `Canceled`.
        state: WorkState,
        /// Daemon-reported detail.
        detail: String,
    },
    /// The unit did not finish within the configured result timeout.
    #[error("work unit {id} not finished after {waited:?}")]
    TimedOut {
        /// Unit id.
        id: CompactString,
        /// Time spent waiting.
        waited: Duration,
    },
    /// Any other daemon error line.
    #[error("daemon error: {0}")]
    Remote(String),
    /// The daemon answered with something unparseable.
    #[error("unexpected result reply: {0:?}")]
    Malformed(String),
}

impl ResultError {
    /// Classify a daemon error message for a unit.
    pub(crate) fn from_remote(id: &str, message: String) -> Self {
        if protocol::is_unknown_unit(&message) {
            Self::UnknownHandle(id.into())
        } else {
            Self::Remote(message)
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Connection(ConnectionError::Io(e))
    }
}

impl From<LineError> for Error {
    fn from(e: LineError) -> Self {
        Self::Connection(ConnectionError::Line(e))
    }
}
