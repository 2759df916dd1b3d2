//! Receptor client library: submit units of work to a receptor node over its
//! local control socket and read their results back.
//!
//! ```no_run
//! # async fn demo() -> Result<(), receptor_client::Error> {
//! let client = receptor_client::ReceptorClient::default();
//! let mut conn = client.connect().await?;
//! let output = conn.run("ansible-local", b"print('hi')", "localhost").await?;
//! # drop(output);
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::time::Duration;
use tracing::Span;

pub use connection::Connection;
pub use error::{ConnectionError, Error, ResultError, SubmissionError};
pub use handle::SubmissionHandle;
pub use protocol::{DEFAULT_NODE, UnitList, WorkState, WorkStatus};
pub use result::{ResultPoll, ResultStream};

pub mod connection;
pub mod error;
mod handle;
mod result;

/// Default interval between status polls while waiting for a result.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Client configuration for connecting to a receptor control socket.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Control socket path.
    pub socket_path: PathBuf,
    /// Interval between status polls in [`Connection::fetch_result`].
    pub poll_interval: Duration,
    /// Give up waiting for a result after this long. `None` waits forever.
    pub result_timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from(protocol::DEFAULT_SOCKET_PATH),
            poll_interval: DEFAULT_POLL_INTERVAL,
            result_timeout: None,
        }
    }
}

/// Client for a receptor control socket.
///
/// Holds configuration. Call [`ReceptorClient::connect`] to open a
/// [`Connection`].
#[derive(Debug, Clone, Default)]
pub struct ReceptorClient {
    config: ClientConfig,
    span: Option<Span>,
}

impl ReceptorClient {
    /// Create a new client with the given configuration.
    pub fn new(config: ClientConfig) -> Self {
        Self { config, span: None }
    }

    /// Access the client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Set the control socket path.
    pub fn socket_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.socket_path = path.into();
        self
    }

    /// Set the status poll interval.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    /// Set the result timeout.
    pub fn result_timeout(mut self, timeout: Duration) -> Self {
        self.config.result_timeout = Some(timeout);
        self
    }

    /// Record every connection's events under `span` instead of the default
    /// `receptor` span.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    /// Connect to the control socket and return a [`Connection`].
    pub async fn connect(&self) -> Result<Connection, ConnectionError> {
        let span = self.span.clone().unwrap_or_else(|| {
            tracing::debug_span!("receptor", socket = %self.config.socket_path.display())
        });
        Connection::connect(&self.config, span).await
    }
}
