//! Command shim: presents a receptor node to a host automation runtime as a
//! remote execution transport.
//!
//! Uses RPITIT, no dyn dispatch. [`ReceptorTransport`] is the only
//! implementation of [`Transport`].

use anyhow::Result;
use std::future::Future;
use std::path::Path;

pub use config::TransportConfig;
pub use receptor::{ReceptorTransport, current_user};
pub use shim::{ShimCommand, platform_report};

pub mod config;
mod receptor;
pub mod shim;

/// Exit code and captured output of one executed command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    /// Exit code.
    pub rc: i32,
    /// Captured stdout.
    pub stdout: Vec<u8>,
    /// Captured stderr.
    pub stderr: Vec<u8>,
}

impl ExecOutput {
    /// Successful run with the given stdout.
    pub fn ok(stdout: impl Into<Vec<u8>>) -> Self {
        Self {
            rc: 0,
            stdout: stdout.into(),
            stderr: Vec::new(),
        }
    }
}

/// The interface a host runtime drives a connection through.
pub trait Transport {
    /// Mark the transport connected.
    fn open(&mut self) -> impl Future<Output = Result<()>> + Send;

    /// Run one command string, opening the transport first if needed.
    fn execute(&mut self, cmd: &str) -> impl Future<Output = Result<ExecOutput>> + Send;

    /// Copy a local file to the transport side.
    fn transfer_in(&mut self, src: &Path, dst: &Path) -> impl Future<Output = Result<()>> + Send;

    /// Copy a file back from the transport side.
    fn transfer_out(&mut self, src: &Path, dst: &Path) -> impl Future<Output = Result<()>> + Send;

    /// Drop the connection.
    fn close(&mut self);
}
