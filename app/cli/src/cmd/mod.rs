//! CLI argument parsing and subcommand dispatch.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use client::{Connection, ReceptorClient};
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::AsyncWrite;

pub use results::Results;
pub use submit::Submit;

pub mod results;
pub mod submit;
pub mod unit;

/// Receptor work control.
#[derive(Parser, Debug)]
#[command(name = "rctl", about = "Submit work to a receptor node and manage its units")]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Control socket path.
    #[arg(long, global = true, default_value = "/tmp/receptor.sock")]
    pub socket: PathBuf,

    /// Give up waiting for a result after this many seconds.
    #[arg(long, global = true)]
    pub timeout: Option<u64>,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Submit a payload as a new unit of work.
    Submit(Submit),
    /// Stream the output of a finished unit.
    Results(Results),
    /// Show a unit's status.
    Status {
        /// Unit id.
        id: String,
    },
    /// Release a unit.
    Release {
        /// Unit id.
        id: String,
    },
    /// Cancel a running unit.
    Cancel {
        /// Unit id.
        id: String,
    },
    /// List every unit the node knows.
    List,
}

impl Cli {
    /// Client configured from the global flags.
    pub fn client(&self) -> ReceptorClient {
        let client = ReceptorClient::default().socket_path(&self.socket);
        match self.timeout {
            Some(secs) => client.result_timeout(Duration::from_secs(secs)),
            None => client,
        }
    }

    /// Connect and run the subcommand, writing to stdout.
    pub async fn run(self) -> Result<()> {
        let mut stdout = tokio::io::stdout();
        self.run_with(&mut stdout).await
    }

    /// Connect and run the subcommand, writing its output to `out`.
    pub async fn run_with(self, out: &mut (impl AsyncWrite + Unpin)) -> Result<()> {
        let mut conn = self.connect().await?;
        let result = match self.command {
            Command::Submit(submit) => submit.run(&mut conn, out).await,
            Command::Results(results) => results.run(&mut conn, out).await,
            Command::Status { id } => unit::status(&mut conn, &id, out).await,
            Command::Release { id } => unit::release(&mut conn, &id, out).await,
            Command::Cancel { id } => unit::cancel(&mut conn, &id, out).await,
            Command::List => unit::list(&mut conn, out).await,
        };
        conn.close();
        result
    }

    async fn connect(&self) -> Result<Connection> {
        let conn = self
            .client()
            .connect()
            .await
            .with_context(|| format!("failed to connect to {}", self.socket.display()))?;
        tracing::debug!("connected to node {}", conn.node_id());
        Ok(conn)
    }
}
