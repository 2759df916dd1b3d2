//! Transport backed by the receptor work submission client.

use crate::shim::{self, ShimCommand};
use crate::{ExecOutput, Transport, TransportConfig};
use anyhow::{Context, Result, bail};
use client::{Connection, ReceptorClient};
use std::path::Path;
use std::time::Duration;
use tracing::{Instrument, Span};

/// Login name of the local user, from the usual environment variables.
pub fn current_user() -> String {
    ["LOGNAME", "USER", "LNAME", "USERNAME"]
        .into_iter()
        .filter_map(|key| std::env::var(key).ok())
        .find(|name| !name.is_empty())
        .unwrap_or_else(|| "root".to_owned())
}

/// Answers bootstrap commands locally and forwards module payloads to a
/// receptor node.
#[derive(Debug)]
pub struct ReceptorTransport {
    config: TransportConfig,
    client: ReceptorClient,
    user: String,
    span: Span,
    connection: Option<Connection>,
    connected: bool,
}

impl ReceptorTransport {
    /// Create a transport for `config`. Nothing is dialled until a payload
    /// runs.
    pub fn new(config: TransportConfig) -> Self {
        let span = tracing::info_span!("transport", host = %config.remote_addr);
        let mut client = ReceptorClient::default().socket_path(config.socket_path.clone());
        if let Some(secs) = config.result_timeout_secs {
            client = client.result_timeout(Duration::from_secs(secs));
        }
        let user = config.remote_user.clone().unwrap_or_else(current_user);
        Self {
            client: client.with_span(span.clone()),
            config,
            user,
            span,
            connection: None,
            connected: false,
        }
    }

    /// Record this transport's events, and its client's, under `span`.
    pub fn with_span(mut self, span: Span) -> Self {
        self.client = self.client.with_span(span.clone());
        self.span = span;
        self
    }

    /// Active configuration.
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// User commands are classified for.
    pub fn user(&self) -> &str {
        &self.user
    }

    /// Whether the transport is open.
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    async fn dispatch(&mut self, cmd: &str) -> Result<ExecOutput> {
        match ShimCommand::classify(cmd, &self.user) {
            ShimCommand::HomeDirectory => {
                tracing::debug!("home directory probe");
                let home = dirs::home_dir().context("no home directory for the local user")?;
                Ok(ExecOutput::ok(home.display().to_string()))
            }
            ShimCommand::WorkingDirectory => {
                tracing::debug!("working directory probe");
                let cwd = std::env::current_dir().context("failed to read working directory")?;
                Ok(ExecOutput::ok(cwd.display().to_string()))
            }
            ShimCommand::CreateTempDir(cmd) => create_temp_dir(cmd).await,
            ShimCommand::DiscoverPlatform => {
                tracing::debug!("platform discovery");
                Ok(ExecOutput::ok(shim::platform_report(
                    &self.config.platform,
                    &self.config.interpreters,
                )))
            }
            ShimCommand::RunPayload => self.run_payload().await.map(ExecOutput::ok),
            ShimCommand::Passthrough => Ok(ExecOutput::default()),
        }
    }

    async fn run_payload(&mut self) -> Result<Vec<u8>> {
        let staging = &self.config.staging_path;
        let payload = tokio::fs::read(staging)
            .await
            .with_context(|| format!("failed to read staged payload {}", staging.display()))?;

        let connection = match &mut self.connection {
            Some(connection) => connection,
            slot => {
                tracing::debug!("connecting to receptor");
                let connection = self.client.connect().await.with_context(|| {
                    format!("failed to connect to {}", self.config.socket_path.display())
                })?;
                slot.insert(connection)
            }
        };

        tracing::info!(
            "running {} byte payload as {} on {}",
            payload.len(),
            self.config.work_type,
            self.config.remote_addr
        );
        let output = connection
            .run(&self.config.work_type, &payload, &self.config.remote_addr)
            .await
            .with_context(|| {
                format!(
                    "{} work on {} failed",
                    self.config.work_type, self.config.remote_addr
                )
            })?;
        Ok(output)
    }
}

/// Run the temp dir command through `/bin/sh -c` and return its stdout.
async fn create_temp_dir(cmd: &str) -> Result<ExecOutput> {
    tracing::debug!("creating temp dir");
    let output = tokio::process::Command::new("/bin/sh")
        .arg("-c")
        .arg(cmd)
        .output()
        .await
        .context("failed to spawn /bin/sh")?;
    if !output.status.success() {
        bail!(
            "temp dir command exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(ExecOutput::ok(output.stdout))
}

impl Transport for ReceptorTransport {
    async fn open(&mut self) -> Result<()> {
        if !self.connected {
            self.span.in_scope(|| {
                tracing::info!("establishing receptor connection for user {}", self.user)
            });
            self.connected = true;
        }
        Ok(())
    }

    async fn execute(&mut self, cmd: &str) -> Result<ExecOutput> {
        self.open().await?;
        let span = self.span.clone();
        async {
            tracing::debug!("exec {cmd}");
            self.dispatch(cmd).await
        }
        .instrument(span)
        .await
    }

    async fn transfer_in(&mut self, src: &Path, dst: &Path) -> Result<()> {
        let staging = &self.config.staging_path;
        async {
            tracing::info!("put {} to {}", src.display(), dst.display());
            if let Some(parent) = staging.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
            tokio::fs::copy(src, staging).await.with_context(|| {
                format!("failed to stage {} at {}", src.display(), staging.display())
            })?;
            Ok::<_, anyhow::Error>(())
        }
        .instrument(self.span.clone())
        .await
    }

    async fn transfer_out(&mut self, src: &Path, dst: &Path) -> Result<()> {
        self.span
            .in_scope(|| tracing::info!("fetch {} to {}", src.display(), dst.display()));
        Ok(())
    }

    fn close(&mut self) {
        if let Some(mut connection) = self.connection.take() {
            connection.close();
        }
        self.connected = false;
    }
}
