//! Execution of a single unit for each configured worker kind.

use crate::config::WorkerKind;
use bytes::Bytes;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// What a finished unit produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    /// Captured stdout.
    pub stdout: Vec<u8>,
    /// Failure detail; `None` when the unit succeeded.
    pub failure: Option<String>,
}

impl Outcome {
    fn success(stdout: Vec<u8>) -> Self {
        Self {
            stdout,
            failure: None,
        }
    }

    fn failed(detail: impl Into<String>) -> Self {
        Self {
            stdout: Vec::new(),
            failure: Some(detail.into()),
        }
    }
}

impl WorkerKind {
    /// Run one unit to completion.
    pub async fn run(&self, payload: Bytes) -> Outcome {
        match self {
            Self::Echo => Outcome::success(payload.to_vec()),
            Self::Length => Outcome::success(payload.len().to_string().into_bytes()),
            Self::Fail { message } => Outcome::failed(message.as_str()),
            Self::Command { command, args } => run_command(command, args, payload).await,
        }
    }
}

async fn run_command(command: &str, args: &[String], payload: Bytes) -> Outcome {
    let spawned = Command::new(command)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn();
    let mut child = match spawned {
        Ok(child) => child,
        Err(e) => return Outcome::failed(format!("failed to spawn {command}: {e}")),
    };

    // Feed stdin concurrently so a chatty child cannot fill its stdout pipe
    // while we are still writing.
    if let Some(mut stdin) = child.stdin.take() {
        let command = command.to_owned();
        tokio::spawn(async move {
            if let Err(e) = stdin.write_all(&payload).await {
                tracing::debug!("payload write to {command} stopped early: {e}");
            }
        });
    }

    match child.wait_with_output().await {
        Ok(output) if output.status.success() => Outcome::success(output.stdout),
        Ok(output) => {
            let detail = match output.status.code() {
                Some(code) => format!("exit status {code}"),
                None => "terminated by signal".to_owned(),
            };
            tracing::debug!(
                "{command} failed ({detail}): {}",
                String::from_utf8_lossy(&output.stderr).trim()
            );
            Outcome {
                stdout: output.stdout,
                failure: Some(detail),
            }
        }
        Err(e) => Outcome::failed(format!("failed to wait for {command}: {e}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn length_counts_bytes() {
        let outcome = WorkerKind::Length.run(Bytes::from_static(b"print('hi')")).await;
        assert_eq!(outcome.stdout, b"11");
        assert!(outcome.failure.is_none());
    }

    #[tokio::test]
    async fn command_pipes_payload() {
        let kind = WorkerKind::Command {
            command: "cat".into(),
            args: vec![],
        };
        let outcome = kind.run(Bytes::from_static(b"through the pipe")).await;
        assert_eq!(outcome.stdout, b"through the pipe");
        assert!(outcome.failure.is_none());
    }

    #[tokio::test]
    async fn command_exit_code_is_failure() {
        let kind = WorkerKind::Command {
            command: "sh".into(),
            args: vec!["-c".into(), "echo partial; exit 3".into()],
        };
        let outcome = kind.run(Bytes::new()).await;
        assert_eq!(outcome.stdout, b"partial\n");
        assert_eq!(outcome.failure.as_deref(), Some("exit status 3"));
    }

    #[tokio::test]
    async fn missing_program_is_failure() {
        let kind = WorkerKind::Command {
            command: "/nonexistent/receptor-worker".into(),
            args: vec![],
        };
        let outcome = kind.run(Bytes::new()).await;
        assert!(outcome.failure.unwrap().starts_with("failed to spawn"));
    }
}
