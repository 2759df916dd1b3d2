//! Stub daemon configuration loaded from TOML.

use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level stub daemon configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StubConfig {
    /// Node id announced in the control greeting.
    #[serde(default = "default_node_id")]
    pub node_id: CompactString,
    /// Control socket configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Registered work types (`[[workers]]` array).
    #[serde(default)]
    pub workers: Vec<WorkerConfig>,
}

impl Default for StubConfig {
    fn default() -> Self {
        Self {
            node_id: default_node_id(),
            server: ServerConfig::default(),
            workers: vec![WorkerConfig {
                work_type: "echo".into(),
                kind: WorkerKind::Echo,
            }],
        }
    }
}

fn default_node_id() -> CompactString {
    CompactString::const_new("stub")
}

/// Control socket configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Custom Unix domain socket path. When `None`, defaults to
    /// `/tmp/receptor.sock`.
    pub socket_path: Option<String>,
}

/// One registered work type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Work type name clients submit against.
    pub work_type: CompactString,
    /// How units of this type execute.
    #[serde(flatten)]
    pub kind: WorkerKind,
}

/// Execution strategy for a work type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WorkerKind {
    /// Stdout is the payload itself.
    Echo,
    /// Stdout is the payload length in decimal.
    Length,
    /// Spawn a process with the payload on stdin; stdout is its stdout.
    Command {
        /// Program to run.
        command: String,
        /// Program arguments.
        #[serde(default)]
        args: Vec<String>,
    },
    /// Always fail with the given detail.
    Fail {
        /// Failure detail reported in the unit status.
        message: String,
    },
}

impl StubConfig {
    /// Parse a TOML string into a `StubConfig`, expanding environment
    /// variables first.
    pub fn from_toml(toml_str: &str) -> anyhow::Result<Self> {
        let expanded = crate::utils::expand_env_vars(toml_str);
        let config: Self = toml::from_str(&expanded)?;
        Ok(config)
    }

    /// Load configuration from a file path.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Resolve the socket path. Uses the explicit config value if set,
    /// otherwise the protocol default.
    pub fn socket_path(&self) -> PathBuf {
        self.server
            .socket_path
            .as_deref()
            .unwrap_or(protocol::DEFAULT_SOCKET_PATH)
            .into()
    }

    /// Builder-style override of the socket path.
    pub fn with_socket_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.server.socket_path = Some(path.into().to_string_lossy().into_owned());
        self
    }

    /// Builder-style registration of a work type.
    pub fn with_worker(mut self, work_type: impl Into<CompactString>, kind: WorkerKind) -> Self {
        self.workers.push(WorkerConfig {
            work_type: work_type.into(),
            kind,
        });
        self
    }
}
