//! Transport configuration loaded from TOML.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default work type payloads are submitted as.
pub const DEFAULT_WORK_TYPE: &str = "ansible-local";
/// Default file the staged module bundle is copied to.
pub const DEFAULT_STAGING_PATH: &str = "/tmp/AnsiballZ.py";

/// Command shim configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Receptor control socket.
    pub socket_path: PathBuf,
    /// User the host runtime believes it runs as. When `None`, the local
    /// login name is used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_user: Option<String>,
    /// Receptor node payloads are submitted to.
    pub remote_addr: String,
    /// Work type payloads are submitted as.
    pub work_type: String,
    /// Where `transfer_in` stages the module bundle.
    pub staging_path: PathBuf,
    /// System name reported during platform discovery.
    pub platform: String,
    /// Interpreter paths reported during platform discovery.
    pub interpreters: Vec<String>,
    /// Give up waiting for a payload result after this many seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_timeout_secs: Option<u64>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from("/tmp/receptor.sock"),
            remote_user: None,
            remote_addr: client::DEFAULT_NODE.to_owned(),
            work_type: DEFAULT_WORK_TYPE.to_owned(),
            staging_path: PathBuf::from(DEFAULT_STAGING_PATH),
            platform: "Linux".to_owned(),
            interpreters: vec![
                "/usr/bin/python3".to_owned(),
                "/usr/bin/python".to_owned(),
            ],
            result_timeout_secs: None,
        }
    }
}

impl TransportConfig {
    /// Parse a TOML string into a `TransportConfig`.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str).context("invalid transport config")
    }

    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_toml(&content)
    }
}
