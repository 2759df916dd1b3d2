//! Receptor control-service wire types shared by the work client and the
//! stub daemon.
//!
//! The control service speaks newline-delimited text. A session opens with a
//! greeting line from the server, the client sends one request line (JSON or
//! the plain `work <subcommand> ...` form), and the server answers with either
//! a JSON document, a protocol line, or `ERROR: <message>`.

use compact_str::CompactString;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::collections::BTreeMap;

pub mod codec;

/// Socket path used when none is configured.
pub const DEFAULT_SOCKET_PATH: &str = "/tmp/receptor.sock";

/// Node targeted when a submission names none.
pub const DEFAULT_NODE: &str = "localhost";

const GREETING_PREFIX: &str = "Receptor Control, node ";
const ERROR_PREFIX: &str = "ERROR:";
const PROMPT_PREFIX: &str = "Work unit created with ID ";
const PROMPT_SUFFIX: &str = ". Send stdin data and EOF.";
const STREAMING_PREFIX: &str = "Streaming results for work unit ";
const UNKNOWN_UNIT_PREFIX: &str = "unknown work unit";

/// Greeting line the control service sends on accept.
pub fn greeting(node: &str) -> String {
    format!("{GREETING_PREFIX}{node}")
}

/// Extract the node id from a greeting line.
pub fn parse_greeting(line: &str) -> Option<&str> {
    line.strip_prefix(GREETING_PREFIX)
        .map(str::trim)
        .filter(|node| !node.is_empty())
}

/// Render an error line.
pub fn error_line(message: &str) -> String {
    format!("{ERROR_PREFIX} {message}")
}

/// Extract the message from an `ERROR:` line.
pub fn parse_error(line: &str) -> Option<&str> {
    line.strip_prefix(ERROR_PREFIX).map(str::trim_start)
}

/// Prompt sent after a submit request is accepted, before the payload.
pub fn submit_prompt(unit_id: &str) -> String {
    format!("{PROMPT_PREFIX}{unit_id}{PROMPT_SUFFIX}")
}

/// Extract the unit id from a submit prompt.
pub fn parse_submit_prompt(line: &str) -> Option<&str> {
    line.strip_prefix(PROMPT_PREFIX)?
        .strip_suffix(PROMPT_SUFFIX)
        .filter(|id| !id.is_empty())
}

/// Header line preceding a result byte stream.
pub fn streaming_line(unit_id: &str) -> String {
    format!("{STREAMING_PREFIX}{unit_id}")
}

/// Extract the unit id from a streaming header.
pub fn parse_streaming(line: &str) -> Option<&str> {
    line.strip_prefix(STREAMING_PREFIX)
}

/// Error message for a unit id the daemon does not know.
pub fn unknown_unit(unit_id: &str) -> String {
    format!("{UNKNOWN_UNIT_PREFIX} {unit_id}")
}

/// Whether an error message reports an unknown unit id.
pub fn is_unknown_unit(message: &str) -> bool {
    message.starts_with(UNKNOWN_UNIT_PREFIX)
}

/// One control request. Always `"command": "work"` on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    /// Top-level command name.
    pub command: CompactString,
    /// The work subcommand and its arguments.
    #[serde(flatten)]
    pub work: WorkCommand,
}

/// Subcommands of the `work` control command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "subcommand", rename_all = "lowercase")]
pub enum WorkCommand {
    /// Create a unit; the payload follows the prompt line.
    Submit {
        /// Node the unit runs on.
        node: CompactString,
        /// Registered work type.
        worktype: CompactString,
    },
    /// Report a unit's status.
    Status {
        /// Unit id.
        unitid: CompactString,
    },
    /// Stream a unit's stdout from `startpos`.
    Results {
        /// Unit id.
        unitid: CompactString,
        /// Byte offset to start streaming from.
        #[serde(default)]
        startpos: u64,
    },
    /// Forget a unit, cancelling it first if still running.
    Release {
        /// Unit id.
        unitid: CompactString,
    },
    /// Cancel a running unit.
    Cancel {
        /// Unit id.
        unitid: CompactString,
    },
    /// List all known units.
    List,
}

/// Errors produced while parsing a request line.
#[derive(Debug)]
pub enum RequestError {
    /// The line looked like JSON but did not decode.
    Json(serde_json::Error),
    /// The command or subcommand is not understood.
    Unknown(String),
}

impl std::fmt::Display for RequestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json(e) => write!(f, "bad json command: {e}"),
            Self::Unknown(line) => write!(f, "unknown command: {line}"),
        }
    }
}

impl std::error::Error for RequestError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Json(e) => Some(e),
            Self::Unknown(_) => None,
        }
    }
}

impl Request {
    /// Wrap a work subcommand.
    pub fn work(work: WorkCommand) -> Self {
        Self {
            command: CompactString::const_new("work"),
            work,
        }
    }

    /// Parse a request line in either the JSON or the plain text form.
    pub fn parse(line: &str) -> Result<Self, RequestError> {
        let line = line.trim();
        if line.starts_with('{') {
            let request: Self = serde_json::from_str(line).map_err(RequestError::Json)?;
            if request.command != "work" {
                return Err(RequestError::Unknown(line.to_owned()));
            }
            return Ok(request);
        }

        let unknown = || RequestError::Unknown(line.to_owned());
        let mut words = line.split_whitespace();
        if words.next() != Some("work") {
            return Err(unknown());
        }
        let subcommand = words.next().ok_or_else(unknown)?;
        let mut arg = || words.next().map(CompactString::from).ok_or_else(unknown);
        let work = match subcommand {
            "submit" => {
                let node = arg()?;
                let worktype = arg()?;
                WorkCommand::Submit { node, worktype }
            }
            "status" => WorkCommand::Status { unitid: arg()? },
            "results" => {
                let unitid = arg()?;
                let startpos = match arg() {
                    Ok(pos) => pos.parse().map_err(|_| unknown())?,
                    Err(_) => 0,
                };
                WorkCommand::Results { unitid, startpos }
            }
            "release" => WorkCommand::Release { unitid: arg()? },
            "cancel" => WorkCommand::Cancel { unitid: arg()? },
            "list" => WorkCommand::List,
            _ => return Err(unknown()),
        };
        Ok(Self::work(work))
    }
}

/// Lifecycle state of a unit, encoded as receptor's numeric state code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum WorkState {
    /// Accepted, not yet started.
    Pending,
    /// Executing.
    Running,
    /// Finished successfully.
    Succeeded,
    /// Finished with an error.
    Failed,
    /// Stopped by a cancel or release.
    Canceled,
}

impl WorkState {
    /// Human-readable state name as the daemon reports it.
    pub fn name(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Running => "Running",
            Self::Succeeded => "Succeeded",
            Self::Failed => "Failed",
            Self::Canceled => "Canceled",
        }
    }

    /// Whether the unit will not change state again.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Canceled)
    }
}

impl std::fmt::Display for WorkState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl From<WorkState> for u8 {
    fn from(state: WorkState) -> Self {
        match state {
            WorkState::Pending => 0,
            WorkState::Running => 1,
            WorkState::Succeeded => 2,
            WorkState::Failed => 3,
            WorkState::Canceled => 4,
        }
    }
}

impl TryFrom<u8> for WorkState {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Ok(match code {
            0 => Self::Pending,
            1 => Self::Running,
            2 => Self::Succeeded,
            3 => Self::Failed,
            4 => Self::Canceled,
            other => return Err(format!("unknown work state {other}")),
        })
    }
}

/// Status document returned by `work status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WorkStatus {
    /// Numeric state.
    pub state: WorkState,
    /// State name, redundant with `state`.
    pub state_name: CompactString,
    /// Free-form detail; the failure reason for failed units.
    #[serde(default)]
    pub detail: String,
    /// Bytes of stdout produced so far.
    #[serde(default)]
    pub stdout_size: u64,
    /// Work type the unit was submitted with.
    #[serde(default)]
    pub work_type: CompactString,
    /// Node the unit was submitted to.
    #[serde(default)]
    pub node: CompactString,
}

/// Confirmation sent after a submitted payload is fully received.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitAck {
    /// Always `"Job Started"`.
    pub result: CompactString,
    /// The new unit id.
    pub unitid: CompactString,
}

impl SubmitAck {
    /// Acknowledge a started unit.
    pub fn started(unitid: impl Into<CompactString>) -> Self {
        Self {
            result: CompactString::const_new("Job Started"),
            unitid: unitid.into(),
        }
    }
}

/// Reply to `work release`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Released {
    /// The released unit id.
    pub released: CompactString,
}

/// Reply to `work cancel`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cancelled {
    /// The cancelled unit id.
    pub cancelled: CompactString,
}

/// Reply to `work list`.
pub type UnitList = BTreeMap<CompactString, WorkStatus>;

/// A JSON reply line, or the daemon's error line in its place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply<T> {
    /// Decoded document.
    Ok(T),
    /// Message from an `ERROR:` line.
    Error(String),
}

impl<T: DeserializeOwned> Reply<T> {
    /// Decode a reply line.
    pub fn parse(line: &str) -> Result<Self, serde_json::Error> {
        if let Some(message) = parse_error(line) {
            return Ok(Self::Error(message.to_owned()));
        }
        serde_json::from_str(line).map(Self::Ok)
    }
}
