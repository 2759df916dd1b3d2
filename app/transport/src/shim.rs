//! Recognition of the fixed command strings a host automation runtime sends
//! while bootstrapping a module run.
//!
//! The table is a placeholder fixture: it matches the literal forms one host
//! runtime emits and treats everything else as a no-op.

/// Prefix of the temporary directory creation command.
const TEMP_DIR_PREFIX: &str = "/bin/sh -c '( umask 77 && mkdir -p";
/// Prefix of the interpreter discovery command.
const PLATFORM_PREFIX: &str = "/bin/sh -c 'echo PLATFORM";
/// Marker of the module payload execution command.
const PAYLOAD_MARKER: &str = "AnsiballZ";
/// Working directory probe, matched exactly.
const PWD_COMMAND: &str = "/bin/sh -c 'echo \"`pwd`\" && sleep 0'";

/// What a command string asks the transport to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShimCommand<'a> {
    /// Report the home directory.
    HomeDirectory,
    /// Report the current working directory.
    WorkingDirectory,
    /// Create the remote temporary directory by running the command locally.
    CreateTempDir(&'a str),
    /// Report the platform and interpreter list.
    DiscoverPlatform,
    /// Submit the staged payload and return its output.
    RunPayload,
    /// Anything else: succeed with no output.
    Passthrough,
}

impl<'a> ShimCommand<'a> {
    /// Classify `cmd` as issued on behalf of `user`.
    pub fn classify(cmd: &'a str, user: &str) -> Self {
        if is_home_probe(cmd, user) {
            Self::HomeDirectory
        } else if cmd == PWD_COMMAND {
            Self::WorkingDirectory
        } else if cmd.starts_with(TEMP_DIR_PREFIX) {
            Self::CreateTempDir(cmd)
        } else if cmd.starts_with(PLATFORM_PREFIX) {
            Self::DiscoverPlatform
        } else if cmd.contains(PAYLOAD_MARKER) {
            Self::RunPayload
        } else {
            Self::Passthrough
        }
    }
}

/// `/bin/sh -c 'echo ~<user> && sleep 0'`
fn is_home_probe(cmd: &str, user: &str) -> bool {
    cmd.strip_prefix("/bin/sh -c 'echo ~")
        .and_then(|rest| rest.strip_suffix(" && sleep 0'"))
        .is_some_and(|name| name == user)
}

/// Canned interpreter discovery output.
pub fn platform_report(platform: &str, interpreters: &[String]) -> String {
    let mut report = format!("PLATFORM\n{platform}\nFOUND\n");
    for interpreter in interpreters {
        report.push_str(interpreter);
        report.push('\n');
    }
    report.push_str("ENDFOUND\n");
    report
}
