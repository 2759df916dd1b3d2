//! Submission handles.

use compact_str::CompactString;

/// Opaque id of one submitted unit of work.
///
/// Not `Clone`: a handle names exactly one submission and is consumed by
/// [`crate::Connection::release`] once its result has been read.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct SubmissionHandle(CompactString);

impl SubmissionHandle {
    /// Wrap a unit id obtained outside this client, e.g. from the command line.
    pub fn new(unit_id: impl Into<CompactString>) -> Self {
        Self(unit_id.into())
    }

    /// The daemon's unit id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SubmissionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
