// SPDX-License-Identifier: MIT

use thiserror::Error;

/// A runner's outcome, distinguishing "fail this layer gracefully" from a
/// real error (spec.md §4.3).
#[derive(Debug, Error)]
pub enum RunnerError {
    /// Exit code 100: the equivalent of detect declining. Callers treat
    /// this as "skip, don't fail the build."
    #[error("declined (code 100)")]
    Declined,
    /// Any other non-zero exit code.
    #[error("exited with code {0}")]
    Code(i32),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("metadata error: {0}")]
    Metadata(#[from] strata_metadata::MetadataError),
    #[error("{0}")]
    Other(String),
}

impl RunnerError {
    pub fn from_exit_code(code: i32) -> Option<Self> {
        match code {
            0 => None,
            100 => Some(RunnerError::Declined),
            other => Some(RunnerError::Code(other)),
        }
    }

    pub fn is_decline(&self) -> bool {
        matches!(self, RunnerError::Declined)
    }
}

impl From<RunnerError> for strata_sync::NodeError {
    fn from(e: RunnerError) -> Self {
        strata_sync::NodeError::new(e.to_string())
    }
}
