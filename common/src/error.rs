//! Errors raised while running external tools.

use thiserror::Error;

/// A subprocess could not be run, or it exited with an unexpected status.
///
/// Both variants carry the full shell-quoted command line so that the failure
/// can be reproduced by pasting it into a terminal.
#[derive(Debug, Error)]
pub enum ToolError {
    /// The process could not be spawned at all.
    #[error("failed to run {command}: {source}")]
    Spawn {
        /// Shell-quoted command line.
        command: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The process exited with a status outside the allowed set.
    #[error(
        "unexpected exit code {} from: {command} (expected one of {expected:?})",
        describe_code(.code)
    )]
    UnexpectedExitCode {
        /// Shell-quoted command line.
        command: String,
        /// Exit code, or `None` when the process was killed by a signal.
        code: Option<i32>,
        /// Exit codes that would have been accepted.
        expected: Vec<i32>,
        /// Captured stdout and stderr, the last lines of a streamed run, or
        /// empty when the output went straight to the terminal.
        output: String,
    },

    /// Test stub received an unexpected or mismatched command invocation.
    #[cfg(any(test, feature = "test-support"))]
    #[error("stub mismatch: {message}")]
    StubMismatch {
        /// Description of what was expected versus what was received.
        message: String,
    },
}

impl ToolError {
    /// Returns the command line that failed.
    #[must_use]
    pub fn command(&self) -> &str {
        match self {
            Self::Spawn { command, .. } | Self::UnexpectedExitCode { command, .. } => command,
            #[cfg(any(test, feature = "test-support"))]
            Self::StubMismatch { .. } => "",
        }
    }
}

fn describe_code(code: &Option<i32>) -> String {
    code.map_or_else(|| "(terminated by signal)".to_owned(), |c| c.to_string())
}

/// Result type alias using [`ToolError`].
pub type Result<T> = std::result::Result<T, ToolError>;
