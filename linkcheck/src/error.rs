//! Error types for linkage verification.

use camino::Utf8PathBuf;
use thirdparty_common::ToolError;
use thiserror::Error;

/// Errors that can occur while verifying installed artifacts.
#[derive(Debug, Error)]
pub enum CheckError {
    /// An inspection or rewriting tool failed to run.
    #[error(transparent)]
    ToolInvocation(#[from] ToolError),

    /// The host operating system has no inspection tool adapter.
    #[error("unsupported platform: {os}")]
    UnsupportedPlatform {
        /// Operating system name as reported by the standard library.
        os: String,
    },

    /// An allow-list pattern is not a valid regular expression.
    #[error("invalid allow-list pattern {pattern:?}: {reason}")]
    InvalidPattern {
        /// The offending pattern source.
        pattern: String,
        /// Parser message.
        reason: String,
    },

    /// The needed-library list of an artifact disagrees with `ldd -u`, or a
    /// rewrite did not take effect.
    #[error("inconsistent needed libraries in {path}: {reason}")]
    Consistency {
        /// Artifact being fixed.
        path: Utf8PathBuf,
        /// Description of the inconsistency.
        reason: String,
    },

    /// The installed tree could not be walked or read.
    #[error("failed to scan {path}: {source}")]
    Scan {
        /// Path being scanned.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A path under the installed tree is not valid UTF-8.
    #[error("non UTF-8 path under the installed tree: {path}")]
    NonUtf8Path {
        /// Lossy rendering of the path.
        path: String,
    },

    /// At least one artifact failed verification.
    #[error("found problematic library dependencies in {count} file(s), using tool: {tool}")]
    LinkageViolation {
        /// Inspection tool description, e.g. `ldd` or `otool -L`.
        tool: &'static str,
        /// Number of failing artifacts.
        count: usize,
    },
}

/// Result type alias using [`CheckError`].
pub type Result<T> = std::result::Result<T, CheckError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linkage_violation_names_tool() {
        let err = CheckError::LinkageViolation {
            tool: "otool -L",
            count: 2,
        };
        let msg = err.to_string();
        assert!(msg.contains("otool -L"));
        assert!(msg.contains("2 file(s)"));
    }

    #[test]
    fn consistency_error_includes_path() {
        let err = CheckError::Consistency {
            path: Utf8PathBuf::from("/tp/installed/common/lib/libfoo.so"),
            reason: "libatomic.so.1 is still needed".to_owned(),
        };
        assert!(err.to_string().contains("/tp/installed/common/lib/libfoo.so"));
    }

    #[test]
    fn tool_errors_pass_through() {
        let err = CheckError::from(ToolError::Spawn {
            command: "patchelf --print-needed /x".to_owned(),
            source: std::io::Error::other("no such file"),
        });
        assert!(err.to_string().starts_with("failed to run patchelf"));
    }
}
