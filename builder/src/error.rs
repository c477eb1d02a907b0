//! Error types for the dependency builder.
//!
//! Configuration problems (bad group names, unknown dependencies, missing
//! build hooks, unrecognised archive URLs) get their own variants so the CLI
//! can report them before any subprocess is started. Tool, linkage and
//! configuration-file errors from the sibling crates are wrapped
//! transparently.

use camino::Utf8PathBuf;
use thirdparty::ConfigError;
use thirdparty_common::ToolError;
use thirdparty_linkcheck::CheckError;
use thiserror::Error;

/// Errors that can occur while building or cleaning dependencies.
#[derive(Debug, Error)]
pub enum BuilderError {
    /// A build group name is not one of the known groups.
    #[error("invalid build group: {name} (expected one of: common, potentially_instrumented)")]
    InvalidBuildGroup {
        /// The rejected name.
        name: String,
    },

    /// A build type name is not one of the known build types.
    #[error("invalid build type: {name} (expected one of: common, uninstrumented, asan, tsan)")]
    InvalidBuildType {
        /// The rejected name.
        name: String,
    },

    /// A download URL does not end with a recognised archive extension.
    #[error("could not determine archive type of {url} for dependency {dependency}")]
    UnsupportedArchive {
        /// Dependency or extra download name.
        dependency: String,
        /// The resolved download URL.
        url: String,
    },

    /// A dependency name given on the command line is not defined.
    #[error("unknown dependency: {name}")]
    UnknownDependency {
        /// The unknown name.
        name: String,
    },

    /// A dependency does not override the build hook.
    #[error("build is not implemented for dependency {name}")]
    BuildNotImplemented {
        /// Name of the dependency.
        name: String,
    },

    /// A dependency is not in the build group its caller requires.
    #[error(
        "Expected the given list of dependencies to be in the {expected} build group, found: \
         {found} for dependency {dependency}. All dependency names subjected to this \
         requirement: {all}"
    )]
    BuildGroupMismatch {
        /// Required group.
        expected: String,
        /// Actual group of the offending dependency.
        found: String,
        /// Offending dependency name.
        dependency: String,
        /// Comma-separated names of every dependency checked.
        all: String,
    },

    /// A glob pattern used to copy build outputs is malformed.
    #[error("invalid glob pattern {pattern}: {reason}")]
    InvalidGlob {
        /// The offending pattern.
        pattern: String,
        /// Parser message.
        reason: String,
    },

    /// A path produced by the filesystem is not valid UTF-8.
    #[error("non UTF-8 path: {path}")]
    NonUtf8Path {
        /// Lossy rendering of the path.
        path: String,
    },

    /// A required compiler wrapper environment variable is not set.
    #[error("environment variable {name} is not set")]
    MissingEnvVar {
        /// Variable name.
        name: &'static str,
    },

    /// The compiled source includes a header from a disallowed directory.
    #[error("Disallowed include {path} (under {dir}) found while running: {command}")]
    DisallowedInclude {
        /// Canonical path of the included file.
        path: Utf8PathBuf,
        /// Disallowed directory it lies under.
        dir: Utf8PathBuf,
        /// Compiler command line that produced it.
        command: String,
    },

    /// An external tool failed.
    #[error(transparent)]
    Tool(#[from] ToolError),

    /// Linkage verification failed or could not run.
    #[error(transparent)]
    Linkage(#[from] CheckError),

    /// The configuration file is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// An I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to write output.
    #[error("failed to write output")]
    WriteFailed {
        /// The underlying error that caused the write to fail.
        #[source]
        source: std::io::Error,
    },
}

impl BuilderError {
    /// Returns `true` for errors caused by invalid definitions, settings or
    /// command-line input rather than by a failing tool.
    #[must_use]
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidBuildGroup { .. }
                | Self::InvalidBuildType { .. }
                | Self::UnsupportedArchive { .. }
                | Self::UnknownDependency { .. }
                | Self::BuildNotImplemented { .. }
                | Self::BuildGroupMismatch { .. }
                | Self::InvalidGlob { .. }
                | Self::MissingEnvVar { .. }
                | Self::Config(_)
                | Self::Linkage(CheckError::UnsupportedPlatform { .. })
        )
    }
}

/// Result type for builder operations.
pub type Result<T> = std::result::Result<T, BuilderError>;

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::group(BuilderError::InvalidBuildGroup { name: "instrumented".to_owned() }, true)]
    #[case::unknown(BuilderError::UnknownDependency { name: "zlib2".to_owned() }, true)]
    #[case::not_implemented(BuilderError::BuildNotImplemented { name: "foo".to_owned() }, true)]
    #[case::io(BuilderError::Io(std::io::Error::other("disk full")), false)]
    #[case::tool(
        BuilderError::Tool(ToolError::UnexpectedExitCode {
            command: "make".to_owned(),
            code: Some(2),
            expected: vec![0],
            output: String::new(),
        }),
        false
    )]
    fn classifies_configuration_errors(#[case] err: BuilderError, #[case] expected: bool) {
        assert_eq!(err.is_configuration_error(), expected);
    }

    #[test]
    fn build_group_mismatch_names_everything() {
        let err = BuilderError::BuildGroupMismatch {
            expected: "common".to_owned(),
            found: "potentially_instrumented".to_owned(),
            dependency: "snappy".to_owned(),
            all: "bison, snappy".to_owned(),
        };

        let message = err.to_string();
        assert!(message.contains("in the common build group"));
        assert!(message.contains("found: potentially_instrumented for dependency snappy"));
        assert!(message.ends_with("bison, snappy"));
    }

    #[test]
    fn tool_errors_are_transparent() {
        let err = BuilderError::from(ToolError::UnexpectedExitCode {
            command: "cmake ..".to_owned(),
            code: Some(1),
            expected: vec![0],
            output: "CMake Error".to_owned(),
        });

        assert!(err.to_string().contains("cmake .."));
    }
}
