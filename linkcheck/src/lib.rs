//! Post-build linkage verification for installed third-party binaries.
//!
//! After the dependencies are built, every executable and shared library
//! under `<thirdparty>/installed/<build type>/` is inspected with the
//! platform's dynamic-dependency tool (`ldd` or `otool -L`). Each output line
//! must match an allow-list of system locations, the third-party tree itself
//! or directories contributed by dependencies. On Linux unused `libatomic`
//! entries are stripped from needed lists first.
//!
//! # Modules
//!
//! - [`allow_list`] - Compiled set of allowed output patterns
//! - [`artifact`] - Installed file classification
//! - [`collect`] - Walking the installed tree
//! - [`error`] - Error types
//! - [`inspect`] - Per-artifact inspection
//! - [`load_commands`] - `otool -l` parsing
//! - [`needed_libs`] - Unused needed-library removal
//! - [`platform`] - Per-OS tool adapter
//! - [`verifier`] - The verification run

pub mod allow_list;
pub mod artifact;
pub mod collect;
pub mod error;
pub mod inspect;
pub mod load_commands;
pub mod needed_libs;
pub mod platform;
pub mod verifier;

pub use allow_list::{AllowList, AllowListPattern, PatternOrigin};
pub use artifact::{ArtifactKind, InstalledArtifact};
pub use error::{CheckError, Result};
pub use inspect::Violation;
pub use platform::Platform;
pub use verifier::{
    ArtifactFailure, LinkageVerifier, Phase, VerificationReport, VerifierSettings,
};
