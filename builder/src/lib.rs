//! Third-party native dependency builder.
//!
//! This crate builds the native packages a larger project links against.
//! Dependencies are described by immutable descriptors, grouped into a
//! `common` group (built once) and a `potentially_instrumented` group (built
//! once per sanitizer build type), and installed under
//! `<thirdparty>/installed/<build type>/`. After a build the installed tree is
//! handed to [`thirdparty_linkcheck`] for linkage verification.
//!
//! # Modules
//!
//! - [`build_type`] - Build types and build groups
//! - [`cli`] - Command-line argument definitions
//! - [`compiler_wrapper`] - Include and link policy of `thirdparty-cc-wrapper`
//! - [`context`] - Run-wide settings and per-build-type contexts
//! - [`definitions`] - Build definitions of the bundled packages
//! - [`dependency`] - The trait every definition implements
//! - [`descriptor`] - Immutable package metadata
//! - [`env_vars`] - Variables shared with the compiler wrapper
//! - [`error`] - Error types
//! - [`layout`] - Third-party directory layout
//! - [`output`] - CLI output formatting
//! - [`pipeline`] - Build, check, clean and list orchestration
//! - [`probe`] - Optional tool detection
//! - [`scheduler`] - Build ordering by group and build type
//! - [`session`] - One dependency build and its file helpers
//! - [`strategy`] - Configure, CMake and make strategies

pub mod build_type;
pub mod cli;
pub mod compiler_wrapper;
pub mod context;
pub mod definitions;
pub mod dependency;
pub mod descriptor;
pub mod env_vars;
pub mod error;
pub mod layout;
pub mod output;
pub mod pipeline;
pub mod probe;
pub mod scheduler;
pub mod session;
pub mod strategy;

#[cfg(test)]
mod test_utils;
