//! Subprocess plumbing shared by the third-party builder and the linkage
//! checker.
//!
//! - [`command`] describes external commands and runs them through a
//!   swappable [`CommandExecutor`].
//! - [`error`] carries failures with the reproducible command line attached.
//! - `test_support` (behind the `test-support` feature) provides a scripted
//!   executor for tests.

pub mod command;
pub mod error;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use command::{
    CommandExecutor, SystemCommandExecutor, ToolCommand, capture_all_output, run_checked,
    shell_join, shell_quote, status_checked, stream_checked,
};
pub use error::{Result, ToolError};
