//! Scripted command execution for tests.
//!
//! Only compiled for this crate's tests or when the `test-support` feature is
//! enabled by a dependent crate's dev-dependencies.

use crate::command::{CommandExecutor, ToolCommand, combined_output};
use crate::error::{Result, ToolError};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::process::{ExitStatus, Output};

/// Creates an `ExitStatus` from an exit code (Unix implementation).
#[cfg(unix)]
#[must_use]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::unix::process::ExitStatusExt;

    ExitStatus::from_raw(code << 8)
}

/// Creates an `ExitStatus` from an exit code (Windows implementation).
#[cfg(windows)]
#[must_use]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::windows::process::ExitStatusExt;

    ExitStatus::from_raw(code.cast_unsigned())
}

/// Creates a successful `Output` with empty stdout and stderr.
#[must_use]
pub fn success_output() -> Output {
    output_with_stdout(0, "")
}

/// Creates an `Output` with the given exit code and stdout text.
#[must_use]
pub fn output_with_stdout(code: i32, stdout: &str) -> Output {
    Output {
        status: exit_status(code),
        stdout: stdout.as_bytes().to_vec(),
        stderr: Vec::new(),
    }
}

/// Creates a failed `Output` (exit code 1) with the given stderr message.
#[must_use]
pub fn failure_output(stderr: &str) -> Output {
    Output {
        status: exit_status(1),
        stdout: Vec::new(),
        stderr: stderr.as_bytes().to_vec(),
    }
}

/// An expected command invocation and the result to hand back.
#[derive(Debug)]
pub struct ExpectedCall {
    /// Program name (e.g. `ldd`).
    pub program: String,
    /// Arguments, excluding the program.
    pub args: Vec<String>,
    /// Result returned when the invocation matches.
    pub result: Result<Output>,
}

impl ExpectedCall {
    /// Creates an expectation for `program args...`.
    pub fn new<I, S>(program: &str, args: I, result: Result<Output>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.to_owned(),
            args: args.into_iter().map(Into::into).collect(),
            result,
        }
    }
}

/// Which [`CommandExecutor`] method ran a command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunMode {
    /// [`CommandExecutor::run`]: output captured.
    Captured,
    /// [`CommandExecutor::stream`]: output handed over line by line.
    Streamed,
    /// [`CommandExecutor::status`]: stdio inherited.
    Inherited,
}

/// A [`CommandExecutor`] that replays expected invocations in order.
///
/// Each call is compared against the next expectation; a mismatch yields
/// [`ToolError::StubMismatch`] so the test fails with a readable message.
/// Every executed command is also recorded for later inspection, together
/// with the method that ran it. Streamed calls replay the scripted stdout
/// lines, then the stderr lines.
#[derive(Debug, Default)]
pub struct StubExecutor {
    expected: RefCell<VecDeque<ExpectedCall>>,
    executed: RefCell<Vec<ToolCommand>>,
    modes: RefCell<Vec<RunMode>>,
}

impl StubExecutor {
    /// Creates a stub with the given expected calls.
    #[must_use]
    pub fn new(expected: Vec<ExpectedCall>) -> Self {
        Self {
            expected: RefCell::new(expected.into()),
            executed: RefCell::new(Vec::new()),
            modes: RefCell::new(Vec::new()),
        }
    }

    /// Queues one more expected call.
    pub fn push(&self, call: ExpectedCall) {
        self.expected.borrow_mut().push_back(call);
    }

    /// Returns every command that was run, in order.
    #[must_use]
    pub fn executed(&self) -> Vec<ToolCommand> {
        self.executed.borrow().clone()
    }

    /// Returns how each executed command was run, in order.
    #[must_use]
    pub fn modes(&self) -> Vec<RunMode> {
        self.modes.borrow().clone()
    }

    /// Asserts that all expected command invocations have been consumed.
    ///
    /// # Panics
    ///
    /// Panics if there are remaining expected calls that were not invoked.
    pub fn assert_finished(&self) {
        let remaining = self.expected.borrow();
        assert!(
            remaining.is_empty(),
            "expected no further command invocations, {} left (next: {:?})",
            remaining.len(),
            remaining.front().map(|call| &call.program)
        );
    }
}

impl StubExecutor {
    fn replay(&self, command: &ToolCommand, mode: RunMode) -> Result<Output> {
        self.executed.borrow_mut().push(command.clone());
        self.modes.borrow_mut().push(mode);

        let Some(call) = self.expected.borrow_mut().pop_front() else {
            return Err(ToolError::StubMismatch {
                message: format!("unexpected command invocation: {command}"),
            });
        };

        if call.program != command.program() || call.args.as_slice() != command.arguments() {
            return Err(ToolError::StubMismatch {
                message: format!(
                    "expected `{} {}`, got `{}`",
                    call.program,
                    call.args.join(" "),
                    command.command_line()
                ),
            });
        }

        call.result
    }
}

impl CommandExecutor for StubExecutor {
    fn run(&self, command: &ToolCommand) -> Result<Output> {
        self.replay(command, RunMode::Captured)
    }

    fn stream(
        &self,
        command: &ToolCommand,
        on_line: &mut dyn FnMut(&str),
    ) -> Result<ExitStatus> {
        let output = self.replay(command, RunMode::Streamed)?;
        for line in combined_output(&output).lines() {
            on_line(line);
        }
        Ok(output.status)
    }

    fn status(&self, command: &ToolCommand) -> Result<ExitStatus> {
        self.replay(command, RunMode::Inherited)
            .map(|output| output.status)
    }
}
