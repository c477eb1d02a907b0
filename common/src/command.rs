//! Subprocess execution behind a swappable executor.
//!
//! Every external tool the builder and the linkage checker touch (`make`,
//! `cmake`, `ldd`, `patchelf`, `otool`, ...) goes through [`CommandExecutor`],
//! so tests can replace the host system with a scripted stub. Commands are
//! described by [`ToolCommand`], which carries its environment and working
//! directory explicitly instead of relying on the parent process state.
//!
//! Three ways of running a command are offered: [`CommandExecutor::run`]
//! captures the output for parsing, [`CommandExecutor::stream`] hands each
//! output line over as it is produced, and [`CommandExecutor::status`]
//! leaves stdin, stdout and stderr attached to this process.

use crate::error::{Result, ToolError};
use camino::{Utf8Path, Utf8PathBuf};
use log::debug;
use std::collections::VecDeque;
use std::fmt;
use std::io::{BufRead, BufReader, Read};
use std::process::{Command, ExitStatus, Output, Stdio};
use std::sync::mpsc::{self, Sender};

/// Number of trailing output lines kept for the error of a failed streamed
/// command.
pub const FAILURE_OUTPUT_LINES: usize = 40;

/// A fully described external command.
///
/// # Examples
///
/// ```
/// use thirdparty_common::command::ToolCommand;
///
/// let cmd = ToolCommand::new("ldd")
///     .arg("/opt/tp/installed/common/lib/libz.so.1")
///     .env("LC_ALL", "en_US.UTF-8");
/// assert_eq!(cmd.program(), "ldd");
/// assert_eq!(cmd.command_line(), "ldd /opt/tp/installed/common/lib/libz.so.1");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    program: String,
    args: Vec<String>,
    envs: Vec<(String, String)>,
    current_dir: Option<Utf8PathBuf>,
}

impl ToolCommand {
    /// Creates a command for the given program with no arguments.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
            current_dir: None,
        }
    }

    /// Builds a command from an argv-style list, `argv[0]` being the program.
    ///
    /// Returns `None` for an empty list.
    #[must_use]
    pub fn from_argv<S: AsRef<str>>(argv: &[S]) -> Option<Self> {
        let (program, rest) = argv.split_first()?;
        Some(Self::new(program.as_ref()).args(rest.iter().map(AsRef::as_ref)))
    }

    /// Appends one argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends several arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Sets an environment variable for the child process only.
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    /// Sets several environment variables for the child process only.
    #[must_use]
    pub fn envs<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.envs
            .extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Runs the command from the given directory.
    #[must_use]
    pub fn current_dir(mut self, dir: impl Into<Utf8PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Returns the program name.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Returns the arguments, excluding the program.
    #[must_use]
    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    /// Returns the extra environment variables.
    #[must_use]
    pub fn env_vars(&self) -> &[(String, String)] {
        &self.envs
    }

    /// Returns the working directory, when one was set.
    #[must_use]
    pub fn working_dir(&self) -> Option<&Utf8Path> {
        self.current_dir.as_deref()
    }

    /// Returns the shell-quoted program and arguments.
    #[must_use]
    pub fn command_line(&self) -> String {
        shell_join(std::iter::once(self.program.as_str()).chain(self.args.iter().map(String::as_str)))
    }

    /// Converts the description into a [`std::process::Command`].
    #[must_use]
    pub fn to_std(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd.envs(self.envs.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        if let Some(dir) = &self.current_dir {
            cmd.current_dir(dir);
        }
        cmd
    }
}

impl fmt::Display for ToolCommand {
    /// Formats the command so that it can be pasted into a shell.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.current_dir {
            Some(dir) => write!(
                f,
                "( cd {}; {} )",
                shell_quote(dir.as_str()),
                self.command_line()
            ),
            None => f.write_str(&self.command_line()),
        }
    }
}

/// Abstraction for running external commands.
pub trait CommandExecutor {
    /// Runs a command with stdin closed and returns its captured output.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::Spawn`] when the process cannot be started.
    fn run(&self, command: &ToolCommand) -> Result<Output>;

    /// Runs a command, passing every line of its stdout and stderr to
    /// `on_line` as soon as it is read. Stdin is inherited.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::Spawn`] when the process cannot be started or
    /// waited for.
    fn stream(&self, command: &ToolCommand, on_line: &mut dyn FnMut(&str))
    -> Result<ExitStatus>;

    /// Runs a command with stdin, stdout and stderr inherited from this
    /// process.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::Spawn`] when the process cannot be started or
    /// waited for.
    fn status(&self, command: &ToolCommand) -> Result<ExitStatus>;
}

/// Executes commands on the host system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandExecutor;

impl CommandExecutor for SystemCommandExecutor {
    fn run(&self, command: &ToolCommand) -> Result<Output> {
        debug!("Running command: {command}");
        command
            .to_std()
            .output()
            .map_err(|source| spawn_error(command, source))
    }

    fn stream(
        &self,
        command: &ToolCommand,
        on_line: &mut dyn FnMut(&str),
    ) -> Result<ExitStatus> {
        debug!("Running command: {command}");
        let mut child = command
            .to_std()
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| spawn_error(command, source))?;
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let (sender, receiver) = mpsc::channel();
        std::thread::scope(|scope| {
            if let Some(stdout) = stdout {
                let sender = sender.clone();
                scope.spawn(move || forward_lines(stdout, &sender));
            }
            if let Some(stderr) = stderr {
                let sender = sender.clone();
                scope.spawn(move || forward_lines(stderr, &sender));
            }
            drop(sender);
            for line in receiver {
                on_line(&line);
            }
        });

        child.wait().map_err(|source| spawn_error(command, source))
    }

    fn status(&self, command: &ToolCommand) -> Result<ExitStatus> {
        debug!("Running command: {command}");
        command
            .to_std()
            .status()
            .map_err(|source| spawn_error(command, source))
    }
}

fn spawn_error(command: &ToolCommand, source: std::io::Error) -> ToolError {
    ToolError::Spawn {
        command: command.to_string(),
        source,
    }
}

/// Sends each line read from `reader` until end of file.
///
/// Reading continues after the receiver hangs up so that the child never
/// blocks on a full pipe.
fn forward_lines(reader: impl Read, sender: &Sender<String>) {
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) | Err(_) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                let _ = sender.send(line.trim_end_matches(['\n', '\r']).to_owned());
            }
        }
    }
}

/// Runs a command and returns its stdout and stderr as lines.
///
/// Exit code zero is always accepted; `allowed_exit_codes` lists further
/// codes that are not treated as failures. `ldd` and `patchelf`, for
/// example, exit with 1 for perfectly inspectable files.
///
/// # Errors
///
/// Returns [`ToolError::UnexpectedExitCode`] for any other exit status, with
/// the combined output attached.
pub fn capture_all_output(
    executor: &dyn CommandExecutor,
    command: &ToolCommand,
    allowed_exit_codes: &[i32],
) -> Result<Vec<String>> {
    let output = executor.run(command)?;
    let combined = combined_output(&output);
    let code = output.status.code();

    if output.status.success() {
        return Ok(split_lines(&combined));
    }

    match code {
        Some(code) if allowed_exit_codes.contains(&code) => {
            debug!("{command} returned allowed exit code {code}");
            Ok(split_lines(&combined))
        }
        _ => {
            let mut expected = vec![0];
            expected.extend_from_slice(allowed_exit_codes);
            Err(ToolError::UnexpectedExitCode {
                command: command.to_string(),
                code,
                expected,
                output: combined,
            })
        }
    }
}

/// Runs a command that must exit successfully.
///
/// # Errors
///
/// Returns [`ToolError::UnexpectedExitCode`] for any non-zero status.
pub fn run_checked(executor: &dyn CommandExecutor, command: &ToolCommand) -> Result<Output> {
    let output = executor.run(command)?;
    if output.status.success() {
        return Ok(output);
    }
    Err(ToolError::UnexpectedExitCode {
        command: command.to_string(),
        code: output.status.code(),
        expected: vec![0],
        output: combined_output(&output),
    })
}

/// Runs a command through [`CommandExecutor::stream`] and fails unless it
/// exits successfully.
///
/// # Errors
///
/// Returns [`ToolError::UnexpectedExitCode`] for any non-zero status, with the
/// last [`FAILURE_OUTPUT_LINES`] output lines attached.
pub fn stream_checked(
    executor: &dyn CommandExecutor,
    command: &ToolCommand,
    on_line: &mut dyn FnMut(&str),
) -> Result<()> {
    let mut tail = VecDeque::with_capacity(FAILURE_OUTPUT_LINES);
    let status = executor.stream(command, &mut |line| {
        if tail.len() == FAILURE_OUTPUT_LINES {
            tail.pop_front();
        }
        tail.push_back(line.to_owned());
        on_line(line);
    })?;
    if status.success() {
        return Ok(());
    }
    Err(ToolError::UnexpectedExitCode {
        command: command.to_string(),
        code: status.code(),
        expected: vec![0],
        output: Vec::from(tail).join("\n"),
    })
}

/// Runs a command through [`CommandExecutor::status`] and fails unless it
/// exits successfully. The output has already gone to the terminal.
///
/// # Errors
///
/// Returns [`ToolError::UnexpectedExitCode`] for any non-zero status.
pub fn status_checked(executor: &dyn CommandExecutor, command: &ToolCommand) -> Result<()> {
    let status = executor.status(command)?;
    if status.success() {
        return Ok(());
    }
    Err(ToolError::UnexpectedExitCode {
        command: command.to_string(),
        code: status.code(),
        expected: vec![0],
        output: String::new(),
    })
}

/// Joins stdout and stderr of a finished process.
///
/// The last stdout line is terminated before stderr is appended, so lines
/// of the two streams never run together.
#[must_use]
pub fn combined_output(output: &Output) -> String {
    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    if !output.stderr.is_empty() && !text.is_empty() && !text.ends_with('\n') {
        text.push('\n');
    }
    text.push_str(&String::from_utf8_lossy(&output.stderr));
    text
}

fn split_lines(text: &str) -> Vec<String> {
    text.lines().map(str::to_owned).collect()
}

/// Quotes one word for a POSIX shell.
///
/// # Examples
///
/// ```
/// use thirdparty_common::command::shell_quote;
///
/// assert_eq!(shell_quote("-DCMAKE_BUILD_TYPE=Release"), "-DCMAKE_BUILD_TYPE=Release");
/// assert_eq!(shell_quote("a b"), "'a b'");
/// assert_eq!(shell_quote(""), "''");
/// ```
#[must_use]
pub fn shell_quote(word: &str) -> String {
    let is_safe = |c: char| c.is_ascii_alphanumeric() || "@%+=:,./-_".contains(c);
    if !word.is_empty() && word.chars().all(is_safe) {
        return word.to_owned();
    }
    format!("'{}'", word.replace('\'', r#"'"'"'"#))
}

/// Joins words into one shell-quoted command line.
#[must_use]
pub fn shell_join<'a>(words: impl IntoIterator<Item = &'a str>) -> String {
    words
        .into_iter()
        .map(shell_quote)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{
        ExpectedCall, RunMode, StubExecutor, exit_status, failure_output, output_with_stdout,
    };
    use rstest::rstest;

    #[rstest]
    #[case::plain("ldd", "ldd")]
    #[case::spaces("my lib.so", "'my lib.so'")]
    #[case::quote("it's", r#"'it'"'"'s'"#)]
    #[case::dollar("$HOME", "'$HOME'")]
    fn shell_quote_escapes_unsafe_words(#[case] word: &str, #[case] expected: &str) {
        assert_eq!(shell_quote(word), expected);
    }

    #[test]
    fn display_includes_working_directory() {
        let cmd = ToolCommand::new("make")
            .arg("-j4")
            .current_dir("/tmp/build dir");
        assert_eq!(cmd.to_string(), "( cd '/tmp/build dir'; make -j4 )");
    }

    #[test]
    fn from_argv_splits_program() {
        let cmd = ToolCommand::from_argv(&["autoreconf", "-fvi"]).expect("non-empty argv");
        assert_eq!(cmd.program(), "autoreconf");
        assert_eq!(cmd.arguments(), ["-fvi".to_owned()]);
        assert!(ToolCommand::from_argv::<&str>(&[]).is_none());
    }

    #[test]
    fn capture_accepts_allowed_exit_code() {
        let executor = StubExecutor::new(vec![ExpectedCall::new(
            "ldd",
            ["-u", "/lib/libx.so"],
            Ok(output_with_stdout(1, "Unused direct dependencies:\n\t/lib64/libatomic.so.1\n")),
        )]);
        let cmd = ToolCommand::new("ldd").args(["-u", "/lib/libx.so"]);

        let lines = capture_all_output(&executor, &cmd, &[1]).expect("exit 1 is allowed");

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1], "\t/lib64/libatomic.so.1");
        executor.assert_finished();
    }

    #[test]
    fn capture_rejects_unlisted_exit_code() {
        let executor = StubExecutor::new(vec![ExpectedCall::new(
            "patchelf",
            ["--print-needed", "/x"],
            Ok(output_with_stdout(2, "boom")),
        )]);
        let cmd = ToolCommand::new("patchelf").args(["--print-needed", "/x"]);

        let err = capture_all_output(&executor, &cmd, &[1]).expect_err("exit 2 is not allowed");

        match err {
            ToolError::UnexpectedExitCode {
                code,
                expected,
                output,
                ..
            } => {
                assert_eq!(code, Some(2));
                assert_eq!(expected, vec![0, 1]);
                assert_eq!(output, "boom");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn run_checked_fails_on_non_zero_exit() {
        let executor = StubExecutor::new(vec![ExpectedCall::new(
            "make",
            ["install"],
            Ok(std::process::Output {
                status: exit_status(2),
                stdout: Vec::new(),
                stderr: b"no rule to make target".to_vec(),
            }),
        )]);
        let cmd = ToolCommand::new("make").arg("install");

        let err = run_checked(&executor, &cmd).expect_err("make failed");

        assert!(err.to_string().contains("make install"));
    }

    #[test]
    fn stderr_never_joins_an_unterminated_stdout_line() {
        let output = std::process::Output {
            status: exit_status(0),
            stdout: b"\tlibfoo.so => /lib/libfoo.so (0x1)".to_vec(),
            stderr: b"ldd: warning: you do not have execution permission\n".to_vec(),
        };
        let executor = StubExecutor::new(vec![ExpectedCall::new("ldd", ["/x"], Ok(output))]);

        let lines = capture_all_output(&executor, &ToolCommand::new("ldd").arg("/x"), &[1])
            .expect("ldd succeeded");

        assert_eq!(
            lines,
            [
                "\tlibfoo.so => /lib/libfoo.so (0x1)",
                "ldd: warning: you do not have execution permission",
            ]
        );
    }

    #[rstest]
    #[case::only_stdout(b"a\nb".as_slice(), b"".as_slice(), "a\nb")]
    #[case::only_stderr(b"".as_slice(), b"oops\n".as_slice(), "oops\n")]
    #[case::terminated(b"a\n".as_slice(), b"b\n".as_slice(), "a\nb\n")]
    #[case::unterminated(b"a".as_slice(), b"b".as_slice(), "a\nb")]
    fn combined_output_keeps_streams_on_separate_lines(
        #[case] stdout: &[u8],
        #[case] stderr: &[u8],
        #[case] expected: &str,
    ) {
        let output = std::process::Output {
            status: exit_status(0),
            stdout: stdout.to_vec(),
            stderr: stderr.to_vec(),
        };
        assert_eq!(combined_output(&output), expected);
    }

    #[test]
    fn stream_checked_hands_over_lines_and_keeps_the_tail_on_failure() {
        let many = (0..FAILURE_OUTPUT_LINES + 5)
            .map(|n| format!("line {n}\n"))
            .collect::<String>();
        let executor = StubExecutor::new(vec![
            ExpectedCall::new("make", ["-j2"], Ok(output_with_stdout(0, "CC a.o\nCC b.o\n"))),
            ExpectedCall::new("make", ["install"], Ok(output_with_stdout(2, &many))),
        ]);
        let mut seen = Vec::new();

        stream_checked(&executor, &ToolCommand::new("make").arg("-j2"), &mut |line| {
            seen.push(line.to_owned());
        })
        .expect("make succeeded");
        let err = stream_checked(&executor, &ToolCommand::new("make").arg("install"), &mut |_| {})
            .expect_err("make install failed");

        assert_eq!(seen, ["CC a.o", "CC b.o"]);
        assert_eq!(executor.modes(), [RunMode::Streamed, RunMode::Streamed]);
        match err {
            ToolError::UnexpectedExitCode { code, output, .. } => {
                assert_eq!(code, Some(2));
                assert_eq!(output.lines().count(), FAILURE_OUTPUT_LINES);
                assert!(output.starts_with("line 5\n"));
                assert!(output.ends_with(&format!("line {}", FAILURE_OUTPUT_LINES + 4)));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn status_checked_reports_the_exit_code() {
        let executor = StubExecutor::new(vec![ExpectedCall::new(
            "clang",
            ["-E", "a.c"],
            Ok(failure_output("a.c:1: error")),
        )]);

        let err = status_checked(&executor, &ToolCommand::new("clang").args(["-E", "a.c"]))
            .expect_err("preprocessing failed");

        assert_eq!(executor.modes(), [RunMode::Inherited]);
        assert!(matches!(err, ToolError::UnexpectedExitCode { code: Some(1), .. }));
    }

    #[cfg(unix)]
    #[test]
    fn system_executor_streams_both_pipes() {
        let command = ToolCommand::new("sh").args(["-c", "echo out; printf err >&2"]);
        let mut lines = Vec::new();

        let status = SystemCommandExecutor
            .stream(&command, &mut |line| lines.push(line.to_owned()))
            .expect("sh runs");

        lines.sort();
        assert!(status.success());
        assert_eq!(lines, ["err", "out"]);
    }

    #[cfg(unix)]
    #[test]
    fn system_executor_status_reports_exit_code() {
        let status = SystemCommandExecutor
            .status(&ToolCommand::new("sh").args(["-c", "exit 3"]))
            .expect("sh runs");

        assert_eq!(status.code(), Some(3));
    }
}
