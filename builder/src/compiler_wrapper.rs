//! The compiler wrapper that third-party build systems invoke as `CC`/`CXX`.
//!
//! The builder points `CC` at `thirdparty-cc-wrapper --cc` (and `CXX` at
//! `--cxx`) and passes the real compilers and the wrapper policy through
//! `THIRDPARTY_*` variables (see [`crate::env_vars`]). For each invocation
//! the wrapper:
//!
//! 1. drops `-I` arguments that name a disallowed include directory;
//! 2. when linking a shared library, appends and removes the configured
//!    linker flags;
//! 3. when compiling a single object from a non-assembly source, runs the
//!    preprocessor first and fails if any included file lies under a
//!    disallowed directory;
//! 4. runs the real compiler, optionally through `ccache`, and propagates
//!    its exit status.
//!
//! Both the preprocessor and the compiler inherit the wrapper's stdin,
//! stdout and stderr, so diagnostics reach the build system as they are
//! written and sources piped in on stdin reach the compiler.

use crate::env_vars;
use crate::error::{BuilderError, Result};
use camino::{Utf8Path, Utf8PathBuf};
use log::debug;
use std::collections::BTreeSet;
use std::io::Write;
use thirdparty_common::command::shell_join;
use thirdparty_common::{CommandExecutor, ToolCommand, status_checked};
use thirdparty_linkcheck::artifact::is_shared_library_name;

/// Marker of a file-entry line in preprocessor output.
const LINE_MARKER: &str = "# 1 \"";

/// Language the wrapper compiles.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Language {
    /// C, run with the real C compiler.
    C,
    /// C++, run with the real C++ compiler.
    Cxx,
}

impl Language {
    /// Variable holding the real compiler for this language.
    #[must_use]
    pub const fn real_compiler_var(self) -> &'static str {
        match self {
            Self::C => env_vars::REAL_C_COMPILER,
            Self::Cxx => env_vars::REAL_CXX_COMPILER,
        }
    }

    /// Splits the wrapper's own argv into the language and the compiler
    /// arguments.
    ///
    /// A leading `--cc` or `--cxx` selects the language. Without one, a
    /// program name containing `++` or ending in `cxx` selects C++.
    ///
    /// # Examples
    ///
    /// ```
    /// use thirdparty_builder::compiler_wrapper::Language;
    ///
    /// let argv = ["thirdparty-cc-wrapper", "--cxx", "-c", "a.cc"].map(String::from);
    /// let (language, args) = Language::from_argv(&argv);
    /// assert_eq!(language, Language::Cxx);
    /// assert_eq!(args, ["-c", "a.cc"]);
    /// ```
    #[must_use]
    pub fn from_argv(argv: &[String]) -> (Self, &[String]) {
        let Some((program, rest)) = argv.split_first() else {
            return (Self::C, argv);
        };
        match rest.split_first() {
            Some((mode, args)) if mode == "--cc" => (Self::C, args),
            Some((mode, args)) if mode == "--cxx" => (Self::Cxx, args),
            _ => {
                let name = Utf8Path::new(program).file_name().unwrap_or(program);
                if name.contains("++") || name.ends_with("cxx") {
                    (Self::Cxx, rest)
                } else {
                    (Self::C, rest)
                }
            }
        }
    }
}

/// Wrapper policy read from the environment.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WrapperSettings {
    /// Compiler the wrapper delegates to.
    pub real_compiler: String,
    /// Include directories no compilation may use.
    pub disallowed_include_dirs: Vec<Utf8PathBuf>,
    /// Run the compiler through `ccache`.
    pub use_ccache: bool,
    /// Echo the command before running it.
    pub verbose: bool,
    /// Linker flags appended to shared library links.
    pub ld_flags_to_append: Vec<String>,
    /// Linker flags removed from shared library links.
    pub ld_flags_to_remove: Vec<String>,
}

impl WrapperSettings {
    /// Reads the settings through `lookup`, normally `std::env::var`.
    ///
    /// # Errors
    ///
    /// Returns [`BuilderError::MissingEnvVar`] when the real compiler for
    /// `language` is not set or empty.
    pub fn from_env(language: Language, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = language.real_compiler_var();
        let real_compiler = lookup(var)
            .filter(|value| !value.trim().is_empty())
            .ok_or(BuilderError::MissingEnvVar { name: var })?;

        let disallowed_include_dirs: Vec<Utf8PathBuf> = lookup(env_vars::DISALLOWED_INCLUDE_DIRS)
            .map(|dirs| {
                dirs.split(':')
                    .filter(|dir| !dir.is_empty())
                    .map(Utf8PathBuf::from)
                    .collect()
            })
            .unwrap_or_default();
        let words = |name: &str| -> Vec<String> {
            lookup(name)
                .map(|value| value.split_whitespace().map(str::to_owned).collect())
                .unwrap_or_default()
        };

        Ok(Self {
            real_compiler,
            disallowed_include_dirs,
            use_ccache: env_vars::is_truthy(lookup(env_vars::USE_CCACHE).as_deref()),
            verbose: env_vars::is_truthy(lookup(env_vars::VERBOSE).as_deref()),
            ld_flags_to_append: words(env_vars::LD_FLAGS_TO_APPEND),
            ld_flags_to_remove: words(env_vars::LD_FLAGS_TO_REMOVE),
        })
    }
}

/// Drops `-I<dir>` arguments naming a disallowed directory, quoted or not.
///
/// # Examples
///
/// ```
/// use camino::Utf8PathBuf;
/// use thirdparty_builder::compiler_wrapper::filter_include_args;
///
/// let args = ["-I/usr/local/include", "-I\"/usr/local/include\"", "-Iinclude", "-c"]
///     .map(String::from);
/// let disallowed = [Utf8PathBuf::from("/usr/local/include")];
/// assert_eq!(filter_include_args(&args, &disallowed), ["-Iinclude", "-c"]);
/// ```
#[must_use]
pub fn filter_include_args(args: &[String], disallowed: &[Utf8PathBuf]) -> Vec<String> {
    args.iter()
        .filter(|arg| {
            let Some(dir) = arg.strip_prefix("-I") else {
                return true;
            };
            let dir = dir
                .strip_prefix('"')
                .and_then(|rest| rest.strip_suffix('"'))
                .unwrap_or(dir);
            !disallowed.iter().any(|path| path.as_str() == dir)
        })
        .cloned()
        .collect()
}

/// Returns every argument that follows `-o`.
#[must_use]
pub fn output_files(args: &[String]) -> Vec<&str> {
    args.windows(2)
        .filter_map(|pair| match pair {
            [flag, output] if flag == "-o" => Some(output.as_str()),
            _ => None,
        })
        .collect()
}

/// Extracts included file paths from preprocessor output.
///
/// Only `# 1 "<path>"` markers are considered; pseudo-files such as
/// `<built-in>` are skipped.
#[must_use]
pub fn included_files(preprocessed: &str) -> BTreeSet<String> {
    preprocessed
        .lines()
        .filter_map(|line| line.strip_prefix(LINE_MARKER))
        .filter(|rest| !rest.starts_with('<'))
        .filter_map(|rest| rest.split_once('"').map(|(path, _)| path.to_owned()))
        .collect()
}

/// One compiler invocation under the wrapper policy.
pub struct CompilerWrapper<'a> {
    settings: WrapperSettings,
    args: Vec<String>,
    cwd: Utf8PathBuf,
    executor: &'a dyn CommandExecutor,
}

impl<'a> CompilerWrapper<'a> {
    /// Prepares an invocation; disallowed `-I` arguments are dropped here.
    #[must_use]
    pub fn new(
        settings: WrapperSettings,
        args: &[String],
        cwd: Utf8PathBuf,
        executor: &'a dyn CommandExecutor,
    ) -> Self {
        let args = filter_include_args(args, &settings.disallowed_include_dirs);
        Self {
            settings,
            args,
            cwd,
            executor,
        }
    }

    /// Compiler arguments after filtering.
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    fn compiler_command_line(&self) -> String {
        shell_join(
            std::iter::once(self.settings.real_compiler.as_str())
                .chain(self.args.iter().map(String::as_str)),
        )
    }

    /// The command that performs the actual compilation or link.
    #[must_use]
    pub fn compile_command(&self) -> ToolCommand {
        let (program, mut args) = if self.settings.use_ccache {
            ("ccache".to_owned(), vec!["compiler".to_owned()])
        } else {
            (self.settings.real_compiler.clone(), Vec::new())
        };
        args.extend(self.args.iter().cloned());

        let links_shared_library = output_files(&self.args)
            .into_iter()
            .any(is_shared_library_name);
        if links_shared_library {
            args.extend(self.settings.ld_flags_to_append.iter().cloned());
            args.retain(|arg| !self.settings.ld_flags_to_remove.contains(arg));
        }

        let mut command = ToolCommand::new(program)
            .args(args)
            .current_dir(self.cwd.clone());
        if self.settings.use_ccache {
            command = command.env("CCACHE_COMPILER", self.settings.real_compiler.clone());
        }
        command
    }

    /// The preprocessor-only command and the file it writes, when this
    /// invocation compiles exactly one object from a non-assembly source.
    ///
    /// A source read from stdin (`-`) can only be consumed once, so such
    /// invocations skip the pass.
    #[must_use]
    pub fn preprocess_command(&self) -> Option<(ToolCommand, Utf8PathBuf)> {
        let outputs = output_files(&self.args);
        let [object] = outputs.as_slice() else {
            return None;
        };
        if !object.ends_with(".o")
            || self
                .args
                .iter()
                .any(|arg| arg.ends_with(".s") || arg == "-")
        {
            return None;
        }

        let pp_output = format!("{object}.pp");
        let mut args = Vec::with_capacity(self.args.len() + 1);
        let mut output_follows = false;
        for arg in &self.args {
            if output_follows {
                args.push(pp_output.clone());
            } else {
                args.push(arg.clone());
            }
            output_follows = arg == "-o";
        }
        args.push("-E".to_owned());

        let command = ToolCommand::new(self.settings.real_compiler.clone())
            .args(args)
            .current_dir(self.cwd.clone());
        Some((command, self.cwd.join(pp_output)))
    }

    /// Runs the preprocessor pass, if any, and rejects disallowed includes.
    ///
    /// # Errors
    ///
    /// Returns [`BuilderError::DisallowedInclude`] for the first included
    /// file under a disallowed directory, or the error of the failing
    /// preprocessor run.
    pub fn check_includes(&self) -> Result<()> {
        if self.settings.disallowed_include_dirs.is_empty() {
            return Ok(());
        }
        let Some((command, pp_output)) = self.preprocess_command() else {
            return Ok(());
        };
        status_checked(self.executor, &command)?;
        let text = std::fs::read_to_string(&pp_output)?;

        for file in included_files(&text) {
            let real = self.canonical(&file);
            debug!("Included: {real}");
            if let Some(dir) = self
                .settings
                .disallowed_include_dirs
                .iter()
                .find(|dir| real.starts_with(dir))
            {
                return Err(BuilderError::DisallowedInclude {
                    path: real,
                    dir: dir.clone(),
                    command: self.compiler_command_line(),
                });
            }
        }
        Ok(())
    }

    fn canonical(&self, file: &str) -> Utf8PathBuf {
        self.cwd
            .join(file)
            .canonicalize_utf8()
            .unwrap_or_else(|_| Utf8PathBuf::from(file))
    }

    /// Checks includes and runs the compiler on the wrapper's own stdio.
    ///
    /// Returns the compiler's exit code; a compiler killed by a signal
    /// counts as 1. `stderr` receives only the wrapper's own messages.
    ///
    /// # Errors
    ///
    /// Returns an error when an include check fails, the compiler cannot be
    /// started or a message cannot be written.
    pub fn run(&self, stderr: &mut dyn Write) -> Result<i32> {
        self.check_includes()?;

        let command = self.compile_command();
        if self.settings.verbose {
            writeln!(stderr, "Running command: {command}")
                .map_err(|source| BuilderError::WriteFailed { source })?;
        }

        let code = self.executor.status(&command)?.code().unwrap_or(1);
        if code != 0 {
            writeln!(stderr, "Command failed with exit code {code}: {command}")
                .map_err(|source| BuilderError::WriteFailed { source })?;
        }
        Ok(code)
    }
}

#[cfg(test)]
#[path = "compiler_wrapper_tests.rs"]
mod tests;
