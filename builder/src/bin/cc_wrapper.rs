//! Compiler wrapper invoked by third-party build systems as `CC` and `CXX`.
//!
//! Reads its policy from `THIRDPARTY_*` environment variables, runs the real
//! compiler and exits with the compiler's exit code.

use camino::Utf8PathBuf;
use std::io::Write;
use thirdparty_builder::compiler_wrapper::{CompilerWrapper, Language, WrapperSettings};
use thirdparty_builder::error::{BuilderError, Result};
use thirdparty_common::SystemCommandExecutor;

fn main() {
    let argv: Vec<String> = std::env::args().collect();
    let mut stderr = std::io::stderr();
    let exit_code = match run(&argv, &mut stderr) {
        Ok(code) => code,
        Err(err) => {
            write_stderr_line(&mut stderr, err);
            1
        }
    };
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

fn run(argv: &[String], stderr: &mut dyn Write) -> Result<i32> {
    let (language, args) = Language::from_argv(argv);
    let settings = WrapperSettings::from_env(language, |name| std::env::var(name).ok())?;
    let cwd = Utf8PathBuf::try_from(std::env::current_dir()?).map_err(|err| {
        BuilderError::NonUtf8Path {
            path: err.as_path().display().to_string(),
        }
    })?;

    let executor = SystemCommandExecutor;
    CompilerWrapper::new(settings, args, cwd, &executor).run(stderr)
}

fn write_stderr_line(stderr: &mut dyn Write, message: impl std::fmt::Display) {
    if writeln!(stderr, "{message}").is_err() {
        // Best-effort reporting; ignore write failures.
    }
}
