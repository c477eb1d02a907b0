//! Third-party dependency builder CLI entrypoint.
//!
//! Builds the bundled native dependencies group by group, then verifies that
//! every installed binary links only against approved libraries.

use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use std::io::Write;
use thirdparty_builder::cli::{Cli, Command};
use thirdparty_builder::context::BuildSettings;
use thirdparty_builder::definitions::all_dependencies;
use thirdparty_builder::dependency::Dependency;
use thirdparty_builder::error::{BuilderError, Result};
use thirdparty_builder::layout::FileSystemLayout;
use thirdparty_builder::output::write_stderr_line;
use thirdparty_builder::pipeline::{
    PipelineContext, build_settings, list_dependencies, load_config, perform_build,
    perform_clean, run_check,
};
use thirdparty_common::SystemCommandExecutor;
use thirdparty_linkcheck::Platform;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// File name of the compiler wrapper, installed next to this binary.
const COMPILER_WRAPPER_NAME: &str = "thirdparty-cc-wrapper";

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.global.verbosity, cli.global.quiet);
    let mut stdout = std::io::stdout();
    let mut stderr = std::io::stderr();
    let run_result = run(&cli, &mut stdout, &mut stderr);
    let exit_code = exit_code_for_run_result(run_result, &mut stderr);
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

/// Routes `log` records from the library crates to stderr.
fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn run(cli: &Cli, stdout: &mut dyn Write, stderr: &mut dyn Write) -> Result<()> {
    let cwd = current_dir()?;
    let thirdparty_dir = absolute_thirdparty_dir(cli.global.thirdparty_dir.as_deref(), &cwd);
    let config = load_config(&cli.global, &thirdparty_dir)?;
    let platform = Platform::detect()?;
    let layout = FileSystemLayout::new(thirdparty_dir);
    let executor = SystemCommandExecutor;
    let context = PipelineContext {
        layout: &layout,
        config: &config,
        platform,
        executor: &executor,
        quiet: cli.global.quiet,
    };
    let all = all_dependencies(platform)?;

    match &cli.command {
        Some(Command::Check(args)) => {
            let settings = BuildSettings::from_config(&config, platform)?;
            let deps: Vec<&dyn Dependency> = all.iter().map(Box::as_ref).collect();
            run_check(&context, &deps, &settings, args.json, stdout, stderr)
        }
        Some(Command::Clean(args)) => perform_clean(&context, &all, args, stderr).map(|_| ()),
        Some(Command::List(args)) => {
            list_dependencies(&all, args.json, stdout);
            Ok(())
        }
        Some(Command::Build(_)) | None => {
            let args = cli.build_args();
            let settings = build_settings(
                &context,
                args,
                cli.global.verbosity > 0,
                compiler_wrapper_path(),
            )?;
            perform_build(&context, &all, args, &settings, stderr).map(|_| ())
        }
    }
}

fn current_dir() -> Result<Utf8PathBuf> {
    let cwd = std::env::current_dir()?;
    Utf8PathBuf::try_from(cwd).map_err(|err| BuilderError::NonUtf8Path {
        path: err.as_path().display().to_string(),
    })
}

/// Resolves `--thirdparty-dir` against the working directory.
fn absolute_thirdparty_dir(requested: Option<&Utf8Path>, cwd: &Utf8Path) -> Utf8PathBuf {
    match requested {
        Some(dir) if dir.is_absolute() => dir.to_owned(),
        Some(dir) => cwd.join(dir),
        None => cwd.to_owned(),
    }
}

/// The compiler wrapper shipped alongside the running executable.
fn compiler_wrapper_path() -> Option<Utf8PathBuf> {
    let exe = std::env::current_exe().ok()?;
    let dir = Utf8PathBuf::from_path_buf(exe.parent()?.to_path_buf()).ok()?;
    Some(dir.join(COMPILER_WRAPPER_NAME))
}

fn exit_code_for_run_result(result: Result<()>, stderr: &mut dyn Write) -> i32 {
    match result {
        Ok(()) => 0,
        Err(err) => {
            write_stderr_line(stderr, err);
            1
        }
    }
}
