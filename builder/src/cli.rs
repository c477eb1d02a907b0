//! CLI argument definitions for the dependency builder.
//!
//! `build` is the default subcommand, so `thirdparty-build -d glog` builds
//! glog just like `thirdparty-build build -d glog`.

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};

/// Build and verify third-party native dependencies.
#[derive(Parser, Debug, Default)]
#[command(name = "thirdparty-build")]
#[command(version, about)]
#[command(long_about = concat!(
    "Build and verify third-party native dependencies.\n\n",
    "Dependencies in the common group are built once; the potentially ",
    "instrumented group is built once per requested build type ",
    "(uninstrumented, asan, tsan). After building, every installed ",
    "executable and shared library is checked against an allow-list of ",
    "system libraries.",
))]
#[command(after_help = concat!(
    "EXAMPLES:\n",
    "  Build everything for the configured build types:\n",
    "    $ thirdparty-build\n\n",
    "  Rebuild glog with ASAN only:\n",
    "    $ thirdparty-build -d glog --build-type asan --delete-build-dir\n\n",
    "  Verify the installed tree and print a JSON report:\n",
    "    $ thirdparty-build check --json\n\n",
    "  Remove build and source directories of snappy:\n",
    "    $ thirdparty-build clean -d snappy",
))]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Options shared by every subcommand.
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Build arguments (used when no subcommand is given).
    #[command(flatten)]
    pub build: BuildArgs,
}

/// Available subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Build dependencies and verify their linkage (default).
    Build(BuildArgs),

    /// Verify the linkage of the installed tree.
    Check(CheckArgs),

    /// Remove build directories, sources and optionally downloads.
    Clean(CleanArgs),

    /// List known dependencies.
    List(ListArgs),
}

/// Options accepted before or after any subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Third-party root directory [default: current directory].
    #[arg(long, global = true, value_name = "DIR")]
    pub thirdparty_dir: Option<Utf8PathBuf>,

    /// Configuration file [default: <thirdparty dir>/thirdparty.toml].
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<Utf8PathBuf>,

    /// Increase log verbosity (repeatable: -v, -vv).
    #[arg(
        short,
        long = "verbose",
        global = true,
        action = clap::ArgAction::Count,
        conflicts_with = "quiet"
    )]
    pub verbosity: u8,

    /// Only report errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

/// Arguments for the build command.
#[derive(Args, Debug, Clone, Default)]
pub struct BuildArgs {
    /// Instrumented build type to build (repeatable) [default: configured].
    #[arg(long, value_name = "TYPE")]
    pub build_type: Vec<String>,

    /// Build only the named dependency (repeatable).
    #[arg(short, long, value_name = "NAME")]
    pub dependency: Vec<String>,

    /// Leave the named dependency out (repeatable).
    #[arg(long, value_name = "NAME")]
    pub skip: Vec<String>,

    /// Parallel jobs passed to make and ninja.
    #[arg(short, long, value_name = "N")]
    pub jobs: Option<usize>,

    /// Remove each build directory before building into it.
    #[arg(long)]
    pub delete_build_dir: bool,

    /// Do not verify linkage after building.
    #[arg(long)]
    pub skip_check: bool,

    /// Report what would be built without running any step.
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the check command.
#[derive(Args, Debug, Clone, Default)]
pub struct CheckArgs {
    /// Print the verification report as JSON on stdout.
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the clean command.
#[derive(Args, Debug, Clone, Default)]
pub struct CleanArgs {
    /// Clean only the named dependency (repeatable) [default: all].
    #[arg(short, long, value_name = "NAME")]
    pub dependency: Vec<String>,

    /// Also remove downloaded archives.
    #[arg(long)]
    pub downloads: bool,
}

/// Arguments for the list command.
#[derive(Args, Debug, Clone, Default)]
pub struct ListArgs {
    /// Output in JSON format for scripting.
    #[arg(long)]
    pub json: bool,
}

impl Cli {
    /// Returns the effective build arguments.
    ///
    /// An explicit `build` subcommand wins over the top-level arguments.
    #[must_use]
    pub fn build_args(&self) -> &BuildArgs {
        match &self.command {
            Some(Command::Build(args)) => args,
            _ => &self.build,
        }
    }
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
