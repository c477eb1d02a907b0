//! A single dependency build for one build type.
//!
//! [`BuildSession`] is what a definition's [`Dependency::build`] receives. It
//! knows the build and source directories, runs steps through the command
//! executor with the dependency's environment, and offers the file helpers
//! custom builds need. The configure, CMake and make strategies live in
//! [`crate::strategy`].

use crate::context::BuildContext;
use crate::dependency::Dependency;
use crate::error::{BuilderError, Result};
use crate::probe::ToolAvailability;
use camino::{Utf8Path, Utf8PathBuf};
use log::info;
use thirdparty_common::{CommandExecutor, ToolCommand, stream_checked};
use walkdir::WalkDir;

/// Builds one dependency for one build type.
pub struct BuildSession<'a> {
    context: BuildContext<'a>,
    dependency: &'a dyn Dependency,
    executor: &'a dyn CommandExecutor,
    tools: &'a ToolAvailability,
    env: Vec<(String, String)>,
}

impl<'a> BuildSession<'a> {
    /// Creates a session; the build environment is computed once here.
    #[must_use]
    pub fn new(
        context: BuildContext<'a>,
        dependency: &'a dyn Dependency,
        executor: &'a dyn CommandExecutor,
        tools: &'a ToolAvailability,
    ) -> Self {
        let env = context.build_env(dependency);
        Self {
            context,
            dependency,
            executor,
            tools,
            env,
        }
    }

    /// Context of the build type being produced.
    #[must_use]
    pub fn context(&self) -> &BuildContext<'a> {
        &self.context
    }

    /// The dependency being built.
    #[must_use]
    pub fn dependency(&self) -> &'a dyn Dependency {
        self.dependency
    }

    /// Host tool availability.
    #[must_use]
    pub fn tools(&self) -> &'a ToolAvailability {
        self.tools
    }

    /// Environment every step runs with.
    #[must_use]
    pub fn env(&self) -> &[(String, String)] {
        &self.env
    }

    /// Prefix used in log lines, e.g. `[snappy (asan)]`.
    #[must_use]
    pub fn log_prefix(&self) -> String {
        format!("[{} ({})]", self.dependency.name(), self.context.build_type())
    }

    /// Per-build-type build directory.
    #[must_use]
    pub fn build_dir(&self) -> Utf8PathBuf {
        self.context
            .layout()
            .build_dir(self.dependency.descriptor(), self.context.build_type())
    }

    /// Extracted source directory shared by all build types.
    #[must_use]
    pub fn source_dir(&self) -> Utf8PathBuf {
        self.context
            .layout()
            .source_path(self.dependency.descriptor())
    }

    /// Directory holding the sources the build reads: the build directory
    /// when sources are copied, the shared source directory otherwise.
    #[must_use]
    pub fn source_root(&self) -> Utf8PathBuf {
        if self.dependency.descriptor().copy_sources() {
            self.build_dir()
        } else {
            self.source_dir()
        }
    }

    /// Prefix the dependency installs into.
    #[must_use]
    pub fn install_prefix(&self) -> Utf8PathBuf {
        self.dependency.install_prefix(&self.context)
    }

    /// Creates the build directory, removing it first when configured to,
    /// and copies sources into it for dependencies that need that.
    ///
    /// # Errors
    ///
    /// Returns an I/O error when the directory cannot be (re)created or the
    /// sources cannot be copied.
    pub fn prepare_build_dir(&self) -> Result<()> {
        let build_dir = self.build_dir();
        if self.context.settings().delete_build_dir && build_dir.exists() {
            info!("{} Deleting build directory {build_dir}", self.log_prefix());
            std::fs::remove_dir_all(&build_dir)?;
        }
        std::fs::create_dir_all(&build_dir)?;

        if self.dependency.descriptor().copy_sources() {
            let source_dir = self.source_dir();
            info!(
                "{} Copying sources from {source_dir} to {build_dir}",
                self.log_prefix()
            );
            copy_tree(&source_dir, &build_dir)?;
        }
        Ok(())
    }

    /// Returns a command for `program` with the build environment, run from
    /// the build directory.
    #[must_use]
    pub fn command(&self, program: &str) -> ToolCommand {
        ToolCommand::new(program)
            .envs(self.env.iter().cloned())
            .current_dir(self.build_dir())
    }

    /// Runs a command that must succeed, logging it first and then each line
    /// of its output under the session's log prefix as it is produced.
    ///
    /// # Errors
    ///
    /// Returns [`BuilderError::Tool`] when the command cannot be started or
    /// exits with a non-zero status.
    pub fn run(&self, command: &ToolCommand) -> Result<()> {
        let prefix = self.log_prefix();
        info!("{prefix} Running: {command}");
        stream_checked(self.executor, command, &mut |line| info!("{prefix} {line}"))
            .map_err(BuilderError::from)
    }

    /// Runs an argv-style step in `dir`; an empty argv does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`BuilderError::Tool`] when the step fails.
    pub fn run_step_in<S: AsRef<str>>(&self, dir: &Utf8Path, argv: &[S]) -> Result<()> {
        let Some((program, args)) = argv.split_first() else {
            return Ok(());
        };
        let command = self
            .command(program.as_ref())
            .args(args.iter().map(AsRef::as_ref))
            .current_dir(dir);
        self.run(&command)?;
        Ok(())
    }

    /// Runs an argv-style step in the build directory.
    ///
    /// # Errors
    ///
    /// Returns [`BuilderError::Tool`] when the step fails.
    pub fn run_step<S: AsRef<str>>(&self, argv: &[S]) -> Result<()> {
        self.run_step_in(&self.build_dir(), argv)
    }

    /// Copies `<source root>/<rel_src>` into `<prefix>/include/<dest>`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error when the headers cannot be copied.
    pub fn copy_include_files(&self, rel_src: &str, dest: &str) -> Result<()> {
        let src = self.source_root().join(rel_src);
        let dest = self.install_prefix().join("include").join(dest);
        info!("{} Copying headers from {src} to {dest}", self.log_prefix());
        std::fs::create_dir_all(&dest)?;
        copy_tree(&src, &dest)?;
        Ok(())
    }

    /// Copies files matching `pattern`, relative to `base`, into `dest_dir`.
    ///
    /// Returns the destination paths in match order.
    ///
    /// # Errors
    ///
    /// Returns [`BuilderError::InvalidGlob`] for a malformed pattern and an
    /// I/O error when a file cannot be copied.
    pub fn copy_matching(
        &self,
        base: &Utf8Path,
        pattern: &str,
        dest_dir: &Utf8Path,
    ) -> Result<Vec<Utf8PathBuf>> {
        let files = glob_files(base, pattern)?;
        std::fs::create_dir_all(dest_dir)?;
        let mut copied = Vec::new();
        for path in files {
            let Some(file_name) = path.file_name() else {
                continue;
            };
            let target = dest_dir.join(file_name);
            std::fs::copy(&path, &target)?;
            copied.push(target);
        }
        info!(
            "{} Copied {} file(s) matching {pattern} to {dest_dir}",
            self.log_prefix(),
            copied.len()
        );
        Ok(copied)
    }

    /// Rewrites a text file relative to the build directory.
    ///
    /// # Errors
    ///
    /// Returns an I/O error when the file cannot be read or written.
    pub fn edit_file(&self, rel: &str, edit: impl FnOnce(String) -> String) -> Result<()> {
        let path = self.build_dir().join(rel);
        let contents = std::fs::read_to_string(&path)?;
        std::fs::write(&path, edit(contents))?;
        Ok(())
    }
}

/// Lists regular files matching `pattern` relative to `base`, sorted by
/// path.
///
/// # Errors
///
/// Returns [`BuilderError::InvalidGlob`] for a malformed pattern and
/// [`BuilderError::NonUtf8Path`] for a match that is not UTF-8.
pub fn glob_files(base: &Utf8Path, pattern: &str) -> Result<Vec<Utf8PathBuf>> {
    let full = format!("{}/{pattern}", glob::Pattern::escape(base.as_str()));
    let matches = glob::glob(&full).map_err(|err| BuilderError::InvalidGlob {
        pattern: full.clone(),
        reason: err.to_string(),
    })?;

    let mut files = Vec::new();
    for entry in matches {
        let path = entry.map_err(|err| BuilderError::Io(err.into_error()))?;
        let path = Utf8PathBuf::try_from(path).map_err(|err| BuilderError::NonUtf8Path {
            path: err.as_path().to_string_lossy().into_owned(),
        })?;
        if path.is_file() {
            files.push(path);
        }
    }
    Ok(files)
}

/// Recursively copies `src` into `dest`, recreating symlinks as symlinks.
///
/// Existing files in `dest` are overwritten. Returns the number of files
/// copied.
///
/// # Errors
///
/// Returns an I/O error when `src` cannot be walked or a file cannot be
/// copied.
pub fn copy_tree(src: &Utf8Path, dest: &Utf8Path) -> Result<usize> {
    let mut copied = 0;
    for entry in WalkDir::new(src).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(std::io::Error::from)?;
        let Ok(rel) = entry.path().strip_prefix(src) else {
            continue;
        };
        let target = dest.as_std_path().join(rel);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            std::fs::create_dir_all(&target)?;
        } else if file_type.is_symlink() {
            copy_symlink(entry.path(), &target)?;
            copied += 1;
        } else {
            std::fs::copy(entry.path(), &target)?;
            copied += 1;
        }
    }
    Ok(copied)
}

#[cfg(unix)]
fn copy_symlink(link: &std::path::Path, target: &std::path::Path) -> std::io::Result<()> {
    let points_to = std::fs::read_link(link)?;
    if target.symlink_metadata().is_ok() {
        std::fs::remove_file(target)?;
    }
    std::os::unix::fs::symlink(points_to, target)
}

#[cfg(not(unix))]
fn copy_symlink(link: &std::path::Path, target: &std::path::Path) -> std::io::Result<()> {
    std::fs::copy(link, target).map(|_| ())
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
