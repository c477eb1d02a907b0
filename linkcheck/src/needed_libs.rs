//! Removal of unused `DT_NEEDED` entries on Linux.
//!
//! Some toolchains record `libatomic` as needed even when nothing from it is
//! used, which would drag a system library into the link closure. Before
//! inspection every artifact's needed list is compared with what `ldd -u`
//! reports as unused, and such entries are dropped with `patchelf`.

use crate::error::{CheckError, Result};
use crate::platform::SKIPPED_LDD_OUTPUT_PREFIXES;
use camino::Utf8Path;
use log::{debug, info};
use thirdparty_common::command::combined_output;
use thirdparty_common::{
    CommandExecutor, ToolCommand, ToolError, capture_all_output, run_checked,
};

/// Library base names that are removed when `ldd -u` reports them unused.
pub const NEEDED_LIBS_TO_REMOVE: &[&str] = &["libatomic"];

/// Rewrites the needed-library lists of installed artifacts.
pub struct NeededLibsFixer<'a> {
    executor: &'a dyn CommandExecutor,
}

impl<'a> NeededLibsFixer<'a> {
    /// Creates a fixer running its tools through `executor`.
    #[must_use]
    pub fn new(executor: &'a dyn CommandExecutor) -> Self {
        Self { executor }
    }

    /// Returns the libraries `path` directly needs.
    ///
    /// `patchelf` exits with 1 for files it cannot parse, such as scripts;
    /// those have no needed libraries.
    ///
    /// # Errors
    ///
    /// Returns [`CheckError::ToolInvocation`] for other failures.
    pub fn needed_libs(&self, path: &Utf8Path) -> Result<Vec<String>> {
        let command = ToolCommand::new("patchelf").args(["--print-needed", path.as_str()]);
        let output = self.executor.run(&command)?;
        match output.status.code() {
            Some(0) => Ok(String::from_utf8_lossy(&output.stdout)
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_owned)
                .collect()),
            Some(1) => {
                debug!(
                    "Could not determine libraries directly needed by {path}: {}",
                    combined_output(&output).trim()
                );
                Ok(Vec::new())
            }
            code => Err(ToolError::UnexpectedExitCode {
                command: command.to_string(),
                code,
                expected: vec![0, 1],
                output: combined_output(&output),
            }
            .into()),
        }
    }

    /// Drops unused removable libraries from `path` and returns their names.
    ///
    /// # Errors
    ///
    /// Returns [`CheckError::Consistency`] when `ldd -u` reports an
    /// inconsistency, names a library that does not exist or is not in the
    /// needed list, or when a removal does not take effect.
    pub fn fix(&self, path: &Utf8Path) -> Result<Vec<String>> {
        let needed = self.needed_libs(path)?;
        if needed.is_empty() {
            return Ok(Vec::new());
        }

        let unused_output = capture_all_output(
            self.executor,
            &ToolCommand::new("ldd").args(["-u", path.as_str()]),
            &[1],
        )?;

        let mut removed = Vec::new();
        for raw_line in &unused_output {
            let line = raw_line.trim();
            if line.is_empty() {
                continue;
            }
            if line.starts_with("Inconsistency") {
                return Err(consistency(path, format!("ldd -u failed: {line}")));
            }
            if SKIPPED_LDD_OUTPUT_PREFIXES
                .iter()
                .any(|prefix| line.starts_with(prefix))
            {
                continue;
            }

            let unused_path = Utf8Path::new(line);
            if !unused_path.exists() {
                return Err(consistency(path, format!("file does not exist: {line}")));
            }
            let unused_name = unused_path.file_name().unwrap_or(line);
            if !needed.iter().any(|lib| lib == unused_name) {
                return Err(consistency(
                    path,
                    format!(
                        "unused library {line} does not match the list of needed libs: {needed:?}"
                    ),
                ));
            }

            if is_removable(unused_name) {
                run_checked(
                    self.executor,
                    &ToolCommand::new("patchelf").args([
                        "--remove-needed",
                        unused_name,
                        path.as_str(),
                    ]),
                )?;
                info!("Removed unused needed lib {unused_name} from {path}");
                removed.push(unused_name.to_owned());
            }
        }

        if removed.is_empty() {
            return Ok(removed);
        }

        let now_needed = self.needed_libs(path)?;
        if let Some(stuck) = removed.iter().find(|lib| now_needed.contains(lib)) {
            return Err(consistency(
                path,
                format!(
                    "failed to remove needed library {stuck}; current needed libs: {now_needed:?}"
                ),
            ));
        }
        Ok(removed)
    }
}

/// Returns whether an unused library should be dropped from the needed list.
///
/// # Examples
///
/// ```
/// use thirdparty_linkcheck::needed_libs::is_removable;
///
/// assert!(is_removable("libatomic.so.1"));
/// assert!(!is_removable("libatomic_ops.so.1"));
/// ```
#[must_use]
pub fn is_removable(lib_name: &str) -> bool {
    NEEDED_LIBS_TO_REMOVE.iter().any(|base| {
        lib_name
            .strip_prefix(base)
            .is_some_and(|rest| rest.starts_with('.'))
    })
}

fn consistency(path: &Utf8Path, reason: String) -> CheckError {
    CheckError::Consistency {
        path: path.to_owned(),
        reason,
    }
}

#[cfg(test)]
#[path = "needed_libs_tests.rs"]
mod tests;
