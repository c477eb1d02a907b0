//! INSPECT phase: run the platform tool on one artifact and judge its output.

use crate::allow_list::AllowList;
use crate::artifact::InstalledArtifact;
use crate::error::Result;
use crate::load_commands::min_os_entries;
use crate::platform::{LDD_ENV, Platform, is_allowed_system_lib, system_library_name};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::fmt;
use thirdparty_common::{CommandExecutor, ToolCommand, capture_all_output};

/// `libc++abi` loads the sanitizer runtime, which cannot locate `libc++`
/// through its own rpath; that one unresolved line is tolerated.
static LIBCXX_NOT_FOUND: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\tlibc[+][+][.]so[.][0-9]+ => not found")
        .unwrap_or_else(|err| unreachable!("static libc++ regex is valid: {err}"))
});

/// One reason an artifact failed verification.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Violation {
    /// An output line matched no allowed pattern.
    UnexpectedLine {
        /// The offending line, verbatim.
        line: String,
    },
    /// A library was resolved from a system directory but is not allowed.
    DisallowedSystemLibrary {
        /// Library file name, e.g. `libz.so.1`.
        name: String,
    },
    /// A Mach-O load command declares the wrong minimum macOS version.
    MinimumMacosVersion {
        /// Declared version.
        found: String,
        /// Configured version.
        expected: String,
        /// Load command section the entry was found in.
        section: String,
        /// Full `otool -l` line.
        line: String,
    },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedLine { line } => write!(f, "Bad path: {line}"),
            Self::DisallowedSystemLibrary { name } => {
                write!(f, "Disallowed system library: {name}")
            }
            Self::MinimumMacosVersion {
                found,
                expected,
                section,
                line,
            } => write!(
                f,
                "Wrong minimum supported macOS version: {found} (expected {expected}, \
                 section: {section}, line: {line})"
            ),
        }
    }
}

/// Everything needed to inspect artifacts on one platform.
pub struct Inspector<'a> {
    /// Platform whose tool and grammar are used.
    pub platform: Platform,
    /// Executor for the inspection tools.
    pub executor: &'a dyn CommandExecutor,
    /// Compiled allow-list.
    pub allow_list: &'a AllowList,
    /// Base names of system libraries that may be linked.
    pub allowed_system_libraries: &'a [String],
    /// Minimum macOS version every load command must declare.
    pub min_macos_version: &'a str,
}

/// Outcome of inspecting one artifact.
#[derive(Debug, Default)]
pub struct Inspection {
    /// Reasons the artifact failed; empty when it passed.
    pub violations: Vec<Violation>,
    /// Patterns that accepted at least one output line, in the order they
    /// first did so.
    pub matched_patterns: Vec<String>,
}

impl Inspection {
    fn record_match(&mut self, pattern: &str) {
        if !self.matched_patterns.iter().any(|p| p == pattern) {
            self.matched_patterns.push(pattern.to_owned());
        }
    }
}

impl Inspector<'_> {
    /// Runs the platform tool(s) on `artifact`.
    ///
    /// # Errors
    ///
    /// Returns an error when an inspection tool cannot be run or exits with
    /// an unexpected status.
    pub fn inspect(&self, artifact: &InstalledArtifact) -> Result<Inspection> {
        match self.platform {
            Platform::Linux => self.inspect_linux(artifact),
            Platform::MacOs => self.inspect_macos(artifact),
        }
    }

    fn inspect_linux(&self, artifact: &InstalledArtifact) -> Result<Inspection> {
        let extra = artifact
            .file_name()
            .starts_with("libc++abi.so.")
            .then_some(&*LIBCXX_NOT_FOUND);

        let command = ToolCommand::new("ldd")
            .arg(artifact.path.as_str())
            .env(LDD_ENV.0, LDD_ENV.1);
        let lines = capture_all_output(self.executor, &command, &[1])?;

        let mut inspection = Inspection::default();
        let marker = self.platform.not_an_object_marker();
        if lines.iter().any(|line| line.contains(marker)) {
            return Ok(inspection);
        }

        for line in &lines {
            if let Some(name) = system_library_name(line.trim()) {
                if !is_allowed_system_lib(name, self.allowed_system_libraries) {
                    inspection.violations.push(Violation::DisallowedSystemLibrary {
                        name: name.to_owned(),
                    });
                }
            }
        }
        self.judge_lines(&lines, extra, &mut inspection);
        Ok(inspection)
    }

    fn inspect_macos(&self, artifact: &InstalledArtifact) -> Result<Inspection> {
        let path = artifact.path.as_str();
        let lines = capture_all_output(
            self.executor,
            &ToolCommand::new("otool").args(["-L", path]),
            &[],
        )?;
        let marker = self.platform.not_an_object_marker();
        if lines.iter().any(|line| line.contains(marker)) {
            return Ok(Inspection::default());
        }

        let mut inspection = Inspection::default();
        self.judge_lines(&lines, None, &mut inspection);
        if !inspection.violations.is_empty() {
            return Ok(inspection);
        }

        let load_commands = capture_all_output(
            self.executor,
            &ToolCommand::new("otool").args(["-l", path]),
            &[],
        )?;
        inspection.violations = min_os_entries(&load_commands)
            .into_iter()
            .filter(|entry| entry.version != self.min_macos_version)
            .map(|entry| Violation::MinimumMacosVersion {
                found: entry.version,
                expected: self.min_macos_version.to_owned(),
                section: entry.section,
                line: entry.line,
            })
            .collect();
        Ok(inspection)
    }

    /// Records the pattern accepting each line, or a violation for a line
    /// no pattern accepts. `extra` is tried after the allow-list.
    fn judge_lines(&self, lines: &[String], extra: Option<&Regex>, inspection: &mut Inspection) {
        for line in lines {
            if let Some(allowed) = self.allow_list.first_match(line) {
                inspection.record_match(&allowed.pattern);
            } else if let Some(re) = extra.filter(|re| re.is_match(line)) {
                inspection.record_match(re.as_str());
            } else {
                inspection.violations.push(Violation::UnexpectedLine { line: line.clone() });
            }
        }
    }
}

#[cfg(test)]
#[path = "inspect_tests.rs"]
mod tests;
