//! The linkage verifier: INIT, COLLECT, INSPECT and REPORT.
//!
//! A verifier is configured once, optionally extended with shared-library
//! directories contributed by dependencies and with configured patterns, and
//! then [`run`](LinkageVerifier::run). Every failure across every artifact is
//! gathered before the run is judged, so a single pass reports all problems.

use crate::allow_list::{AllowList, AllowListPattern, PatternOrigin};
use crate::artifact::InstalledArtifact;
use crate::collect::collect_artifacts;
use crate::error::{CheckError, Result};
use crate::inspect::{Inspector, Violation};
use crate::needed_libs::NeededLibsFixer;
use crate::platform::{ALLOWED_SYSTEM_LIBRARIES, Platform};
use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, error, info};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use thirdparty_common::CommandExecutor;

/// Phases a verification run moves through, in order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    /// Compiling the allow-list.
    Init,
    /// Walking the installed tree.
    Collect,
    /// Fixing and inspecting artifacts.
    Inspect,
    /// Summarising failures.
    Report,
}

/// Inputs of a verification run.
#[derive(Clone, Debug)]
pub struct VerifierSettings {
    /// Platform whose tools are used.
    pub platform: Platform,
    /// Root of the third-party tree; libraries inside it are always allowed.
    pub thirdparty_dir: Utf8PathBuf,
    /// Directory holding one sub-directory per build type.
    pub installed_dir: Utf8PathBuf,
    /// Build type directory names to scan, in order.
    pub build_types: Vec<String>,
    /// Minimum macOS version every Mach-O binary must declare.
    pub min_macos_version: String,
}

/// One artifact and the reasons it failed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ArtifactFailure {
    /// The failing artifact.
    pub artifact: InstalledArtifact,
    /// Every problem found, in output order.
    pub violations: Vec<Violation>,
}

/// Summary of a verification run.
#[derive(Clone, Debug, Serialize)]
pub struct VerificationReport {
    /// Inspection tool description.
    pub tool: &'static str,
    /// Number of artifacts inspected.
    pub checked: usize,
    /// Libraries dropped from needed lists, per artifact.
    pub removed_needed_libs: BTreeMap<Utf8PathBuf, Vec<String>>,
    /// Failing artifacts in walk order.
    pub failures: Vec<ArtifactFailure>,
}

impl VerificationReport {
    /// Returns `true` when no artifact failed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Converts a failing report into [`CheckError::LinkageViolation`].
    ///
    /// # Errors
    ///
    /// Returns [`CheckError::LinkageViolation`] when any artifact failed.
    pub fn into_result(self) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(CheckError::LinkageViolation {
                tool: self.tool,
                count: self.failures.len(),
            })
        }
    }
}

/// Verifies the installed tree against the allow-list.
pub struct LinkageVerifier<'a> {
    settings: VerifierSettings,
    executor: &'a dyn CommandExecutor,
    shared_lib_paths: BTreeMap<Utf8PathBuf, PatternOrigin>,
    configured_patterns: Vec<String>,
    allowed_system_libraries: Vec<String>,
    logged_patterns: HashSet<String>,
    phase: Phase,
}

impl<'a> LinkageVerifier<'a> {
    /// Creates a verifier with the built-in allow-list for the platform.
    #[must_use]
    pub fn new(settings: VerifierSettings, executor: &'a dyn CommandExecutor) -> Self {
        Self {
            settings,
            executor,
            shared_lib_paths: BTreeMap::new(),
            configured_patterns: Vec::new(),
            allowed_system_libraries: ALLOWED_SYSTEM_LIBRARIES
                .iter()
                .map(|name| (*name).to_owned())
                .collect(),
            logged_patterns: HashSet::new(),
            phase: Phase::Init,
        }
    }

    /// Allows shared libraries resolved from the given directories.
    ///
    /// A directory contributed twice keeps its first origin.
    pub fn add_allowed_shared_lib_paths<I, P>(&mut self, origin: &PatternOrigin, paths: I)
    where
        I: IntoIterator<Item = P>,
        P: Into<Utf8PathBuf>,
    {
        for path in paths {
            self.shared_lib_paths
                .entry(path.into())
                .or_insert_with(|| origin.clone());
        }
    }

    /// Adds a raw regular expression to the allow-list.
    pub fn add_configured_pattern(&mut self, pattern: impl Into<String>) {
        self.configured_patterns.push(pattern.into());
    }

    /// Allows the system `libstdc++` to be linked.
    pub fn allow_system_libstdcxx(&mut self) {
        if !self.allowed_system_libraries.iter().any(|n| n == "libstdc++") {
            self.allowed_system_libraries.push("libstdc++".to_owned());
        }
    }

    /// Returns the phase the verifier last entered.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Returns the installed directory being verified.
    #[must_use]
    pub fn installed_dir(&self) -> &Utf8Path {
        &self.settings.installed_dir
    }

    /// Builds the allow-list from built-in, contributed and configured
    /// patterns, in that order.
    #[must_use]
    pub fn patterns(&self) -> Vec<AllowListPattern> {
        let platform = self.settings.platform;
        let builtin = platform
            .builtin_patterns(&self.settings.thirdparty_dir)
            .into_iter()
            .map(|p| AllowListPattern::new(p, PatternOrigin::BuiltIn));
        let contributed = self.shared_lib_paths.iter().map(|(dir, origin)| {
            AllowListPattern::new(platform.shared_lib_dir_pattern(dir), origin.clone())
        });
        let configured = self
            .configured_patterns
            .iter()
            .map(|p| AllowListPattern::new(p.clone(), PatternOrigin::Configured));
        builtin.chain(contributed).chain(configured).collect()
    }

    /// Runs the whole verification and returns the report.
    ///
    /// The report is returned even when artifacts fail; use
    /// [`VerificationReport::into_result`] to turn failures into an error.
    ///
    /// # Errors
    ///
    /// Returns an error when the allow-list does not compile, the tree cannot
    /// be walked, a tool fails to run, or needed-library fixing detects an
    /// inconsistency.
    pub fn run(&mut self) -> Result<VerificationReport> {
        self.phase = Phase::Init;
        self.logged_patterns.clear();
        let allow_list = AllowList::compile(self.patterns())?;
        info!("Scanning installed executables and libraries...");
        for (dir, origin) in &self.shared_lib_paths {
            info!("Extra allowed shared lib path: {dir} ({origin})");
        }

        self.phase = Phase::Collect;
        let artifacts = collect_artifacts(&self.settings.installed_dir, &self.settings.build_types)?;
        debug!("Collected {} artifact(s) to inspect", artifacts.len());

        self.phase = Phase::Inspect;
        let removed_needed_libs = self.fix_needed_libs(&artifacts)?;
        let failures = self.inspect_all(&artifacts, &allow_list)?;

        self.phase = Phase::Report;
        let report = VerificationReport {
            tool: self.settings.platform.tool(),
            checked: artifacts.len(),
            removed_needed_libs,
            failures,
        };
        if report.is_success() {
            info!("No problems found with library dependencies.");
        } else {
            error!(
                "Found problematic library dependencies, using tool: {}",
                report.tool
            );
        }
        Ok(report)
    }

    fn fix_needed_libs(
        &self,
        artifacts: &[InstalledArtifact],
    ) -> Result<BTreeMap<Utf8PathBuf, Vec<String>>> {
        let mut removed_libs = BTreeMap::new();
        if self.settings.platform != Platform::Linux {
            return Ok(removed_libs);
        }
        let fixer = NeededLibsFixer::new(self.executor);
        for artifact in artifacts {
            let removed = fixer.fix(&artifact.path)?;
            if !removed.is_empty() {
                removed_libs.insert(artifact.path.clone(), removed);
            }
        }
        Ok(removed_libs)
    }

    fn inspect_all(
        &mut self,
        artifacts: &[InstalledArtifact],
        allow_list: &AllowList,
    ) -> Result<Vec<ArtifactFailure>> {
        let inspector = Inspector {
            platform: self.settings.platform,
            executor: self.executor,
            allow_list,
            allowed_system_libraries: &self.allowed_system_libraries,
            min_macos_version: &self.settings.min_macos_version,
        };

        let mut failures = Vec::new();
        for artifact in artifacts {
            let inspection = inspector.inspect(artifact)?;
            for pattern in &inspection.matched_patterns {
                if self.logged_patterns.insert(pattern.clone()) {
                    debug!("Allowed pattern {pattern} first matched for {}", artifact.path);
                }
            }
            if inspection.violations.is_empty() {
                continue;
            }

            error!("{}:", artifact.path);
            let mut seen = HashSet::new();
            for violation in &inspection.violations {
                if seen.insert(violation) {
                    error!("{violation}");
                }
                if matches!(violation, Violation::DisallowedSystemLibrary { .. }) {
                    info!(
                        "Allowed system libraries: {:?}",
                        self.allowed_system_libraries
                    );
                }
            }
            failures.push(ArtifactFailure {
                artifact: artifact.clone(),
                violations: inspection.violations,
            });
        }
        Ok(failures)
    }
}

#[cfg(test)]
#[path = "verifier_tests.rs"]
mod tests;
