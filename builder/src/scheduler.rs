//! Orders dependency builds by build group and build type.
//!
//! Groups are built in [`BuildGroup::ORDER`]. The common group is built for
//! the `common` build type only; the potentially instrumented group once per
//! requested instrumented build type. Within a group, definitions keep the
//! order they were given in. The first failing build aborts the run.

use crate::build_type::{BuildGroup, BuildType};
use crate::context::{BuildContext, BuildSettings};
use crate::dependency::Dependency;
use crate::error::{BuilderError, Result};
use crate::layout::FileSystemLayout;
use crate::probe::ToolAvailability;
use crate::session::BuildSession;
use log::{debug, info};
use serde::Serialize;
use std::collections::HashSet;
use thirdparty_common::CommandExecutor;

/// What happened to one `(dependency, build type)` pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildStatus {
    /// The dependency was built and installed.
    Built,
    /// `should_build` reported nothing to do.
    Skipped,
    /// Dry run: the dependency would have been built.
    Planned,
}

/// One entry of a [`BuildReport`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BuildRecord {
    /// Dependency name.
    pub name: String,
    /// Build type the entry refers to.
    pub build_type: BuildType,
    /// Outcome.
    pub status: BuildStatus,
}

/// Outcome of a scheduler run, in build order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct BuildReport {
    records: Vec<BuildRecord>,
}

impl BuildReport {
    /// Every visited pair, in the order it was visited.
    #[must_use]
    pub fn records(&self) -> &[BuildRecord] {
        &self.records
    }

    /// Number of entries with the given status.
    #[must_use]
    pub fn count(&self, status: BuildStatus) -> usize {
        self.records
            .iter()
            .filter(|record| record.status == status)
            .count()
    }

    fn push(&mut self, name: &str, build_type: BuildType, status: BuildStatus) {
        self.records.push(BuildRecord {
            name: name.to_owned(),
            build_type,
            status,
        });
    }
}

/// Builds dependencies group by group.
pub struct BuildScheduler<'a> {
    settings: &'a BuildSettings,
    layout: &'a FileSystemLayout,
    executor: &'a dyn CommandExecutor,
    tools: &'a ToolAvailability,
    dry_run: bool,
}

impl<'a> BuildScheduler<'a> {
    /// Creates a scheduler that runs build steps through `executor`.
    #[must_use]
    pub fn new(
        settings: &'a BuildSettings,
        layout: &'a FileSystemLayout,
        executor: &'a dyn CommandExecutor,
        tools: &'a ToolAvailability,
    ) -> Self {
        Self {
            settings,
            layout,
            executor,
            tools,
            dry_run: false,
        }
    }

    /// Only reports what would be built.
    #[must_use]
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Builds every dependency that needs building.
    ///
    /// A `(name, build type)` pair is visited at most once per call, even
    /// when a definition is listed twice.
    ///
    /// # Errors
    ///
    /// Returns the first error raised while preparing a build directory or
    /// building a dependency. Dependencies built before the failure stay
    /// installed.
    pub fn run(&self, dependencies: &[&dyn Dependency]) -> Result<BuildReport> {
        let mut report = BuildReport::default();
        let mut visited: HashSet<(String, BuildType)> = HashSet::new();

        for group in BuildGroup::ORDER {
            let members: Vec<&dyn Dependency> = dependencies
                .iter()
                .copied()
                .filter(|dep| dep.descriptor().build_group() == group)
                .collect();
            if members.is_empty() {
                debug!("No dependencies in build group {group}");
                continue;
            }

            for build_type in group.build_types(&self.settings.build_types) {
                info!(
                    "Building {} dependencies of the {group} group for build type {build_type}",
                    members.len()
                );
                let context = BuildContext::new(self.settings, self.layout, build_type);
                for &dep in &members {
                    if !visited.insert((dep.name().to_owned(), build_type)) {
                        debug!("{} ({build_type}) was already visited", dep.name());
                        continue;
                    }
                    let status = self.build_one(context, dep)?;
                    report.push(dep.name(), build_type, status);
                }
            }
        }
        Ok(report)
    }

    fn build_one(&self, context: BuildContext<'a>, dep: &dyn Dependency) -> Result<BuildStatus> {
        let build_type = context.build_type();
        if !dep.should_build(&context) {
            info!("[{} ({build_type})] Nothing to build", dep.name());
            return Ok(BuildStatus::Skipped);
        }
        if self.dry_run {
            info!("[{} ({build_type})] Would build", dep.name());
            return Ok(BuildStatus::Planned);
        }

        let mut session = BuildSession::new(context, dep, self.executor, self.tools);
        session.prepare_build_dir()?;
        dep.build(&mut session)?;
        info!("{} Installed into {}", session.log_prefix(), session.install_prefix());
        Ok(BuildStatus::Built)
    }
}

/// Picks the dependencies named on the command line, keeping definition
/// order. No names selects everything; `skip` removes names afterwards.
///
/// # Errors
///
/// Returns [`BuilderError::UnknownDependency`] for a name in `names` or
/// `skip` that no definition carries.
pub fn select_dependencies<'d>(
    all: &'d [Box<dyn Dependency>],
    names: &[String],
    skip: &[String],
) -> Result<Vec<&'d dyn Dependency>> {
    for name in names.iter().chain(skip) {
        if !all.iter().any(|dep| dep.name() == name) {
            return Err(BuilderError::UnknownDependency { name: name.clone() });
        }
    }

    Ok(all
        .iter()
        .map(Box::as_ref)
        .filter(|dep| names.is_empty() || names.iter().any(|name| name == dep.name()))
        .filter(|dep| !skip.iter().any(|name| name == dep.name()))
        .collect())
}

/// Checks that every dependency belongs to `expected`.
///
/// # Errors
///
/// Returns [`BuilderError::BuildGroupMismatch`] naming the first dependency
/// in another group.
pub fn ensure_build_group(dependencies: &[&dyn Dependency], expected: BuildGroup) -> Result<()> {
    let Some(offender) = dependencies
        .iter()
        .find(|dep| dep.descriptor().build_group() != expected)
    else {
        return Ok(());
    };
    let all = dependencies
        .iter()
        .map(|dep| dep.name())
        .collect::<Vec<_>>()
        .join(", ");
    Err(BuilderError::BuildGroupMismatch {
        expected: expected.to_string(),
        found: offender.descriptor().build_group().to_string(),
        dependency: offender.name().to_owned(),
        all,
    })
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
