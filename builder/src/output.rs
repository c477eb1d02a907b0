//! Output formatting for the builder CLI.
//!
//! Progress and summaries go to stderr; machine-readable reports (`--json`)
//! go to stdout.

use crate::build_type::BuildGroup;
use crate::dependency::Dependency;
use crate::scheduler::{BuildReport, BuildStatus};
use serde::Serialize;
use std::fmt::Write as _;
use std::io::Write;
use thirdparty_linkcheck::VerificationReport;

/// Writes one line, ignoring write failures.
pub fn write_stderr_line(stderr: &mut dyn Write, message: impl std::fmt::Display) {
    if writeln!(stderr, "{message}").is_err() {
        // Best-effort logging; ignore write failures.
    }
}

/// Writes one line of report output, ignoring write failures.
pub fn write_stdout_line(stdout: &mut dyn Write, message: impl std::fmt::Display) {
    write_stderr_line(stdout, message);
}

/// Summarises a scheduler run.
///
/// # Examples
///
/// ```
/// use thirdparty_builder::output::build_summary;
/// use thirdparty_builder::scheduler::BuildReport;
///
/// assert_eq!(build_summary(&BuildReport::default()), "Nothing to build.");
/// ```
#[must_use]
pub fn build_summary(report: &BuildReport) -> String {
    if report.records().is_empty() {
        return "Nothing to build.".to_owned();
    }
    let planned = report.count(BuildStatus::Planned);
    if planned > 0 {
        let mut text = format!("Would build {planned} of {}:", report.records().len());
        for record in report
            .records()
            .iter()
            .filter(|record| record.status == BuildStatus::Planned)
        {
            let _ = write!(text, "\n  - {} ({})", record.name, record.build_type);
        }
        return text;
    }
    format!(
        "Built {} and skipped {} (dependency, build type) pair(s).",
        report.count(BuildStatus::Built),
        report.count(BuildStatus::Skipped)
    )
}

/// Confirmation printed after a passing linkage check.
#[must_use]
pub fn check_success_message(report: &VerificationReport) -> String {
    let removed = report.removed_needed_libs.len();
    let mut text = format!(
        "No problematic library dependencies found in {} file(s) (tool: {}).",
        report.checked, report.tool
    );
    if removed > 0 {
        let _ = write!(text, " Removed unused needed libraries from {removed} file(s).");
    }
    text
}

/// Formats a verification report as pretty JSON.
#[must_use]
pub fn check_report_json(report: &VerificationReport) -> String {
    serde_json::to_string_pretty(report).unwrap_or_else(|_| "{}".to_owned())
}

/// One line of `list` output.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DependencyEntry {
    /// Dependency name.
    pub name: String,
    /// Packaged version.
    pub version: String,
    /// Build group.
    pub build_group: BuildGroup,
    /// Archive the sources are unpacked from.
    pub archive: String,
}

impl DependencyEntry {
    /// Describes one definition.
    #[must_use]
    pub fn from_dependency(dep: &dyn Dependency) -> Self {
        let descriptor = dep.descriptor();
        Self {
            name: descriptor.name().to_owned(),
            version: descriptor.version().to_owned(),
            build_group: descriptor.build_group(),
            archive: descriptor.archive_name().to_owned(),
        }
    }
}

/// Formats dependency entries as an aligned table.
#[must_use]
pub fn format_list_human(entries: &[DependencyEntry]) -> String {
    let width = entries
        .iter()
        .map(|entry| entry.name.len())
        .max()
        .unwrap_or(0);
    let mut output = String::from("Dependencies in build order:\n");
    for entry in entries {
        let _ = writeln!(
            output,
            "  {:width$}  {:<12}  {}",
            entry.name, entry.version, entry.build_group
        );
    }
    output
}

/// Formats dependency entries as pretty JSON.
#[must_use]
pub fn format_list_json(entries: &[DependencyEntry]) -> String {
    serde_json::to_string_pretty(entries).unwrap_or_else(|_| "[]".to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::Plain;

    fn entries() -> Vec<DependencyEntry> {
        [
            Plain::new("bison", BuildGroup::Common),
            Plain::new("glog", BuildGroup::PotentiallyInstrumented),
        ]
        .iter()
        .map(|dep| DependencyEntry::from_dependency(dep))
        .collect()
    }

    #[test]
    fn human_list_aligns_columns() {
        let output = format_list_human(&entries());

        assert_eq!(
            output,
            concat!(
                "Dependencies in build order:\n",
                "  bison  1.0           common\n",
                "  glog   1.0           potentially_instrumented\n",
            )
        );
    }

    #[test]
    fn json_list_uses_snake_case_groups() {
        let json: serde_json::Value =
            serde_json::from_str(&format_list_json(&entries())).expect("valid json");

        assert_eq!(json[1]["build_group"], "potentially_instrumented");
        assert_eq!(json[0]["archive"], "bison-1.0.tar.gz");
    }

    #[test]
    fn write_stderr_line_appends_newline() {
        let mut stderr = Vec::new();
        write_stderr_line(&mut stderr, "done");
        assert_eq!(stderr, b"done\n");
    }
}
