//! Build, check, clean and list orchestration behind the CLI.
//!
//! Each `perform_*` function takes the dependency definitions explicitly so
//! the binary passes the bundled ones and tests pass their own.

use crate::build_type::{BuildGroup, BuildType};
use crate::cli::{BuildArgs, CleanArgs, GlobalArgs};
use crate::context::{BuildContext, BuildSettings};
use crate::dependency::Dependency;
use crate::error::{BuilderError, Result};
use crate::layout::FileSystemLayout;
use crate::output::{
    DependencyEntry, build_summary, check_report_json, check_success_message, format_list_human,
    format_list_json, write_stderr_line, write_stdout_line,
};
use crate::probe::ToolAvailability;
use crate::scheduler::{BuildReport, BuildScheduler, select_dependencies};
use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, warn};
use std::io::Write;
use thirdparty::ThirdpartyConfig;
use thirdparty_common::CommandExecutor;
use thirdparty_linkcheck::{
    LinkageVerifier, PatternOrigin, Platform, VerificationReport, VerifierSettings,
};

/// Context shared by every pipeline step.
pub struct PipelineContext<'a> {
    /// Third-party tree layout.
    pub layout: &'a FileSystemLayout,
    /// Loaded configuration.
    pub config: &'a ThirdpartyConfig,
    /// Host platform.
    pub platform: Platform,
    /// Runs every external command.
    pub executor: &'a dyn CommandExecutor,
    /// Suppress progress output.
    pub quiet: bool,
}

/// Loads `--config`, or `thirdparty.toml` in the third-party directory.
///
/// # Errors
///
/// Returns a configuration error when the file cannot be read or parsed.
pub fn load_config(global: &GlobalArgs, thirdparty_dir: &Utf8Path) -> Result<ThirdpartyConfig> {
    let config = match &global.config {
        Some(path) => ThirdpartyConfig::load(path)?,
        None => ThirdpartyConfig::load_from_dir(thirdparty_dir)?,
    };
    Ok(config)
}

/// Derives the build settings from the configuration and CLI overrides.
///
/// The compiler wrapper is only used when the binary exists.
///
/// # Errors
///
/// Returns [`crate::error::BuilderError::InvalidBuildType`] for an unknown
/// build type name.
pub fn build_settings(
    context: &PipelineContext<'_>,
    args: &BuildArgs,
    verbose: bool,
    compiler_wrapper: Option<Utf8PathBuf>,
) -> Result<BuildSettings> {
    let mut settings = BuildSettings::from_config(context.config, context.platform)?;
    if !args.build_type.is_empty() {
        settings.build_types = args
            .build_type
            .iter()
            .map(|name| name.parse())
            .collect::<Result<Vec<BuildType>>>()?;
    }
    if let Some(jobs) = args.jobs.filter(|jobs| *jobs > 0) {
        settings.parallelism = jobs;
    }
    settings.delete_build_dir = args.delete_build_dir;
    settings.verbose = verbose;
    settings.compiler_wrapper = compiler_wrapper.filter(|path| {
        let exists = path.is_file();
        if !exists {
            warn!("Compiler wrapper {path} not found, invoking compilers directly");
        }
        exists
    });
    Ok(settings)
}

/// Builds the selected dependencies, then verifies linkage unless skipped.
///
/// Prints progress to stderr if not in quiet mode.
///
/// # Errors
///
/// Returns the first build failure, a configuration error for unknown
/// dependency names, or [`thirdparty_linkcheck::CheckError`] when the
/// installed tree fails verification.
pub fn perform_build(
    context: &PipelineContext<'_>,
    all: &[Box<dyn Dependency>],
    args: &BuildArgs,
    settings: &BuildSettings,
    stderr: &mut dyn Write,
) -> Result<BuildReport> {
    let selected = select_dependencies(all, &args.dependency, &args.skip)?;
    if !context.quiet {
        let types = settings
            .build_types
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        write_stderr_line(
            stderr,
            format!(
                "Building {} dependencies for build types: common, {types}",
                selected.len()
            ),
        );
    }

    if !args.dry_run {
        context.layout.create_dirs()?;
    }
    let tools = ToolAvailability::from_path();
    let report = BuildScheduler::new(settings, context.layout, context.executor, &tools)
        .dry_run(args.dry_run)
        .run(&selected)?;
    if !context.quiet {
        write_stderr_line(stderr, build_summary(&report));
    }

    if args.dry_run || args.skip_check {
        debug!("Skipping linkage verification");
        return Ok(report);
    }
    let all_refs: Vec<&dyn Dependency> = all.iter().map(Box::as_ref).collect();
    let check = perform_check(context, &all_refs, settings)?.into_result()?;
    if !context.quiet {
        write_stderr_line(stderr, check_success_message(&check));
    }
    Ok(report)
}

/// Verifies the installed tree.
///
/// Shared-library directories are gathered from every dependency for each
/// build type its group is built for; configured paths and patterns are
/// added on top. The report is returned whether or not artifacts failed.
///
/// # Errors
///
/// Returns an error when verification cannot run to completion.
pub fn perform_check(
    context: &PipelineContext<'_>,
    deps: &[&dyn Dependency],
    settings: &BuildSettings,
) -> Result<VerificationReport> {
    let linkage = &context.config.linkage;
    let verifier_settings = VerifierSettings {
        platform: context.platform,
        thirdparty_dir: context.layout.thirdparty_dir().to_owned(),
        installed_dir: context.layout.installed_dir().to_owned(),
        build_types: BuildType::ALL
            .iter()
            .map(|build_type| build_type.dir_name().to_owned())
            .collect(),
        min_macos_version: linkage.min_macos_version.clone(),
    };
    let mut verifier = LinkageVerifier::new(verifier_settings, context.executor);

    for dep in deps {
        let origin = PatternOrigin::Dependency(dep.name().to_owned());
        for build_type in dep.descriptor().build_group().build_types(&BuildType::INSTRUMENTED) {
            let build_context = BuildContext::new(settings, context.layout, build_type);
            verifier.add_allowed_shared_lib_paths(&origin, dep.shared_lib_dirs(&build_context));
        }
    }
    verifier.add_allowed_shared_lib_paths(
        &PatternOrigin::Configured,
        linkage.extra_allowed_shared_lib_paths.iter().cloned(),
    );
    for pattern in &linkage.extra_allowed_patterns {
        verifier.add_configured_pattern(pattern.clone());
    }
    if linkage.allow_system_libstdcxx {
        verifier.allow_system_libstdcxx();
    }

    verifier.run().map_err(BuilderError::from)
}

/// Runs `check`: verifies, optionally prints JSON, and fails on violations.
///
/// # Errors
///
/// Returns [`thirdparty_linkcheck::CheckError::LinkageViolation`] when any
/// artifact failed, or the error that stopped verification.
pub fn run_check(
    context: &PipelineContext<'_>,
    deps: &[&dyn Dependency],
    settings: &BuildSettings,
    json: bool,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
) -> Result<()> {
    let report = perform_check(context, deps, settings)?;
    if json {
        write_stdout_line(stdout, check_report_json(&report));
    }
    let report = report.into_result()?;
    if !context.quiet {
        write_stderr_line(stderr, check_success_message(&report));
    }
    Ok(())
}

/// Removes build directories and sources of the named dependencies (all
/// when none are named), and archives when requested.
///
/// # Errors
///
/// Returns a configuration error for unknown names or an I/O error when a
/// path cannot be removed.
pub fn perform_clean(
    context: &PipelineContext<'_>,
    all: &[Box<dyn Dependency>],
    args: &CleanArgs,
    stderr: &mut dyn Write,
) -> Result<Vec<Utf8PathBuf>> {
    let selected = select_dependencies(all, &args.dependency, &[])?;
    let descriptors: Vec<_> = selected.iter().map(|dep| dep.descriptor()).collect();
    let removed = context.layout.clean(&descriptors, args.downloads)?;
    if !context.quiet {
        write_stderr_line(stderr, format!("Removed {} path(s).", removed.len()));
    }
    Ok(removed)
}

/// Writes every definition, in build order, to `stdout`.
pub fn list_dependencies(all: &[Box<dyn Dependency>], json: bool, stdout: &mut dyn Write) {
    let mut entries: Vec<DependencyEntry> = all
        .iter()
        .map(|dep| DependencyEntry::from_dependency(dep.as_ref()))
        .collect();
    entries.sort_by_key(|entry| {
        BuildGroup::ORDER
            .iter()
            .position(|group| *group == entry.build_group)
    });
    let text = if json {
        format_list_json(&entries)
    } else {
        format_list_human(&entries)
    };
    write_stdout_line(stdout, text.trim_end());
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
