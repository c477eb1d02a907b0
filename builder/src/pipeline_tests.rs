//! Tests for the CLI pipeline steps.

use super::*;
use crate::build_type::BuildGroup;
use crate::descriptor::DependencyDescriptor;
use crate::error::BuilderError;
use crate::session::BuildSession;
use crate::test_utils::{Plain, Workspace};
use rstest::{fixture, rstest};
use thirdparty_common::test_support::{
    ExpectedCall, StubExecutor, output_with_stdout, success_output,
};
use thirdparty_linkcheck::CheckError;

/// Installs a marker file with `make install`; a present marker means
/// installed.
struct Marker(DependencyDescriptor);

impl Marker {
    fn new(name: &str, group: BuildGroup) -> Self {
        Self(
            DependencyDescriptor::builder(name, "2.0", group)
                .build()
                .expect("valid descriptor"),
        )
    }
}

impl Dependency for Marker {
    fn descriptor(&self) -> &DependencyDescriptor {
        &self.0
    }

    fn should_build(&self, context: &BuildContext<'_>) -> bool {
        !context.prefix().join(self.name()).exists()
    }

    fn build(&self, session: &mut BuildSession<'_>) -> Result<()> {
        session.run_step(&["make", "install"])?;
        let prefix = session.install_prefix();
        std::fs::create_dir_all(&prefix)?;
        std::fs::write(prefix.join(self.name()), "")?;
        Ok(())
    }
}

/// Loads libraries from a toolchain outside the third-party tree.
struct LlvmUser(DependencyDescriptor);

impl Dependency for LlvmUser {
    fn descriptor(&self) -> &DependencyDescriptor {
        &self.0
    }

    fn shared_lib_dirs(&self, _context: &BuildContext<'_>) -> Vec<Utf8PathBuf> {
        vec![Utf8PathBuf::from("/opt/llvm-17/lib")]
    }
}

struct Harness {
    ws: Workspace,
    config: ThirdpartyConfig,
    executor: StubExecutor,
}

impl Harness {
    fn context(&self) -> PipelineContext<'_> {
        PipelineContext {
            layout: &self.ws.layout,
            config: &self.config,
            platform: Platform::Linux,
            executor: &self.executor,
            quiet: false,
        }
    }
}

#[fixture]
fn harness() -> Harness {
    Harness {
        ws: Workspace::new(),
        config: ThirdpartyConfig::default(),
        executor: StubExecutor::default(),
    }
}

fn definitions() -> Vec<Box<dyn Dependency>> {
    vec![
        Box::new(Marker::new("glog", BuildGroup::PotentiallyInstrumented)),
        Box::new(Marker::new("bison", BuildGroup::Common)),
    ]
}

fn ldd_call(path: &Utf8Path, stdout: &str) -> [ExpectedCall; 2] {
    [
        ExpectedCall::new(
            "patchelf",
            ["--print-needed", path.as_str()],
            Ok(output_with_stdout(0, "")),
        ),
        ExpectedCall::new("ldd", [path.as_str()], Ok(output_with_stdout(0, stdout))),
    ]
}

#[rstest]
fn build_settings_apply_cli_overrides(harness: Harness) {
    let args = BuildArgs {
        build_type: vec!["tsan".to_owned(), "asan".to_owned()],
        jobs: Some(3),
        delete_build_dir: true,
        ..BuildArgs::default()
    };

    let settings = build_settings(
        &harness.context(),
        &args,
        true,
        Some(Utf8PathBuf::from("/nonexistent/thirdparty-cc-wrapper")),
    )
    .expect("valid overrides");

    assert_eq!(settings.build_types, [BuildType::Tsan, BuildType::Asan]);
    assert_eq!(settings.parallelism, 3);
    assert!(settings.delete_build_dir);
    assert!(settings.verbose);
    assert!(settings.compiler_wrapper.is_none(), "missing wrapper is dropped");
}

#[rstest]
fn build_settings_reject_unknown_build_type(harness: Harness) {
    let args = BuildArgs {
        build_type: vec!["msan".to_owned()],
        ..BuildArgs::default()
    };

    let err = build_settings(&harness.context(), &args, false, None).expect_err("msan is unknown");

    assert!(matches!(err, BuilderError::InvalidBuildType { ref name } if name == "msan"));
}

#[rstest]
fn build_runs_the_scheduler_then_the_check(harness: Harness) {
    for _ in 0..2 {
        harness
            .executor
            .push(ExpectedCall::new("make", ["install"], Ok(success_output())));
    }
    let all = definitions();
    let mut stderr = Vec::new();

    let report = perform_build(
        &harness.context(),
        &all,
        &BuildArgs::default(),
        &harness.ws.settings,
        &mut stderr,
    )
    .expect("build succeeds");

    harness.executor.assert_finished();
    assert_eq!(report.count(crate::scheduler::BuildStatus::Built), 2);
    let stderr = String::from_utf8(stderr).expect("utf-8 output");
    assert!(stderr.contains("Built 2 and skipped 0"), "{stderr}");
    assert!(
        stderr.contains("No problematic library dependencies found in 0 file(s)"),
        "{stderr}"
    );
}

#[rstest]
fn dry_run_builds_and_checks_nothing(harness: Harness) {
    let all = definitions();
    let args = BuildArgs {
        dependency: vec!["glog".to_owned()],
        dry_run: true,
        ..BuildArgs::default()
    };
    let mut stderr = Vec::new();

    let report = perform_build(
        &harness.context(),
        &all,
        &args,
        &harness.ws.settings,
        &mut stderr,
    )
    .expect("dry run");

    assert!(harness.executor.executed().is_empty());
    assert_eq!(report.records().len(), 1);
    let stderr = String::from_utf8(stderr).expect("utf-8 output");
    assert!(stderr.contains("Would build 1 of 1:\n  - glog (uninstrumented)"));
}

#[rstest]
fn check_allows_directories_contributed_by_dependencies(harness: Harness) {
    let lib = harness
        .ws
        .write("installed/uninstrumented/lib/libfoo.so", "\u{7f}ELF");
    for call in ldd_call(
        &lib,
        "\tlibLLVM.so.17 => /opt/llvm-17/lib/libLLVM.so.17 (0x1)\n",
    ) {
        harness.executor.push(call);
    }
    let llvm_user = LlvmUser(
        DependencyDescriptor::builder("foo", "1.0", BuildGroup::PotentiallyInstrumented)
            .build()
            .expect("valid descriptor"),
    );

    let report = perform_check(&harness.context(), &[&llvm_user], &harness.ws.settings)
        .expect("verification runs");

    harness.executor.assert_finished();
    assert!(report.is_success(), "{:?}", report.failures);
    assert_eq!(report.checked, 1);
}

#[rstest]
fn check_prints_json_and_fails_on_violations(harness: Harness) {
    let lib = harness
        .ws
        .write("installed/common/lib/libbad.so", "\u{7f}ELF");
    for call in ldd_call(&lib, "\tlibfoo.so => /usr/local/lib/libfoo.so (0x1)\n") {
        harness.executor.push(call);
    }
    let bison = Plain::new("bison", BuildGroup::Common);
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();

    let err = run_check(
        &harness.context(),
        &[&bison],
        &harness.ws.settings,
        true,
        &mut stdout,
        &mut stderr,
    )
    .expect_err("libfoo is not allowed");

    assert!(matches!(
        err,
        BuilderError::Linkage(CheckError::LinkageViolation { count: 1, .. })
    ));
    let json: serde_json::Value = serde_json::from_slice(&stdout).expect("json report");
    assert_eq!(json["checked"], 1);
    assert_eq!(json["failures"][0]["artifact"]["path"], lib.as_str());
}

#[rstest]
fn configured_patterns_extend_the_allow_list(mut harness: Harness) {
    let lib = harness
        .ws
        .write("installed/common/lib/libbad.so", "\u{7f}ELF");
    for call in ldd_call(&lib, "\tlibfoo.so => /usr/local/lib/libfoo.so (0x1)\n") {
        harness.executor.push(call);
    }
    harness
        .config
        .linkage
        .extra_allowed_patterns
        .push(r"^\tlibfoo\.so => /usr/local/lib/".to_owned());

    let report =
        perform_check(&harness.context(), &[], &harness.ws.settings).expect("verification runs");

    assert!(report.is_success(), "{:?}", report.failures);
}

#[rstest]
fn clean_removes_only_the_named_dependency(harness: Harness) {
    let all = definitions();
    let glog_build = harness.ws.write("build/uninstrumented/glog-2.0/Makefile", "");
    let bison_build = harness.ws.write("build/common/bison-2.0/Makefile", "");
    let args = CleanArgs {
        dependency: vec!["glog".to_owned()],
        downloads: false,
    };
    let mut stderr = Vec::new();

    let removed =
        perform_clean(&harness.context(), &all, &args, &mut stderr).expect("clean succeeds");

    assert_eq!(removed.len(), 1);
    assert!(!glog_build.exists());
    assert!(bison_build.exists());
}

#[test]
fn list_puts_common_dependencies_first() {
    let all = definitions();
    let mut stdout = Vec::new();

    list_dependencies(&all, false, &mut stdout);

    let text = String::from_utf8(stdout).expect("utf-8 output");
    let bison = text.find("bison").expect("bison listed");
    let glog = text.find("glog").expect("glog listed");
    assert!(bison < glog, "{text}");
}
