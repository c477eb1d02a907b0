//! Tests for build ordering, idempotence and dependency selection.

use super::*;
use crate::descriptor::DependencyDescriptor;
use crate::test_utils::{Plain, Workspace};
use rstest::{fixture, rstest};
use thirdparty_common::test_support::{ExpectedCall, StubExecutor, failure_output, success_output};

/// Runs `make install` and leaves a marker in the prefix, which later runs
/// take as proof of installation.
struct Marker(DependencyDescriptor);

impl Marker {
    fn new(name: &str, group: BuildGroup) -> Self {
        Self(
            DependencyDescriptor::builder(name, "1.0", group)
                .build()
                .expect("valid descriptor"),
        )
    }

    fn marker_name(&self) -> String {
        format!("{}.installed", self.name())
    }
}

impl Dependency for Marker {
    fn descriptor(&self) -> &DependencyDescriptor {
        &self.0
    }

    fn should_build(&self, context: &BuildContext<'_>) -> bool {
        !context.prefix().join(self.marker_name()).exists()
    }

    fn build(&self, session: &mut BuildSession<'_>) -> Result<()> {
        session.run_step(&["make", "install"])?;
        let prefix = session.install_prefix();
        std::fs::create_dir_all(&prefix)?;
        std::fs::write(prefix.join(self.marker_name()), "")?;
        Ok(())
    }
}

fn make_install() -> ExpectedCall {
    ExpectedCall::new("make", ["install"], Ok(success_output()))
}

fn pairs(report: &BuildReport) -> Vec<(&str, BuildType, BuildStatus)> {
    report
        .records()
        .iter()
        .map(|record| (record.name.as_str(), record.build_type, record.status))
        .collect()
}

#[fixture]
fn workspace() -> Workspace {
    let mut ws = Workspace::new();
    ws.settings.build_types = vec![BuildType::Asan, BuildType::Uninstrumented];
    ws
}

#[rstest]
fn common_group_is_built_first_then_each_instrumented_type(workspace: Workspace) {
    let glog = Marker::new("glog", BuildGroup::PotentiallyInstrumented);
    let bison = Marker::new("bison", BuildGroup::Common);
    let executor = StubExecutor::new((0..3).map(|_| make_install()).collect());
    let tools = ToolAvailability::fixed([("ninja", false)]);
    let scheduler = BuildScheduler::new(&workspace.settings, &workspace.layout, &executor, &tools);

    let report = scheduler.run(&[&glog, &bison]).expect("build succeeds");

    executor.assert_finished();
    assert_eq!(
        pairs(&report),
        vec![
            ("bison", BuildType::Common, BuildStatus::Built),
            ("glog", BuildType::Uninstrumented, BuildStatus::Built),
            ("glog", BuildType::Asan, BuildStatus::Built),
        ]
    );
}

#[rstest]
fn second_run_builds_nothing(workspace: Workspace) {
    let bison = Marker::new("bison", BuildGroup::Common);
    let snappy = Marker::new("snappy", BuildGroup::PotentiallyInstrumented);
    let executor = StubExecutor::new((0..3).map(|_| make_install()).collect());
    let tools = ToolAvailability::fixed([("ninja", false)]);
    let scheduler = BuildScheduler::new(&workspace.settings, &workspace.layout, &executor, &tools);
    let deps: [&dyn Dependency; 2] = [&bison, &snappy];

    let first = scheduler.run(&deps).expect("first run");
    let second = scheduler.run(&deps).expect("second run");

    executor.assert_finished();
    assert_eq!(first.count(BuildStatus::Built), 3);
    assert_eq!(second.count(BuildStatus::Built), 0);
    assert_eq!(second.count(BuildStatus::Skipped), 3);
    assert_eq!(executor.executed().len(), 3);
}

#[rstest]
fn a_dependency_listed_twice_is_built_once(workspace: Workspace) {
    let bison = Marker::new("bison", BuildGroup::Common);
    let executor = StubExecutor::new(vec![make_install()]);
    let tools = ToolAvailability::fixed([("ninja", false)]);
    let scheduler = BuildScheduler::new(&workspace.settings, &workspace.layout, &executor, &tools);

    let report = scheduler.run(&[&bison, &bison]).expect("build succeeds");

    executor.assert_finished();
    assert_eq!(report.records().len(), 1);
}

#[rstest]
fn first_failure_stops_the_run(workspace: Workspace) {
    let bison = Marker::new("bison", BuildGroup::Common);
    let xxhash = Marker::new("xxhash", BuildGroup::Common);
    let glog = Marker::new("glog", BuildGroup::PotentiallyInstrumented);
    let executor = StubExecutor::new(vec![
        make_install(),
        ExpectedCall::new("make", ["install"], Ok(failure_output("compile error"))),
    ]);
    let tools = ToolAvailability::fixed([("ninja", false)]);
    let scheduler = BuildScheduler::new(&workspace.settings, &workspace.layout, &executor, &tools);

    let err = scheduler
        .run(&[&bison, &xxhash, &glog])
        .expect_err("xxhash fails");

    executor.assert_finished();
    assert!(matches!(err, BuilderError::Tool(_)));
    let common = workspace.layout.installed_prefix(BuildType::Common);
    assert!(common.join("bison.installed").exists(), "no rollback");
    assert!(!common.join("xxhash.installed").exists());
}

#[rstest]
fn dry_run_plans_without_running(workspace: Workspace) {
    let bison = Marker::new("bison", BuildGroup::Common);
    let glog = Marker::new("glog", BuildGroup::PotentiallyInstrumented);
    let executor = StubExecutor::default();
    let tools = ToolAvailability::fixed([("ninja", false)]);
    let scheduler = BuildScheduler::new(&workspace.settings, &workspace.layout, &executor, &tools)
        .dry_run(true);

    let report = scheduler.run(&[&bison, &glog]).expect("dry run");

    assert_eq!(report.count(BuildStatus::Planned), 3);
    assert!(executor.executed().is_empty());
    assert!(
        !workspace
            .layout
            .build_dir(bison.descriptor(), BuildType::Common)
            .exists()
    );
}

#[rstest]
fn missing_build_hook_is_a_configuration_error(workspace: Workspace) {
    let bare = Plain::new("bare", BuildGroup::Common);
    let executor = StubExecutor::default();
    let tools = ToolAvailability::fixed([("ninja", false)]);
    let scheduler = BuildScheduler::new(&workspace.settings, &workspace.layout, &executor, &tools);

    let err = scheduler.run(&[&bare]).expect_err("no build hook");

    assert!(err.is_configuration_error());
    assert_eq!(err.to_string(), "build is not implemented for dependency bare");
}

#[rstest]
fn report_serialises_with_snake_case_names(workspace: Workspace) {
    let glog = Marker::new("glog", BuildGroup::PotentiallyInstrumented);
    let executor = StubExecutor::default();
    let tools = ToolAvailability::fixed([("ninja", false)]);
    let scheduler = BuildScheduler::new(&workspace.settings, &workspace.layout, &executor, &tools)
        .dry_run(true);

    let report = scheduler.run(&[&glog]).expect("dry run");
    let json = serde_json::to_value(&report).expect("serialise report");

    assert_eq!(
        json["records"][0],
        serde_json::json!({"name": "glog", "build_type": "uninstrumented", "status": "planned"})
    );
}

fn definitions() -> Vec<Box<dyn Dependency>> {
    vec![
        Box::new(Plain::new("bison", BuildGroup::Common)),
        Box::new(Plain::new("snappy", BuildGroup::PotentiallyInstrumented)),
        Box::new(Plain::new("glog", BuildGroup::PotentiallyInstrumented)),
    ]
}

fn names(deps: &[&dyn Dependency]) -> Vec<String> {
    deps.iter().map(|dep| dep.name().to_owned()).collect()
}

#[rstest]
#[case::everything(&[], &[], &["bison", "snappy", "glog"])]
#[case::named_keep_definition_order(&["glog", "bison"], &[], &["bison", "glog"])]
#[case::skip(&[], &["snappy"], &["bison", "glog"])]
#[case::named_and_skipped(&["glog"], &["glog"], &[])]
fn selects_dependencies_by_name(
    #[case] wanted: &[&str],
    #[case] skip: &[&str],
    #[case] expected: &[&str],
) {
    let all = definitions();
    let wanted: Vec<String> = wanted.iter().map(|name| (*name).to_owned()).collect();
    let skip: Vec<String> = skip.iter().map(|name| (*name).to_owned()).collect();

    let selected = select_dependencies(&all, &wanted, &skip).expect("known names");

    assert_eq!(names(&selected), expected);
}

#[test]
fn unknown_dependency_names_are_rejected() {
    let all = definitions();

    let err = select_dependencies(&all, &["zlib".to_owned()], &[]).err().expect("zlib is unknown");

    assert!(matches!(err, BuilderError::UnknownDependency { ref name } if name == "zlib"));
}

#[test]
fn ensure_build_group_names_the_offender() {
    let bison = Plain::new("bison", BuildGroup::Common);
    let glog = Plain::new("glog", BuildGroup::PotentiallyInstrumented);

    ensure_build_group(&[&bison], BuildGroup::Common).expect("all common");
    let err = ensure_build_group(&[&bison, &glog], BuildGroup::Common).expect_err("glog differs");

    assert_eq!(
        err.to_string(),
        "Expected the given list of dependencies to be in the common build group, found: \
         potentially_instrumented for dependency glog. All dependency names subjected to this \
         requirement: bison, glog"
    );
}
