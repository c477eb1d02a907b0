//! Behaviour-driven tests for build group scheduling.
//!
//! Builds run against a temporary third-party tree; `make install` is
//! scripted through `StubExecutor` and leaves a marker file in the prefix.

use camino::Utf8PathBuf;
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use std::cell::RefCell;
use tempfile::TempDir;
use thirdparty::ThirdpartyConfig;
use thirdparty_builder::build_type::{BuildGroup, BuildType};
use thirdparty_builder::context::{BuildContext, BuildSettings};
use thirdparty_builder::dependency::Dependency;
use thirdparty_builder::descriptor::DependencyDescriptor;
use thirdparty_builder::error::{BuilderError, Result as BuilderResult};
use thirdparty_builder::layout::FileSystemLayout;
use thirdparty_builder::probe::ToolAvailability;
use thirdparty_builder::scheduler::{BuildReport, BuildScheduler, BuildStatus};
use thirdparty_builder::session::BuildSession;
use thirdparty_common::test_support::{ExpectedCall, StubExecutor, failure_output, success_output};
use thirdparty_linkcheck::Platform;

struct Marker(DependencyDescriptor);

impl Marker {
    fn new(name: &str, group: BuildGroup) -> Self {
        Self(
            DependencyDescriptor::builder(name, "1.0", group)
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

    fn build(&self, session: &mut BuildSession<'_>) -> BuilderResult<()> {
        session.run_step(&["make", "install"])?;
        let prefix = session.install_prefix();
        std::fs::create_dir_all(&prefix)?;
        std::fs::write(prefix.join(self.name()), "")?;
        Ok(())
    }
}

#[derive(Default)]
struct SchedulerWorld {
    dir: RefCell<Option<TempDir>>,
    deps: RefCell<Vec<Marker>>,
    build_types: RefCell<Vec<BuildType>>,
    calls: RefCell<Vec<ExpectedCall>>,
    reports: RefCell<Vec<BuildReport>>,
    error: RefCell<Option<BuilderError>>,
}

#[fixture]
fn scheduler_world() -> SchedulerWorld {
    SchedulerWorld::default()
}

impl SchedulerWorld {
    fn root(&self) -> Utf8PathBuf {
        if self.dir.borrow().is_none() {
            self.dir
                .replace(Some(TempDir::new().expect("failed to create temp dir")));
        }
        let dir = self.dir.borrow();
        let path = dir.as_ref().expect("temp dir set").path().to_path_buf();
        Utf8PathBuf::try_from(path).expect("temp dir path not UTF-8")
    }

    fn layout(&self) -> FileSystemLayout {
        FileSystemLayout::new(self.root())
    }
}

fn make_install(succeeds: bool) -> ExpectedCall {
    let output = if succeeds {
        success_output()
    } else {
        failure_output("make: *** [install] Error 2")
    };
    ExpectedCall::new("make", ["install"], Ok(output))
}

#[given("a common dependency bison and an instrumented dependency glog")]
fn given_bison_and_glog(scheduler_world: &SchedulerWorld) {
    scheduler_world.deps.replace(vec![
        Marker::new("glog", BuildGroup::PotentiallyInstrumented),
        Marker::new("bison", BuildGroup::Common),
    ]);
}

#[given("the requested build types are asan and uninstrumented")]
fn given_build_types(scheduler_world: &SchedulerWorld) {
    scheduler_world
        .build_types
        .replace(vec![BuildType::Asan, BuildType::Uninstrumented]);
    scheduler_world
        .calls
        .replace((0..3).map(|_| make_install(true)).collect());
}

#[given("the build of glog fails")]
fn given_glog_fails(scheduler_world: &SchedulerWorld) {
    scheduler_world
        .calls
        .replace(vec![make_install(true), make_install(false)]);
}

#[when("the dependencies are built")]
fn when_built(scheduler_world: &SchedulerWorld) {
    run_scheduler(scheduler_world);
}

#[when("the dependencies are built again")]
fn when_built_again(scheduler_world: &SchedulerWorld) {
    run_scheduler(scheduler_world);
}

fn run_scheduler(scheduler_world: &SchedulerWorld) {
    let layout = scheduler_world.layout();
    layout.create_dirs().expect("create layout");
    let mut settings = BuildSettings::from_config(&ThirdpartyConfig::default(), Platform::Linux)
        .expect("default settings");
    settings.build_types = scheduler_world.build_types.borrow().clone();
    settings.parallelism = 2;
    let executor = StubExecutor::new(scheduler_world.calls.take());
    let tools = ToolAvailability::fixed([("ninja", false)]);
    let deps = scheduler_world.deps.borrow();
    let refs: Vec<&dyn Dependency> = deps.iter().map(|dep| dep as &dyn Dependency).collect();

    match BuildScheduler::new(&settings, &layout, &executor, &tools).run(&refs) {
        Ok(report) => {
            executor.assert_finished();
            scheduler_world.reports.borrow_mut().push(report);
        }
        Err(err) => {
            scheduler_world.error.replace(Some(err));
        }
    }
}

#[when("a descriptor is created with build group instrumented")]
fn when_unknown_group(scheduler_world: &SchedulerWorld) {
    let err = "instrumented"
        .parse::<BuildGroup>()
        .expect_err("instrumented is not a build group");
    scheduler_world.error.replace(Some(err));
}

#[then("the build order is bison common, glog uninstrumented, glog asan")]
fn then_build_order(scheduler_world: &SchedulerWorld) {
    let reports = scheduler_world.reports.borrow();
    let report = reports.first().expect("one run");
    let order: Vec<(&str, BuildType)> = report
        .records()
        .iter()
        .map(|record| (record.name.as_str(), record.build_type))
        .collect();
    assert_eq!(
        order,
        vec![
            ("bison", BuildType::Common),
            ("glog", BuildType::Uninstrumented),
            ("glog", BuildType::Asan),
        ]
    );
}

#[then("the second run built nothing")]
fn then_second_run_idle(scheduler_world: &SchedulerWorld) {
    let reports = scheduler_world.reports.borrow();
    let second = reports.get(1).expect("two runs");
    assert_eq!(second.count(BuildStatus::Built), 0);
    assert_eq!(second.count(BuildStatus::Skipped), 3);
}

#[then("the run fails with a tool error")]
fn then_tool_error(scheduler_world: &SchedulerWorld) {
    let error = scheduler_world.error.borrow();
    let err = error.as_ref().expect("run failed");
    assert!(matches!(err, BuilderError::Tool(_)), "unexpected error: {err}");
    assert!(!err.is_configuration_error());
}

#[then("bison stays installed")]
fn then_bison_installed(scheduler_world: &SchedulerWorld) {
    let prefix = scheduler_world.layout().installed_prefix(BuildType::Common);
    assert!(prefix.join("bison").exists());
}

#[then("a configuration error names instrumented")]
fn then_configuration_error(scheduler_world: &SchedulerWorld) {
    let error = scheduler_world.error.borrow();
    let err = error.as_ref().expect("error recorded");
    assert!(err.is_configuration_error());
    assert!(err.to_string().contains("instrumented"));
}

#[scenario(path = "tests/features/scheduler.feature", index = 0)]
fn scenario_common_group_first(scheduler_world: SchedulerWorld) {
    let _ = scheduler_world;
}

#[scenario(path = "tests/features/scheduler.feature", index = 1)]
fn scenario_rerun_is_idle(scheduler_world: SchedulerWorld) {
    let _ = scheduler_world;
}

#[scenario(path = "tests/features/scheduler.feature", index = 2)]
fn scenario_fail_fast(scheduler_world: SchedulerWorld) {
    let _ = scheduler_world;
}

#[scenario(path = "tests/features/scheduler.feature", index = 3)]
fn scenario_unknown_group(scheduler_world: SchedulerWorld) {
    let _ = scheduler_world;
}
