//! Shared test utilities for the builder crate.

use crate::build_type::{BuildGroup, BuildType};
use crate::context::{BuildContext, BuildSettings};
use crate::dependency::Dependency;
use crate::descriptor::DependencyDescriptor;
use crate::layout::FileSystemLayout;
use camino::Utf8PathBuf;
use tempfile::TempDir;
use thirdparty::ThirdpartyConfig;
use thirdparty_linkcheck::Platform;

/// A third-party tree in a temporary directory.
pub struct Workspace {
    _dir: TempDir,
    /// Layout rooted at the temporary directory.
    pub layout: FileSystemLayout,
    /// Linux settings with `-j2` and every instrumented build type.
    pub settings: BuildSettings,
}

impl Workspace {
    /// Creates the tree on disk.
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        let root = Utf8PathBuf::try_from(dir.path().to_path_buf()).expect("utf-8 temp dir");
        let layout = FileSystemLayout::new(root);
        layout.create_dirs().expect("create layout");

        let mut config = ThirdpartyConfig::default();
        config.build.parallelism = Some(2);
        config.build.build_types = vec!["uninstrumented".to_owned()];
        let settings =
            BuildSettings::from_config(&config, Platform::Linux).expect("valid settings");

        Self {
            _dir: dir,
            layout,
            settings,
        }
    }

    /// Context for one build type.
    pub fn context(&self, build_type: BuildType) -> BuildContext<'_> {
        BuildContext::new(&self.settings, &self.layout, build_type)
    }

    /// Creates a file with `contents` under the root, creating parents.
    pub fn write(&self, rel: &str, contents: &str) -> Utf8PathBuf {
        let path = self.layout.thirdparty_dir().join(rel);
        std::fs::create_dir_all(path.parent().expect("has parent")).expect("create dirs");
        std::fs::write(&path, contents).expect("write file");
        path
    }
}

/// A definition that only has a descriptor.
pub struct Plain(pub DependencyDescriptor);

impl Plain {
    /// Describes `name-1.0` in `group`.
    pub fn new(name: &str, group: BuildGroup) -> Self {
        Self(
            DependencyDescriptor::builder(name, "1.0", group)
                .build()
                .expect("valid descriptor"),
        )
    }

    /// Describes `name-1.0` in `group` with sources copied per build.
    pub fn copying_sources(name: &str, group: BuildGroup) -> Self {
        Self(
            DependencyDescriptor::builder(name, "1.0", group)
                .copy_sources()
                .build()
                .expect("valid descriptor"),
        )
    }
}

impl Dependency for Plain {
    fn descriptor(&self) -> &DependencyDescriptor {
        &self.0
    }
}

/// Returns the value of `name` in a command environment.
pub fn env_value<'e>(env: &'e [(String, String)], name: &str) -> Option<&'e str> {
    env.iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.as_str())
}
