//! Workspace-wide configuration loaded from `thirdparty.toml`.
//!
//! The builder keeps its tunables in a single TOML file at the root of the
//! third-party directory. Every table falls back to its defaults when omitted,
//! so an absent file behaves exactly like an empty one. Unknown keys are
//! rejected to catch typos early rather than silently building with defaults.

use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;
use thiserror::Error;

/// File name looked up in the third-party root directory.
pub const CONFIG_FILE_NAME: &str = "thirdparty.toml";

/// Minimum macOS version binaries must declare unless configured otherwise.
pub const DEFAULT_MIN_MACOS_VERSION: &str = "11.0";

/// Errors raised while loading `thirdparty.toml`.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file exists but could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        /// Path of the configuration file.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML or has unexpected fields.
    #[error("invalid configuration in {path}: {reason}")]
    Parse {
        /// Path of the configuration file.
        path: Utf8PathBuf,
        /// Parser message.
        reason: String,
    },
}

/// Complete configuration for a builder run.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ThirdpartyConfig {
    /// Compiler selection and global flags.
    pub compilers: CompilerConfig,
    /// Build scheduling settings.
    pub build: BuildSettingsConfig,
    /// Compiler wrapper enforcement settings.
    pub wrapper: WrapperConfig,
    /// Post-build linkage verification settings.
    pub linkage: LinkageConfig,
}

impl ThirdpartyConfig {
    /// Loads the configuration from `dir/thirdparty.toml`.
    ///
    /// A missing file yields the default configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file cannot be read or parsed.
    ///
    /// # Examples
    ///
    /// ```
    /// use thirdparty::ThirdpartyConfig;
    ///
    /// let dir = tempfile::tempdir()?;
    /// let dir = camino::Utf8Path::from_path(dir.path()).expect("utf-8 temp dir");
    /// let config = ThirdpartyConfig::load_from_dir(dir)?;
    /// assert_eq!(config, ThirdpartyConfig::default());
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load_from_dir(dir: &Utf8Path) -> Result<Self, ConfigError> {
        Self::load(&dir.join(CONFIG_FILE_NAME))
    }

    /// Loads the configuration from an explicit path.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file cannot be read or parsed.
    pub fn load(path: &Utf8Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_owned(),
            source,
        })?;

        Self::parse(&contents).map_err(|reason| ConfigError::Parse {
            path: path.to_owned(),
            reason,
        })
    }

    fn parse(contents: &str) -> Result<Self, String> {
        toml::from_str(contents).map_err(|e| e.message().to_owned())
    }
}

/// Compilers and flags applied to every dependency.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct CompilerConfig {
    /// Real C compiler; `cc` from `PATH` when absent.
    pub c_compiler: Option<Utf8PathBuf>,
    /// Real C++ compiler; `c++` from `PATH` when absent.
    pub cxx_compiler: Option<Utf8PathBuf>,
    /// Flags passed to both C and C++ compilations.
    pub compiler_flags: Vec<String>,
    /// Flags passed to C compilations only.
    pub c_flags: Vec<String>,
    /// Flags passed to C++ compilations only.
    pub cxx_flags: Vec<String>,
    /// Flags passed to the linker.
    pub ld_flags: Vec<String>,
}

/// Which build types to produce and how hard to drive `make`.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct BuildSettingsConfig {
    /// Instrumented build types to produce, by directory name.
    pub build_types: Vec<String>,
    /// Parallelism passed as `-j`; the CPU count when absent.
    pub parallelism: Option<usize>,
}

impl Default for BuildSettingsConfig {
    fn default() -> Self {
        Self {
            build_types: vec!["uninstrumented".to_owned()],
            parallelism: None,
        }
    }
}

/// Settings exported to the compiler wrapper through its environment.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct WrapperConfig {
    /// Include directories that dependencies must never pick up.
    pub disallowed_include_dirs: Vec<Utf8PathBuf>,
    /// Route compilations through `ccache`.
    pub use_ccache: bool,
    /// Linker flags appended when a shared library is linked.
    pub ld_flags_to_append: Vec<String>,
    /// Linker flags stripped when a shared library is linked.
    pub ld_flags_to_remove: Vec<String>,
}

/// Post-build linkage verification settings.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct LinkageConfig {
    /// Minimum macOS version every Mach-O binary must declare.
    pub min_macos_version: String,
    /// Additional directories whose shared libraries may be linked.
    pub extra_allowed_shared_lib_paths: Vec<Utf8PathBuf>,
    /// Additional raw regular expressions accepted for inspection lines.
    pub extra_allowed_patterns: Vec<String>,
    /// Accept the system `libstdc++` as a resolved dependency.
    pub allow_system_libstdcxx: bool,
}

impl Default for LinkageConfig {
    fn default() -> Self {
        Self {
            min_macos_version: DEFAULT_MIN_MACOS_VERSION.to_owned(),
            extra_allowed_shared_lib_paths: Vec::new(),
            extra_allowed_patterns: Vec::new(),
            allow_system_libstdcxx: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn defaults_build_uninstrumented_only() {
        let config = ThirdpartyConfig::default();

        assert_eq!(config.build.build_types, vec!["uninstrumented".to_owned()]);
        assert_eq!(config.linkage.min_macos_version, DEFAULT_MIN_MACOS_VERSION);
        assert!(!config.wrapper.use_ccache);
    }

    #[rstest]
    fn deserialises_overrides_from_toml() {
        let source = concat!(
            "[build]\n",
            "build_types = [\"asan\", \"tsan\"]\n",
            "parallelism = 8\n",
            "[linkage]\n",
            "min_macos_version = \"13.0\"\n",
            "extra_allowed_shared_lib_paths = [\"/opt/llvm/lib\"]\n",
        );

        let config =
            ThirdpartyConfig::parse(source).expect("expected configuration to parse successfully");

        assert_eq!(config.build.build_types, vec!["asan", "tsan"]);
        assert_eq!(config.build.parallelism, Some(8));
        assert_eq!(config.linkage.min_macos_version, "13.0");
        assert_eq!(
            config.linkage.extra_allowed_shared_lib_paths,
            vec![Utf8PathBuf::from("/opt/llvm/lib")]
        );
    }

    #[rstest]
    fn rejects_unknown_fields() {
        let source = "[wrapper]\nuse_cache = true\n";

        assert!(ThirdpartyConfig::parse(source).is_err());
    }

    #[rstest]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let path = Utf8PathBuf::try_from(dir.path().join(CONFIG_FILE_NAME))
            .expect("temp dir path not UTF-8");

        let config = ThirdpartyConfig::load(&path).expect("missing file should load");

        assert_eq!(config, ThirdpartyConfig::default());
    }

    #[rstest]
    fn invalid_file_reports_path() {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let path = Utf8PathBuf::try_from(dir.path().join(CONFIG_FILE_NAME))
            .expect("temp dir path not UTF-8");
        std::fs::write(&path, "[build\n").expect("failed to write config");

        let err = ThirdpartyConfig::load(&path).expect_err("expected a parse error");

        assert!(err.to_string().contains(path.as_str()));
    }
}
