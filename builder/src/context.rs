//! Run-wide build settings and the per-build-type context derived from them.
//!
//! The environment a dependency is built with (compilers, flags and the
//! compiler wrapper variables) is computed here as plain data and attached
//! to each command; the builder never mutates its own process environment.

use crate::build_type::BuildType;
use crate::dependency::Dependency;
use crate::env_vars;
use crate::error::Result;
use crate::layout::FileSystemLayout;
use camino::Utf8PathBuf;
use log::{debug, warn};
use thirdparty::ThirdpartyConfig;
use thirdparty_linkcheck::Platform;

/// Settings shared by every dependency build in one run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BuildSettings {
    /// Host platform.
    pub platform: Platform,
    /// Instrumented build types requested for this run.
    pub build_types: Vec<BuildType>,
    /// Real C compiler.
    pub c_compiler: Utf8PathBuf,
    /// Real C++ compiler.
    pub cxx_compiler: Utf8PathBuf,
    /// Flags for both C and C++ compilations.
    pub compiler_flags: Vec<String>,
    /// Flags for C compilations.
    pub c_flags: Vec<String>,
    /// Flags for C++ compilations.
    pub cxx_flags: Vec<String>,
    /// Linker flags.
    pub ld_flags: Vec<String>,
    /// `make -j` / `ninja -j` parallelism.
    pub parallelism: usize,
    /// Compiler wrapper binary; compilers are invoked directly when absent.
    pub compiler_wrapper: Option<Utf8PathBuf>,
    /// Include directories the wrapper rejects.
    pub disallowed_include_dirs: Vec<Utf8PathBuf>,
    /// Route compilations through `ccache`.
    pub use_ccache: bool,
    /// Linker flags the wrapper appends to shared library links.
    pub ld_flags_to_append: Vec<String>,
    /// Linker flags the wrapper strips from shared library links.
    pub ld_flags_to_remove: Vec<String>,
    /// Remove each build directory before building into it.
    pub delete_build_dir: bool,
    /// Echo wrapper commands.
    pub verbose: bool,
}

impl BuildSettings {
    /// Derives settings from the configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::BuilderError::InvalidBuildType`] when the
    /// configuration names an unknown build type.
    pub fn from_config(config: &ThirdpartyConfig, platform: Platform) -> Result<Self> {
        let build_types = config
            .build
            .build_types
            .iter()
            .map(|name| name.parse())
            .collect::<Result<Vec<BuildType>>>()?;
        let compilers = &config.compilers;

        Ok(Self {
            platform,
            build_types,
            c_compiler: compilers
                .c_compiler
                .clone()
                .unwrap_or_else(|| Utf8PathBuf::from("cc")),
            cxx_compiler: compilers
                .cxx_compiler
                .clone()
                .unwrap_or_else(|| Utf8PathBuf::from("c++")),
            compiler_flags: compilers.compiler_flags.clone(),
            c_flags: compilers.c_flags.clone(),
            cxx_flags: compilers.cxx_flags.clone(),
            ld_flags: compilers.ld_flags.clone(),
            parallelism: config.build.parallelism.unwrap_or_else(default_parallelism),
            compiler_wrapper: None,
            disallowed_include_dirs: config.wrapper.disallowed_include_dirs.clone(),
            use_ccache: config.wrapper.use_ccache,
            ld_flags_to_append: config.wrapper.ld_flags_to_append.clone(),
            ld_flags_to_remove: config.wrapper.ld_flags_to_remove.clone(),
            delete_build_dir: false,
            verbose: false,
        })
    }
}

/// Parallelism from `THIRDPARTY_MAKE_PARALLELISM`, else the CPU count.
#[must_use]
pub fn default_parallelism() -> usize {
    if let Ok(value) = std::env::var(env_vars::MAKE_PARALLELISM) {
        match value.trim().parse::<usize>() {
            Ok(jobs) if jobs > 0 => return jobs,
            _ => warn!(
                "Ignoring invalid {}={value}",
                env_vars::MAKE_PARALLELISM
            ),
        }
    }
    std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get)
}

/// Everything a dependency sees while being built for one build type.
#[derive(Clone, Copy, Debug)]
pub struct BuildContext<'a> {
    settings: &'a BuildSettings,
    layout: &'a FileSystemLayout,
    build_type: BuildType,
}

impl<'a> BuildContext<'a> {
    /// Creates the context for one build type.
    #[must_use]
    pub fn new(
        settings: &'a BuildSettings,
        layout: &'a FileSystemLayout,
        build_type: BuildType,
    ) -> Self {
        Self {
            settings,
            layout,
            build_type,
        }
    }

    /// Build type being produced.
    #[must_use]
    pub fn build_type(&self) -> BuildType {
        self.build_type
    }

    /// Run-wide settings.
    #[must_use]
    pub fn settings(&self) -> &'a BuildSettings {
        self.settings
    }

    /// Third-party tree layout.
    #[must_use]
    pub fn layout(&self) -> &'a FileSystemLayout {
        self.layout
    }

    /// Host platform.
    #[must_use]
    pub fn platform(&self) -> Platform {
        self.settings.platform
    }

    /// Install prefix of this build type.
    #[must_use]
    pub fn prefix(&self) -> Utf8PathBuf {
        self.layout.installed_prefix(self.build_type)
    }

    /// `<prefix>/include`.
    #[must_use]
    pub fn prefix_include(&self) -> Utf8PathBuf {
        self.prefix().join("include")
    }

    /// `<prefix>/lib`.
    #[must_use]
    pub fn prefix_lib(&self) -> Utf8PathBuf {
        self.prefix().join("lib")
    }

    /// `<prefix>/bin`.
    #[must_use]
    pub fn prefix_bin(&self) -> Utf8PathBuf {
        self.prefix().join("bin")
    }

    /// Parallelism for `make` and `ninja`.
    #[must_use]
    pub fn make_parallelism(&self) -> usize {
        self.settings.parallelism
    }

    /// Flags passed to both C and C++ compilations of `dep`.
    #[must_use]
    pub fn compiler_flags(&self, dep: &dyn Dependency) -> Vec<String> {
        let mut flags = self.settings.compiler_flags.clone();
        flags.push(format!("-I{}", self.prefix_include()));
        if let Some(flag) = self.build_type.sanitizer_flag() {
            flags.push(flag.to_owned());
        }
        flags.extend(dep.additional_compiler_flags(self));
        flags
    }

    /// Full C flags of `dep`.
    #[must_use]
    pub fn c_flags(&self, dep: &dyn Dependency) -> Vec<String> {
        let mut flags = self.compiler_flags(dep);
        flags.extend(self.settings.c_flags.iter().cloned());
        flags.extend(dep.additional_c_flags(self));
        flags
    }

    /// Full C++ flags of `dep`.
    #[must_use]
    pub fn cxx_flags(&self, dep: &dyn Dependency) -> Vec<String> {
        let mut flags = self.compiler_flags(dep);
        flags.extend(self.settings.cxx_flags.iter().cloned());
        flags.extend(dep.additional_cxx_flags(self));
        flags
    }

    /// Full linker flags of `dep`.
    #[must_use]
    pub fn ld_flags(&self, dep: &dyn Dependency) -> Vec<String> {
        let lib = self.prefix_lib();
        let mut flags = self.settings.ld_flags.clone();
        flags.push(format!("-L{lib}"));
        flags.push(format!("-Wl,-rpath,{lib}"));
        if let Some(flag) = self.build_type.sanitizer_flag() {
            flags.push(flag.to_owned());
        }
        flags.extend(dep.additional_ld_flags(self));
        flags
    }

    /// CMake arguments carrying the compiler and linker flags of `dep`.
    #[must_use]
    pub fn common_cmake_flag_args(&self, dep: &dyn Dependency) -> Vec<String> {
        let ld_flags = self.ld_flags(dep).join(" ");
        vec![
            format!("-DCMAKE_C_FLAGS={}", self.c_flags(dep).join(" ")),
            format!("-DCMAKE_CXX_FLAGS={}", self.cxx_flags(dep).join(" ")),
            format!("-DCMAKE_EXE_LINKER_FLAGS={ld_flags}"),
            format!("-DCMAKE_SHARED_LINKER_FLAGS={ld_flags}"),
            format!("-DCMAKE_MODULE_LINKER_FLAGS={ld_flags}"),
            format!("-DCMAKE_PREFIX_PATH={}", self.prefix()),
        ]
    }

    /// Environment every build step of `dep` runs with.
    ///
    /// Lists that end up empty are left out so the inherited value, if any,
    /// stays in effect.
    #[must_use]
    pub fn build_env(&self, dep: &dyn Dependency) -> Vec<(String, String)> {
        let settings = self.settings;
        let mut env = EnvBuilder::default();

        match &settings.compiler_wrapper {
            Some(wrapper) => {
                env.set("CC", format!("{wrapper} --cc"));
                env.set("CXX", format!("{wrapper} --cxx"));
                env.set(env_vars::REAL_C_COMPILER, settings.c_compiler.to_string());
                env.set(env_vars::REAL_CXX_COMPILER, settings.cxx_compiler.to_string());
                env.set_list(
                    env_vars::DISALLOWED_INCLUDE_DIRS,
                    settings.disallowed_include_dirs.iter().map(|dir| dir.as_str()),
                    ":",
                );
                env.set(env_vars::USE_CCACHE, bool_var(settings.use_ccache));
                env.set(env_vars::VERBOSE, bool_var(settings.verbose));
                env.set_list(
                    env_vars::LD_FLAGS_TO_APPEND,
                    settings.ld_flags_to_append.iter().map(String::as_str),
                    " ",
                );
                env.set_list(
                    env_vars::LD_FLAGS_TO_REMOVE,
                    settings.ld_flags_to_remove.iter().map(String::as_str),
                    " ",
                );
            }
            None => {
                env.set("CC", settings.c_compiler.to_string());
                env.set("CXX", settings.cxx_compiler.to_string());
            }
        }

        env.set_list("CFLAGS", self.c_flags(dep).iter().map(String::as_str), " ");
        env.set_list("CXXFLAGS", self.cxx_flags(dep).iter().map(String::as_str), " ");
        env.set_list("LDFLAGS", self.ld_flags(dep).iter().map(String::as_str), " ");
        env.set(
            "PKG_CONFIG_PATH",
            self.prefix_lib().join("pkgconfig").to_string(),
        );
        env.vars
    }
}

fn bool_var(value: bool) -> String {
    if value { "1" } else { "0" }.to_owned()
}

#[derive(Default)]
struct EnvBuilder {
    vars: Vec<(String, String)>,
}

impl EnvBuilder {
    fn set(&mut self, name: &str, value: String) {
        debug!("Setting env var {name} to {value}");
        self.vars.push((name.to_owned(), value));
    }

    fn set_list<'s>(&mut self, name: &str, items: impl Iterator<Item = &'s str>, sep: &str) {
        let value = items.collect::<Vec<_>>().join(sep);
        let value = value.trim();
        if value.is_empty() {
            debug!("Leaving env var {name} unset");
        } else {
            self.set(name, value.to_owned());
        }
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;
