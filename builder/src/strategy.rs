//! Reusable build strategies: configure-based, CMake-based and make-based.
//!
//! Definitions pick a strategy by calling the matching [`BuildSession`]
//! method from their [`build`](crate::dependency::Dependency::build) hook,
//! optionally surrounding it with custom steps.

use crate::error::Result;
use crate::session::BuildSession;
use camino::Utf8PathBuf;
use log::info;
use once_cell::sync::Lazy;
use regex::Regex;

static CMAKE_VAR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(-D[A-Z_]+)=(.*)$")
        .unwrap_or_else(|err| unreachable!("static CMake variable regex is valid: {err}"))
});

/// Options of an autotools-style `./configure && make && make install`.
#[derive(Clone, Debug, PartialEq, Eq)]
#[must_use]
pub struct ConfigureOptions {
    /// Arguments after `--prefix=`.
    pub args: Vec<String>,
    /// Run `./autogen.sh` first.
    pub run_autogen: bool,
    /// Run `autoreconf -fvi` first.
    pub run_autoreconf: bool,
    /// Sub-directory of the sources holding the `configure` script.
    pub src_subdir_name: Option<String>,
    /// Targets passed to the install `make` invocation.
    pub install_targets: Vec<String>,
}

impl Default for ConfigureOptions {
    fn default() -> Self {
        Self {
            args: Vec::new(),
            run_autogen: false,
            run_autoreconf: false,
            src_subdir_name: None,
            install_targets: vec!["install".to_owned()],
        }
    }
}

impl ConfigureOptions {
    /// Options with no extra arguments.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `--with-pic`.
    pub fn with_pic(self) -> Self {
        self.arg("--with-pic")
    }

    /// Adds one configure argument.
    pub fn arg(mut self, arg: &str) -> Self {
        self.args.push(arg.to_owned());
        self
    }

    /// Adds configure arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Runs `./autogen.sh` before configuring.
    pub fn autogen(mut self) -> Self {
        self.run_autogen = true;
        self
    }

    /// Runs `autoreconf -fvi` before configuring.
    pub fn autoreconf(mut self) -> Self {
        self.run_autoreconf = true;
        self
    }

    /// Configures from a sub-directory of the sources.
    pub fn src_subdir(mut self, name: &str) -> Self {
        self.src_subdir_name = Some(name.to_owned());
        self
    }
}

/// Options of a CMake build.
#[derive(Clone, Debug, PartialEq, Eq)]
#[must_use]
pub struct CmakeOptions {
    /// Arguments appended after the common and dependency arguments.
    pub args: Vec<String>,
    /// Generate Ninja files when `ninja` is available.
    pub use_ninja_if_available: bool,
    /// Extra arguments to the build tool invocation.
    pub extra_build_tool_args: Vec<String>,
    /// Run the install target after building.
    pub should_install: bool,
    /// Build twice, into `shared/` and `static/`.
    pub shared_and_static: bool,
    /// Sub-directory of the sources holding `CMakeLists.txt`.
    pub src_subdir_name: Option<String>,
}

impl Default for CmakeOptions {
    fn default() -> Self {
        Self {
            args: Vec::new(),
            use_ninja_if_available: true,
            extra_build_tool_args: Vec::new(),
            should_install: true,
            shared_and_static: false,
            src_subdir_name: None,
        }
    }
}

impl CmakeOptions {
    /// Options with no extra arguments.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds CMake arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Builds both shared and static libraries.
    pub fn shared_and_static(mut self) -> Self {
        self.shared_and_static = true;
        self
    }

    /// Skips the install target.
    pub fn without_install(mut self) -> Self {
        self.should_install = false;
        self
    }

    /// Always generates Unix Makefiles.
    pub fn without_ninja(mut self) -> Self {
        self.use_ninja_if_available = false;
        self
    }
}

/// Options of a plain `make && make install` build.
#[derive(Clone, Debug, PartialEq, Eq)]
#[must_use]
pub struct MakeOptions {
    /// Extra arguments to the build invocation.
    pub args: Vec<String>,
    /// Targets passed to the install invocation.
    pub install_targets: Vec<String>,
    /// Pass `<prefix_var>=<install prefix>` to both invocations.
    pub specify_prefix: bool,
    /// Variable name used with `specify_prefix`.
    pub prefix_var: String,
}

impl Default for MakeOptions {
    fn default() -> Self {
        Self {
            args: Vec::new(),
            install_targets: vec!["install".to_owned()],
            specify_prefix: false,
            prefix_var: "PREFIX".to_owned(),
        }
    }
}

impl MakeOptions {
    /// Options with no extra arguments.
    pub fn new() -> Self {
        Self::default()
    }

    /// Passes `PREFIX=<install prefix>` to make.
    pub fn with_prefix(mut self) -> Self {
        self.specify_prefix = true;
        self
    }
}

impl BuildSession<'_> {
    fn strategy_dirs(&self, src_subdir_name: Option<&str>) -> (Utf8PathBuf, Utf8PathBuf) {
        let mut src_root = self.source_root();
        let mut work_dir = self.build_dir();
        if let Some(subdir) = src_subdir_name {
            src_root = src_root.join(subdir);
            work_dir = work_dir.join(subdir);
        }
        (src_root, work_dir)
    }

    /// Runs the pre-configure steps and `configure`.
    ///
    /// # Errors
    ///
    /// Returns an error when a step fails or the working directory cannot be
    /// created.
    pub fn configure(&self, options: &ConfigureOptions) -> Result<()> {
        let (src_root, work_dir) = self.strategy_dirs(options.src_subdir_name.as_deref());
        std::fs::create_dir_all(&work_dir)?;

        if options.run_autogen {
            self.run_step_in(&src_root, &["./autogen.sh"])?;
        }
        if options.run_autoreconf {
            self.run_step_in(&src_root, &["autoreconf", "-fvi"])?;
        }

        let script = if self.dependency().descriptor().copy_sources() {
            "./configure".to_owned()
        } else {
            src_root.join("configure").into_string()
        };
        let command = self
            .command(&script)
            .arg(format!("--prefix={}", self.install_prefix()))
            .args(options.args.iter().cloned())
            .current_dir(&work_dir);
        self.run(&command)?;
        Ok(())
    }

    /// Runs `make -j<N>` and the install targets after `configure`.
    ///
    /// # Errors
    ///
    /// Returns an error when either invocation fails.
    pub fn make_and_install(&self, options: &ConfigureOptions) -> Result<()> {
        let (_, work_dir) = self.strategy_dirs(options.src_subdir_name.as_deref());
        let jobs = format!("-j{}", self.context().make_parallelism());
        self.run_step_in(&work_dir, &["make", jobs.as_str()])?;

        let mut install = vec!["make".to_owned()];
        install.extend(options.install_targets.iter().cloned());
        self.run_step_in(&work_dir, &install)
    }

    /// Configures, builds and installs an autotools package.
    ///
    /// # Errors
    ///
    /// Returns an error when any step fails.
    pub fn build_with_configure(&self, options: &ConfigureOptions) -> Result<()> {
        info!("{} Building with configure", self.log_prefix());
        self.configure(options)?;
        self.make_and_install(options)
    }

    /// Generates, builds and optionally installs a CMake project.
    ///
    /// # Errors
    ///
    /// Returns an error when a step fails, or when the dependency's
    /// `build.ninja` post-processing hook fails.
    pub fn build_with_cmake(&self, options: &CmakeOptions) -> Result<()> {
        let (src_root, _) = self.strategy_dirs(options.src_subdir_name.as_deref());
        let use_ninja = options.use_ninja_if_available && self.tools().is_ninja_available();
        let (generator, tool) = if use_ninja {
            ("Ninja", "ninja")
        } else {
            ("Unix Makefiles", "make")
        };
        info!(
            "{} Building with CMake using the {generator} generator",
            self.log_prefix()
        );

        let build_dir = self.build_dir();
        let variants = if options.shared_and_static {
            vec![
                (build_dir.join("shared"), Some("ON")),
                (build_dir.join("static"), Some("OFF")),
            ]
        } else {
            vec![(build_dir, None)]
        };

        let context = self.context();
        let dependency = self.dependency();
        for (dir, shared_libs) in variants {
            std::fs::create_dir_all(&dir)?;

            let mut args = vec![
                src_root.to_string(),
                format!("-DCMAKE_INSTALL_PREFIX={}", self.install_prefix()),
                "-G".to_owned(),
                generator.to_owned(),
            ];
            args.extend(context.common_cmake_flag_args(dependency));
            args.extend(dependency.additional_cmake_args(context));
            args.extend(options.args.iter().cloned());
            if let Some(value) = shared_libs {
                args.push(format!("-DBUILD_SHARED_LIBS={value}"));
            }
            info!(
                "{} CMake arguments in {dir}:\n{}",
                self.log_prefix(),
                format_cmake_args_for_log(&args)
            );
            self.run(&self.command("cmake").args(args).current_dir(&dir))?;

            if use_ninja {
                dependency.postprocess_ninja_build_file(context, &dir.join("build.ninja"))?;
            }

            let jobs = format!("-j{}", context.make_parallelism());
            self.run(
                &self
                    .command(tool)
                    .arg(jobs)
                    .args(options.extra_build_tool_args.iter().cloned())
                    .current_dir(&dir),
            )?;
            if options.should_install {
                self.run(&self.command(tool).arg("install").current_dir(&dir))?;
            }
        }
        Ok(())
    }

    /// Builds and installs with plain `make`.
    ///
    /// # Errors
    ///
    /// Returns an error when either invocation fails.
    pub fn build_with_make(&self, options: &MakeOptions) -> Result<()> {
        info!("{} Building with make", self.log_prefix());
        let work_dir = self.source_root();
        let prefix_arg = options
            .specify_prefix
            .then(|| format!("{}={}", options.prefix_var, self.install_prefix()));

        let mut build = vec![
            "make".to_owned(),
            format!("-j{}", self.context().make_parallelism()),
        ];
        build.extend(options.args.iter().cloned());
        build.extend(prefix_arg.iter().cloned());
        self.run_step_in(&work_dir, &build)?;

        let mut install = vec!["make".to_owned()];
        install.extend(options.install_targets.iter().cloned());
        install.extend(prefix_arg);
        self.run_step_in(&work_dir, &install)
    }
}

/// Formats CMake arguments one per line, splitting multi-word `-D` values
/// across indented continuation lines.
///
/// # Examples
///
/// ```
/// use thirdparty_builder::strategy::format_cmake_args_for_log;
///
/// let args = ["-DCMAKE_C_FLAGS=-O2 -g -fPIC".to_owned(), "-GNinja".to_owned()];
/// assert_eq!(
///     format_cmake_args_for_log(&args),
///     "    -DCMAKE_C_FLAGS=\"-O2\n                     -g\n                     -fPIC\"\n    -GNinja"
/// );
/// ```
#[must_use]
pub fn format_cmake_args_for_log(args: &[String]) -> String {
    let mut lines = Vec::new();
    for arg in args {
        if let Some(caps) = CMAKE_VAR_RE.captures(arg) {
            let name = caps.get(1).map_or("", |m| m.as_str());
            let parts: Vec<&str> = caps
                .get(2)
                .map_or("", |m| m.as_str())
                .split_whitespace()
                .collect();
            if let [first, middle @ .., last] = parts.as_slice() {
                let indent = " ".repeat(name.len() + 2);
                lines.push(format!("{name}=\"{first}"));
                lines.extend(middle.iter().map(|part| format!("{indent}{part}")));
                lines.push(format!("{indent}{last}\""));
                continue;
            }
        }
        lines.push(arg.clone());
    }
    lines
        .iter()
        .map(|line| format!("    {line}"))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
#[path = "strategy_tests.rs"]
mod tests;
