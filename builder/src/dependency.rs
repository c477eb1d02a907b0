//! The [`Dependency`] trait every build definition implements.
//!
//! A definition owns an immutable [`DependencyDescriptor`] and overrides the
//! hooks it needs; everything else has a default. The scheduler only ever
//! talks to definitions through this trait.

use crate::context::BuildContext;
use crate::descriptor::DependencyDescriptor;
use crate::error::{BuilderError, Result};
use crate::session::BuildSession;
use camino::{Utf8Path, Utf8PathBuf};

/// Build behaviour of one third-party package.
pub trait Dependency {
    /// Immutable package metadata.
    fn descriptor(&self) -> &DependencyDescriptor;

    /// Package name, shorthand for `descriptor().name()`.
    fn name(&self) -> &str {
        self.descriptor().name()
    }

    /// Whether the package needs building for this context.
    ///
    /// Definitions that can detect an existing installation return `false`
    /// so that re-running a completed build does nothing.
    fn should_build(&self, context: &BuildContext<'_>) -> bool {
        let _ = context;
        true
    }

    /// Prefix the package installs into.
    fn install_prefix(&self, context: &BuildContext<'_>) -> Utf8PathBuf {
        context.prefix()
    }

    /// Base name of the source directory, `name-version`.
    fn source_dir_basename(&self) -> String {
        self.descriptor().dir_name()
    }

    /// Extra flags for both C and C++ compilations.
    fn additional_compiler_flags(&self, context: &BuildContext<'_>) -> Vec<String> {
        let _ = context;
        Vec::new()
    }

    /// Extra flags for C compilations.
    fn additional_c_flags(&self, context: &BuildContext<'_>) -> Vec<String> {
        let _ = context;
        Vec::new()
    }

    /// Extra flags for C++ compilations.
    fn additional_cxx_flags(&self, context: &BuildContext<'_>) -> Vec<String> {
        let _ = context;
        Vec::new()
    }

    /// Extra linker flags.
    fn additional_ld_flags(&self, context: &BuildContext<'_>) -> Vec<String> {
        let _ = context;
        Vec::new()
    }

    /// Extra arguments for the CMake generation step.
    fn additional_cmake_args(&self, context: &BuildContext<'_>) -> Vec<String> {
        let _ = context;
        Vec::new()
    }

    /// Directories outside the third-party tree whose shared libraries the
    /// package's binaries may load.
    fn shared_lib_dirs(&self, context: &BuildContext<'_>) -> Vec<Utf8PathBuf> {
        let _ = context;
        Vec::new()
    }

    /// Adjusts `build.ninja` after CMake generated it.
    ///
    /// # Errors
    ///
    /// The default fails with an I/O error when the file does not exist.
    fn postprocess_ninja_build_file(
        &self,
        context: &BuildContext<'_>,
        path: &Utf8Path,
    ) -> Result<()> {
        let _ = context;
        if path.is_file() {
            return Ok(());
        }
        Err(BuilderError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("{path} not found"),
        )))
    }

    /// Builds and installs the package.
    ///
    /// # Errors
    ///
    /// The default fails with [`BuilderError::BuildNotImplemented`].
    fn build(&self, session: &mut BuildSession<'_>) -> Result<()> {
        let _ = session;
        Err(BuilderError::BuildNotImplemented {
            name: self.name().to_owned(),
        })
    }
}
