//! Google logging library.

use super::is_installed;
use crate::build_type::BuildGroup;
use crate::context::BuildContext;
use crate::dependency::Dependency;
use crate::descriptor::DependencyDescriptor;
use crate::error::Result;
use crate::session::BuildSession;
use crate::strategy::CmakeOptions;
use thirdparty_linkcheck::Platform;

/// `glog`, built with CMake as both shared and static libraries.
pub struct Glog {
    descriptor: DependencyDescriptor,
}

impl Glog {
    /// Creates the definition.
    ///
    /// # Errors
    ///
    /// Fails only if the descriptor is malformed.
    pub fn new() -> Result<Self> {
        let descriptor =
            DependencyDescriptor::builder("glog", "0.4.0-yb-2", BuildGroup::PotentiallyInstrumented)
                .download_url("https://github.com/yugabyte/glog/archive/v{0}.tar.gz")
                .patches([
                    "glog-tsan-annotations.patch",
                    "glog-symbolize-and-demangle.patch",
                ])
                .patch_strip(0)
                .post_patch(["autoreconf", "-fvi"])
                .build()?;
        Ok(Self { descriptor })
    }
}

impl Dependency for Glog {
    fn descriptor(&self) -> &DependencyDescriptor {
        &self.descriptor
    }

    fn should_build(&self, context: &BuildContext<'_>) -> bool {
        !is_installed(context, "include/glog/logging.h")
    }

    fn additional_cmake_args(&self, context: &BuildContext<'_>) -> Vec<String> {
        let mut args = vec!["-DCMAKE_BUILD_TYPE=Release".to_owned()];
        // The unit tests override new/delete, which the sanitizers reject.
        if context.build_type().is_sanitizer() {
            args.push("-DBUILD_TESTING=OFF".to_owned());
        }
        args
    }

    fn additional_ld_flags(&self, context: &BuildContext<'_>) -> Vec<String> {
        // pthread_rwlock_* stay undefined otherwise.
        if context.platform() == Platform::Linux && context.build_type().is_sanitizer() {
            vec!["-lpthread".to_owned()]
        } else {
            Vec::new()
        }
    }

    fn build(&self, session: &mut BuildSession<'_>) -> Result<()> {
        session.build_with_cmake(&CmakeOptions::new().shared_and_static())
    }
}
