use super::is_installed;
use crate::build_type::BuildGroup;
use crate::context::BuildContext;
use crate::dependency::Dependency;
use crate::descriptor::DependencyDescriptor;
use crate::error::Result;
use crate::session::BuildSession;
use crate::strategy::CmakeOptions;

/// `HdrHistogram_c` without its command-line programs.
pub struct HdrHistogram {
    descriptor: DependencyDescriptor,
}

impl HdrHistogram {
    /// Creates the definition.
    ///
    /// # Errors
    ///
    /// Fails only if the descriptor is malformed.
    pub fn new() -> Result<Self> {
        let descriptor = DependencyDescriptor::builder(
            "hdrhistogram",
            "0.11.6-yb-3",
            BuildGroup::PotentiallyInstrumented,
        )
        .download_url("https://github.com/yugabyte/HdrHistogram_c/archive/hdrhistogram-{0}.tar.gz")
        .copy_sources()
        .build()?;
        Ok(Self { descriptor })
    }
}

impl Dependency for HdrHistogram {
    fn descriptor(&self) -> &DependencyDescriptor {
        &self.descriptor
    }

    fn should_build(&self, context: &BuildContext<'_>) -> bool {
        !is_installed(context, "include/hdr/hdr_histogram.h")
    }

    fn additional_cmake_args(&self, _context: &BuildContext<'_>) -> Vec<String> {
        [
            "-DCMAKE_BUILD_TYPE=Release",
            "-DHDR_HISTOGRAM_BUILD_PROGRAMS=OFF",
            "-DHDR_LOG_REQUIRED=DISABLED",
        ]
        .map(str::to_owned)
        .to_vec()
    }

    fn build(&self, session: &mut BuildSession<'_>) -> Result<()> {
        session.build_with_cmake(&CmakeOptions::new().shared_and_static())
    }
}
