use super::is_installed;
use crate::build_type::BuildGroup;
use crate::context::BuildContext;
use crate::dependency::Dependency;
use crate::descriptor::DependencyDescriptor;
use crate::error::Result;
use crate::session::BuildSession;
use crate::strategy::ConfigureOptions;

/// GNU `libunistring`.
pub struct Unistring {
    descriptor: DependencyDescriptor,
}

impl Unistring {
    /// Creates the definition.
    ///
    /// # Errors
    ///
    /// Fails only if the descriptor is malformed.
    pub fn new() -> Result<Self> {
        let descriptor =
            DependencyDescriptor::builder("unistring", "1.0", BuildGroup::PotentiallyInstrumented)
                .download_url("https://ftp.gnu.org/gnu/libunistring/libunistring-{0}.tar.gz")
                .copy_sources()
                .build()?;
        Ok(Self { descriptor })
    }
}

impl Dependency for Unistring {
    fn descriptor(&self) -> &DependencyDescriptor {
        &self.descriptor
    }

    fn should_build(&self, context: &BuildContext<'_>) -> bool {
        !is_installed(context, "include/unistr.h")
    }

    fn build(&self, session: &mut BuildSession<'_>) -> Result<()> {
        session.build_with_configure(&ConfigureOptions::new())
    }
}
