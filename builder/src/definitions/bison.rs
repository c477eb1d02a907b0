//! GNU Bison, needed by the database's SQL grammar build.

use super::is_installed;
use crate::build_type::BuildGroup;
use crate::context::BuildContext;
use crate::dependency::Dependency;
use crate::descriptor::DependencyDescriptor;
use crate::error::Result;
use crate::session::BuildSession;
use crate::strategy::ConfigureOptions;

/// `bison` built with configure from copied sources.
pub struct Bison {
    descriptor: DependencyDescriptor,
}

impl Bison {
    /// Creates the definition.
    ///
    /// # Errors
    ///
    /// Fails only if the descriptor is malformed.
    pub fn new() -> Result<Self> {
        let descriptor = DependencyDescriptor::builder("bison", "3.4.1", BuildGroup::Common)
            .download_url("https://ftp.gnu.org/gnu/bison/bison-{0}.tar.gz")
            .copy_sources()
            .build()?;
        Ok(Self { descriptor })
    }
}

impl Dependency for Bison {
    fn descriptor(&self) -> &DependencyDescriptor {
        &self.descriptor
    }

    fn should_build(&self, context: &BuildContext<'_>) -> bool {
        !is_installed(context, "bin/bison")
    }

    fn build(&self, session: &mut BuildSession<'_>) -> Result<()> {
        session.build_with_configure(&ConfigureOptions::new().with_pic())
    }
}
