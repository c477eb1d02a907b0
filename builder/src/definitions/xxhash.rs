//! xxHash, built with its own Makefile.

use super::is_installed;
use crate::build_type::BuildGroup;
use crate::context::BuildContext;
use crate::dependency::Dependency;
use crate::descriptor::DependencyDescriptor;
use crate::error::Result;
use crate::session::BuildSession;
use crate::strategy::MakeOptions;

/// `xxhash` installed with `make PREFIX=<prefix> install`.
pub struct XxHash {
    descriptor: DependencyDescriptor,
}

impl XxHash {
    /// Creates the definition.
    ///
    /// # Errors
    ///
    /// Fails only if the descriptor is malformed.
    pub fn new() -> Result<Self> {
        let descriptor = DependencyDescriptor::builder("xxhash", "0.8.1", BuildGroup::Common)
            .download_url("https://github.com/Cyan4973/xxHash/archive/refs/tags/v{0}.tar.gz")
            .copy_sources()
            .build()?;
        Ok(Self { descriptor })
    }
}

impl Dependency for XxHash {
    fn descriptor(&self) -> &DependencyDescriptor {
        &self.descriptor
    }

    fn should_build(&self, context: &BuildContext<'_>) -> bool {
        !is_installed(context, "include/xxhash.h")
    }

    fn build(&self, session: &mut BuildSession<'_>) -> Result<()> {
        session.build_with_make(&MakeOptions::new().with_prefix())
    }
}
