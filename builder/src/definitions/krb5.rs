//! MIT Kerberos.

use super::is_installed;
use crate::build_type::BuildGroup;
use crate::context::BuildContext;
use crate::dependency::Dependency;
use crate::descriptor::DependencyDescriptor;
use crate::error::Result;
use crate::session::BuildSession;
use crate::strategy::ConfigureOptions;

/// `krb5`, configured from the `src` sub-directory of the release.
pub struct Krb5 {
    descriptor: DependencyDescriptor,
}

impl Krb5 {
    /// Creates the definition.
    ///
    /// # Errors
    ///
    /// Fails only if the descriptor is malformed.
    pub fn new() -> Result<Self> {
        let descriptor =
            DependencyDescriptor::builder("krb5", "1.19.2", BuildGroup::PotentiallyInstrumented)
                .download_url("https://kerberos.org/dist/krb5/1.19/krb5-{0}.tar.gz")
                .copy_sources()
                .build()?;
        Ok(Self { descriptor })
    }
}

impl Dependency for Krb5 {
    fn descriptor(&self) -> &DependencyDescriptor {
        &self.descriptor
    }

    fn should_build(&self, context: &BuildContext<'_>) -> bool {
        !is_installed(context, "include/krb5.h")
    }

    fn build(&self, session: &mut BuildSession<'_>) -> Result<()> {
        session.build_with_configure(&ConfigureOptions::new().src_subdir("src"))
    }
}
