//! libverto, an event loop abstraction required by Kerberos' libkrad.

use super::is_installed;
use crate::build_type::BuildGroup;
use crate::context::BuildContext;
use crate::dependency::Dependency;
use crate::descriptor::DependencyDescriptor;
use crate::error::Result;
use crate::session::BuildSession;
use crate::strategy::ConfigureOptions;

/// `libverto` with only the libev backend.
pub struct LibVerto {
    descriptor: DependencyDescriptor,
}

impl LibVerto {
    /// Creates the definition.
    ///
    /// # Errors
    ///
    /// Fails only if the descriptor is malformed.
    pub fn new() -> Result<Self> {
        let descriptor =
            DependencyDescriptor::builder("libverto", "0.3.2", BuildGroup::PotentiallyInstrumented)
                .download_url(
                    "https://github.com/latchset/libverto/releases/download/{0}/libverto-{0}.tar.gz",
                )
                .copy_sources()
                .build()?;
        Ok(Self { descriptor })
    }
}

impl Dependency for LibVerto {
    fn descriptor(&self) -> &DependencyDescriptor {
        &self.descriptor
    }

    fn should_build(&self, context: &BuildContext<'_>) -> bool {
        !is_installed(context, "include/verto.h")
    }

    fn build(&self, session: &mut BuildSession<'_>) -> Result<()> {
        session.build_with_configure(&ConfigureOptions::new().args([
            "--without-glib",
            "--without-libevent",
            "--with-libev",
        ]))
    }
}
