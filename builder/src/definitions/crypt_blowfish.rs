//! `crypt_blowfish`, a bcrypt implementation without a build system of its
//! own beyond a plain Makefile. The static archive is assembled by hand.

use super::is_installed;
use crate::build_type::BuildGroup;
use crate::context::BuildContext;
use crate::dependency::Dependency;
use crate::descriptor::DependencyDescriptor;
use crate::error::Result;
use crate::session::{BuildSession, glob_files};
use log::info;

const ARCHIVE: &str = "libcrypt_blowfish.a";

/// Builds the objects with `make` and archives them with `ar`.
pub struct CryptBlowfish {
    descriptor: DependencyDescriptor,
}

impl CryptBlowfish {
    /// Creates the definition.
    ///
    /// # Errors
    ///
    /// Fails only if the descriptor is malformed.
    pub fn new() -> Result<Self> {
        let descriptor = DependencyDescriptor::builder(
            "crypt_blowfish",
            "1.0.0",
            BuildGroup::PotentiallyInstrumented,
        )
        .download_url("https://github.com/yugabyte/crypt_blowfish/archive/refs/tags/v{0}.tar.gz")
        .copy_sources()
        .build()?;
        Ok(Self { descriptor })
    }
}

impl Dependency for CryptBlowfish {
    fn descriptor(&self) -> &DependencyDescriptor {
        &self.descriptor
    }

    fn should_build(&self, context: &BuildContext<'_>) -> bool {
        !is_installed(context, &format!("lib/{ARCHIVE}"))
    }

    fn build(&self, session: &mut BuildSession<'_>) -> Result<()> {
        session.run_step(&["make", "clean"])?;
        session.run_step(&["make"])?;

        let build_dir = session.build_dir();
        let prefix = session.install_prefix();
        session.copy_matching(&build_dir, "*.h", &prefix.join("include/crypt_blowfish"))?;

        let mut ar = vec!["ar".to_owned(), "r".to_owned(), ARCHIVE.to_owned()];
        for object in glob_files(&build_dir, "*.o")? {
            if let Some(name) = object.file_name() {
                ar.push(name.to_owned());
            }
        }
        session.run_step(&ar)?;

        let lib_dir = prefix.join("lib");
        std::fs::create_dir_all(&lib_dir)?;
        info!("{} Moving {ARCHIVE} to {lib_dir}", session.log_prefix());
        std::fs::rename(build_dir.join(ARCHIVE), lib_dir.join(ARCHIVE))?;
        Ok(())
    }
}
