//! Snappy compression library.
//!
//! Built with configure from copied sources. The configure script sometimes
//! detects a system `liblzo2`, which the unit test then links against, so
//! the define is dropped from `config.h` before compiling. After the build,
//! headers and libtool outputs are gathered under `include/` and `lib/` of
//! the build directory.

use super::is_installed;
use crate::build_type::BuildGroup;
use crate::context::BuildContext;
use crate::dependency::Dependency;
use crate::descriptor::DependencyDescriptor;
use crate::error::Result;
use crate::session::BuildSession;
use crate::strategy::ConfigureOptions;
use log::{info, warn};

const LZO2_DEFINE: &str = "#define HAVE_LIBLZO2 1";

/// `snappy` with the guard macro patch applied.
pub struct Snappy {
    descriptor: DependencyDescriptor,
}

impl Snappy {
    /// Creates the definition.
    ///
    /// # Errors
    ///
    /// Fails only if the descriptor is malformed.
    pub fn new() -> Result<Self> {
        let descriptor =
            DependencyDescriptor::builder("snappy", "1.1.3", BuildGroup::PotentiallyInstrumented)
                .download_url("https://github.com/google/snappy/archive/{0}.tar.gz")
                .copy_sources()
                .patches(["snappy-define-guard-macro.patch"])
                .post_patch(["autoreconf", "-fvi"])
                .build()?;
        Ok(Self { descriptor })
    }

    fn disable_lzo2(session: &BuildSession<'_>) -> Result<()> {
        info!("{} Removing HAVE_LIBLZO2 from config.h", session.log_prefix());
        let mut removed = false;
        session.edit_file("config.h", |text| {
            let (kept, found) = without_define(&text, LZO2_DEFINE);
            removed = found;
            kept
        })?;
        if !removed {
            warn!(
                "{} Did not find HAVE_LIBLZO2 in config.h",
                session.log_prefix()
            );
        }
        Ok(())
    }
}

/// Drops every line equal to `define` after trimming; reports whether one
/// was found.
pub(crate) fn without_define(text: &str, define: &str) -> (String, bool) {
    let mut found = false;
    let mut kept = String::with_capacity(text.len());
    for line in text.lines() {
        if line.trim() == define {
            found = true;
            continue;
        }
        kept.push_str(line);
        kept.push('\n');
    }
    (kept, found)
}

impl Dependency for Snappy {
    fn descriptor(&self) -> &DependencyDescriptor {
        &self.descriptor
    }

    fn should_build(&self, context: &BuildContext<'_>) -> bool {
        !is_installed(context, "lib/libsnappy.a")
    }

    fn build(&self, session: &mut BuildSession<'_>) -> Result<()> {
        let options = ConfigureOptions::new().with_pic();
        session.configure(&options)?;
        Self::disable_lzo2(session)?;
        session.make_and_install(&options)?;

        let build_dir = session.build_dir();
        session.copy_matching(&build_dir, "snappy*.h", &build_dir.join("include"))?;
        session.copy_matching(&build_dir.join(".libs"), "*", &build_dir.join("lib"))?;
        Ok(())
    }
}
