//! RapidJSON, a header-only JSON library.

use super::is_installed;
use crate::build_type::BuildGroup;
use crate::context::BuildContext;
use crate::dependency::Dependency;
use crate::descriptor::DependencyDescriptor;
use crate::error::Result;
use crate::session::BuildSession;

/// Installs the `rapidjson` headers; nothing is compiled.
pub struct RapidJson {
    descriptor: DependencyDescriptor,
}

impl RapidJson {
    /// Creates the definition.
    ///
    /// # Errors
    ///
    /// Fails only if the descriptor is malformed.
    pub fn new() -> Result<Self> {
        let descriptor = DependencyDescriptor::builder("rapidjson", "1.1.0-yb-2", BuildGroup::Common)
            .download_url("https://github.com/yugabyte/rapidjson/archive/v{0}.zip")
            .build()?;
        Ok(Self { descriptor })
    }
}

impl Dependency for RapidJson {
    fn descriptor(&self) -> &DependencyDescriptor {
        &self.descriptor
    }

    fn should_build(&self, context: &BuildContext<'_>) -> bool {
        !is_installed(context, "include/rapidjson/rapidjson.h")
    }

    fn build(&self, session: &mut BuildSession<'_>) -> Result<()> {
        session.copy_include_files("include/rapidjson", "rapidjson")
    }
}
