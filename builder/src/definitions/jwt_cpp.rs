use super::is_installed;
use crate::build_type::BuildGroup;
use crate::context::BuildContext;
use crate::dependency::Dependency;
use crate::descriptor::DependencyDescriptor;
use crate::error::Result;
use crate::session::BuildSession;

/// `jwt-cpp` and the bundled `picojson` headers.
pub struct JwtCpp {
    descriptor: DependencyDescriptor,
}

impl JwtCpp {
    /// Creates the definition.
    ///
    /// # Errors
    ///
    /// Fails only if the descriptor is malformed.
    pub fn new() -> Result<Self> {
        let descriptor = DependencyDescriptor::builder("jwt_cpp", "0.6.0", BuildGroup::Common)
            .download_url("https://github.com/Thalhammer/jwt-cpp/archive/refs/tags/v{0}.tar.gz")
            .build()?;
        Ok(Self { descriptor })
    }
}

impl Dependency for JwtCpp {
    fn descriptor(&self) -> &DependencyDescriptor {
        &self.descriptor
    }

    fn should_build(&self, context: &BuildContext<'_>) -> bool {
        !is_installed(context, "include/jwt-cpp/jwt.h")
    }

    fn build(&self, session: &mut BuildSession<'_>) -> Result<()> {
        session.copy_include_files("include/picojson", "picojson")?;
        session.copy_include_files("include/jwt-cpp", "jwt-cpp")
    }
}
