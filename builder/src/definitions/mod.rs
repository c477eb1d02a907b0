//! Build definitions of the bundled third-party packages.
//!
//! [`all_dependencies`] returns them in build order. Each definition
//! reports itself as already built when a file it installs is present in
//! the prefix, so re-running a finished build does nothing.

mod bison;
mod crypt_blowfish;
mod glog;
mod hdrhistogram;
mod jwt_cpp;
mod krb5;
mod libverto;
mod rapidjson;
mod snappy;
mod unistring;
mod xxhash;

pub use bison::Bison;
pub use crypt_blowfish::CryptBlowfish;
pub use glog::Glog;
pub use hdrhistogram::HdrHistogram;
pub use jwt_cpp::JwtCpp;
pub use krb5::Krb5;
pub use libverto::LibVerto;
pub use rapidjson::RapidJson;
pub use snappy::Snappy;
pub use unistring::Unistring;
pub use xxhash::XxHash;

use crate::context::BuildContext;
use crate::dependency::Dependency;
use crate::error::Result;
use log::debug;
use thirdparty_linkcheck::Platform;

/// Every definition for `platform`, in build order.
///
/// Kerberos and its event loop dependency are only built on Linux.
///
/// # Errors
///
/// Returns a configuration error if a definition's descriptor is invalid.
pub fn all_dependencies(platform: Platform) -> Result<Vec<Box<dyn Dependency>>> {
    let mut deps: Vec<Box<dyn Dependency>> = vec![
        Box::new(Bison::new()?),
        Box::new(RapidJson::new()?),
        Box::new(XxHash::new()?),
        Box::new(JwtCpp::new()?),
        Box::new(Snappy::new()?),
        Box::new(Glog::new()?),
        Box::new(CryptBlowfish::new()?),
        Box::new(Unistring::new()?),
        Box::new(HdrHistogram::new()?),
    ];
    if platform == Platform::Linux {
        deps.push(Box::new(LibVerto::new()?));
        deps.push(Box::new(Krb5::new()?));
    }
    Ok(deps)
}

/// Returns whether `rel` exists under the context's prefix.
fn is_installed(context: &BuildContext<'_>, rel: &str) -> bool {
    let path = context.prefix().join(rel);
    let present = path.exists();
    if present {
        debug!("Found {path}, treating the dependency as installed");
    }
    present
}

#[cfg(test)]
mod tests;
