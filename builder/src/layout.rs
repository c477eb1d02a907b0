//! Directory layout of the third-party tree.
//!
//! ```text
//! <thirdparty>/
//!   download/<archive>
//!   src/<name-version>/
//!   build/<build type>/<name-version>/
//!   installed/<build type>/{bin,sbin,lib,libcxx,include}
//! ```

use crate::build_type::BuildType;
use crate::descriptor::DependencyDescriptor;
use crate::error::Result;
use camino::{Utf8Path, Utf8PathBuf};
use log::info;

/// Paths of the third-party tree rooted at one directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileSystemLayout {
    thirdparty_dir: Utf8PathBuf,
    build_dir: Utf8PathBuf,
    src_dir: Utf8PathBuf,
    download_dir: Utf8PathBuf,
    installed_dir: Utf8PathBuf,
}

impl FileSystemLayout {
    /// Creates the layout for `thirdparty_dir`; nothing is created on disk.
    #[must_use]
    pub fn new(thirdparty_dir: impl Into<Utf8PathBuf>) -> Self {
        let thirdparty_dir = thirdparty_dir.into();
        Self {
            build_dir: thirdparty_dir.join("build"),
            src_dir: thirdparty_dir.join("src"),
            download_dir: thirdparty_dir.join("download"),
            installed_dir: thirdparty_dir.join("installed"),
            thirdparty_dir,
        }
    }

    /// Root of the third-party tree.
    #[must_use]
    pub fn thirdparty_dir(&self) -> &Utf8Path {
        &self.thirdparty_dir
    }

    /// Directory holding one sub-directory per build type.
    #[must_use]
    pub fn installed_dir(&self) -> &Utf8Path {
        &self.installed_dir
    }

    /// Directory holding downloaded archives.
    #[must_use]
    pub fn download_dir(&self) -> &Utf8Path {
        &self.download_dir
    }

    /// Install prefix of one build type.
    #[must_use]
    pub fn installed_prefix(&self, build_type: BuildType) -> Utf8PathBuf {
        self.installed_dir.join(build_type.dir_name())
    }

    /// Location of a dependency's downloaded archive.
    #[must_use]
    pub fn archive_path(&self, dep: &DependencyDescriptor) -> Utf8PathBuf {
        self.download_dir.join(dep.archive_name())
    }

    /// Location of a dependency's extracted (and patched) sources.
    #[must_use]
    pub fn source_path(&self, dep: &DependencyDescriptor) -> Utf8PathBuf {
        self.src_dir.join(dep.dir_name())
    }

    /// Build directory of a dependency for one build type.
    #[must_use]
    pub fn build_dir(&self, dep: &DependencyDescriptor, build_type: BuildType) -> Utf8PathBuf {
        self.build_dir
            .join(build_type.dir_name())
            .join(dep.dir_name())
    }

    /// Creates the top-level directories and the `common` prefix.
    ///
    /// # Errors
    ///
    /// Returns an I/O error when a directory cannot be created.
    pub fn create_dirs(&self) -> Result<()> {
        for dir in [
            &self.build_dir,
            &self.src_dir,
            &self.download_dir,
            &self.installed_dir,
        ] {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::create_dir_all(self.installed_prefix(BuildType::Common))?;
        Ok(())
    }

    /// Removes build directories and sources of the given dependencies, and
    /// their archives when `clean_downloads` is set.
    ///
    /// Returns the paths that were removed.
    ///
    /// # Errors
    ///
    /// Returns an I/O error when an existing path cannot be removed.
    pub fn clean(
        &self,
        deps: &[&DependencyDescriptor],
        clean_downloads: bool,
    ) -> Result<Vec<Utf8PathBuf>> {
        let mut removed = Vec::new();
        for dep in deps {
            for build_type in BuildType::ALL {
                let description = format!("{build_type} build directory");
                remove_path(dep, &description, &self.build_dir(dep, build_type), &mut removed)?;
            }
            remove_path(dep, "source directory", &self.source_path(dep), &mut removed)?;
            if clean_downloads {
                remove_path(dep, "downloaded archive", &self.archive_path(dep), &mut removed)?;
            }
        }
        Ok(removed)
    }
}

fn remove_path(
    dep: &DependencyDescriptor,
    description: &str,
    path: &Utf8Path,
    removed: &mut Vec<Utf8PathBuf>,
) -> Result<()> {
    let name = dep.name();
    if !path.exists() {
        info!("Could not find {description} for dependency {name} at {path}, nothing to remove");
        return Ok(());
    }
    info!("Removing {description} for dependency {name} at {path}");
    if path.is_dir() {
        std::fs::remove_dir_all(path)?;
    } else {
        std::fs::remove_file(path)?;
    }
    removed.push(path.to_owned());
    Ok(())
}
