//! COLLECT phase: find the installed files worth inspecting.
//!
//! Only the `bin`, `sbin`, `lib` and `libcxx` directories of each build type
//! are walked. Symlinks, excluded names and anything that is not an ELF or
//! Mach-O object are dropped before any tool runs.

use crate::artifact::{ArtifactKind, InstalledArtifact};
use crate::error::{CheckError, Result};
use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, info, trace};
use std::fs::File;
use std::io::Read;
use walkdir::WalkDir;

/// Sub-directories of `<installed>/<build type>` that hold binaries.
pub const SCANNED_DIRS: &[&str] = &["bin", "lib", "libcxx", "sbin"];

/// File extensions that never need inspection.
pub const IGNORED_EXTENSIONS: &[&str] = &[".a", ".la", ".pc", ".inc", ".h", ".hpp", ".cmake"];

/// File names that never need inspection.
pub const IGNORED_FILE_NAMES: &[&str] = &["LICENSE", "krb5-send-pr"];

/// Directories whose files never need inspection.
pub const IGNORED_DIR_SUFFIXES: &[&str] = &[
    "/include/c++/v1",
    "/include/c++/v1/experimental",
    "/include/c++/v1/ext",
];

const MAGIC_LEN: u64 = 64;

/// Why a regular file was left out of inspection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// Symbolic links are inspected through their targets.
    Symlink,
    /// Extension listed in [`IGNORED_EXTENSIONS`].
    IgnoredExtension,
    /// Name listed in [`IGNORED_FILE_NAMES`].
    IgnoredFileName,
    /// Parent directory ends with one of [`IGNORED_DIR_SUFFIXES`].
    IgnoredDirectory,
    /// Text linker script (`INPUT(...)`).
    LinkerScript,
    /// `ar` archive without a `.a` extension.
    Archive,
    /// Neither ELF nor Mach-O, e.g. a shell script such as `krb5-config`.
    NotAnObject,
}

impl SkipReason {
    /// The reason a file of `kind` is not inspected, if it is not.
    #[must_use]
    pub fn for_kind(kind: ArtifactKind) -> Option<Self> {
        if kind.is_inspectable() {
            return None;
        }
        Some(match kind {
            ArtifactKind::StaticLibrary => Self::Archive,
            ArtifactKind::LinkerScript => Self::LinkerScript,
            _ => Self::NotAnObject,
        })
    }
}

/// Decides whether a file is excluded by name or location alone.
///
/// Returns `None` when the file still needs its contents checked.
#[must_use]
pub fn skip_by_name(path: &Utf8Path) -> Option<SkipReason> {
    let name = path.file_name().unwrap_or_default();
    if IGNORED_EXTENSIONS.iter().any(|ext| name.ends_with(ext)) {
        return Some(SkipReason::IgnoredExtension);
    }
    if IGNORED_FILE_NAMES.contains(&name) {
        return Some(SkipReason::IgnoredFileName);
    }
    let parent = path.parent().map_or("", Utf8Path::as_str);
    if IGNORED_DIR_SUFFIXES
        .iter()
        .any(|suffix| parent.ends_with(suffix))
    {
        return Some(SkipReason::IgnoredDirectory);
    }
    None
}

/// Reads up to the first 64 bytes of a file.
///
/// # Errors
///
/// Returns [`CheckError::Scan`] when the file cannot be read.
pub fn read_magic(path: &Utf8Path) -> Result<Vec<u8>> {
    let scan_err = |source| CheckError::Scan {
        path: path.to_owned(),
        source,
    };
    let file = File::open(path).map_err(scan_err)?;
    let mut bytes = Vec::with_capacity(64);
    file.take(MAGIC_LEN)
        .read_to_end(&mut bytes)
        .map_err(scan_err)?;
    Ok(bytes)
}

/// Walks `<installed_dir>/<build type>/{bin,lib,libcxx,sbin}` for every
/// build type directory name, in order.
///
/// Files within each scanned directory are visited sorted by file name so
/// that reports are stable between runs. Missing build type directories are
/// skipped.
///
/// # Errors
///
/// Returns [`CheckError::Scan`] when a directory cannot be walked or a file
/// cannot be read, and [`CheckError::NonUtf8Path`] for non UTF-8 names.
pub fn collect_artifacts<S: AsRef<str>>(
    installed_dir: &Utf8Path,
    build_types: &[S],
) -> Result<Vec<InstalledArtifact>> {
    let mut artifacts = Vec::new();

    for build_type in build_types {
        let build_type = build_type.as_ref();
        let type_dir = installed_dir.join(build_type);
        if !type_dir.is_dir() {
            info!("Directory {type_dir} does not exist, skipping");
            continue;
        }

        for sub_dir in SCANNED_DIRS {
            let examine = type_dir.join(sub_dir);
            if examine.is_dir() && !examine.is_symlink() {
                collect_under(&examine, build_type, &mut artifacts)?;
            }
        }
    }

    Ok(artifacts)
}

fn collect_under(
    root: &Utf8Path,
    build_type: &str,
    artifacts: &mut Vec<InstalledArtifact>,
) -> Result<()> {
    for entry in WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|err| CheckError::Scan {
            path: root.to_owned(),
            source: err.into(),
        })?;
        if entry.file_type().is_dir() {
            continue;
        }

        let path = Utf8PathBuf::from_path_buf(entry.path().to_path_buf()).map_err(|p| {
            CheckError::NonUtf8Path {
                path: p.display().to_string(),
            }
        })?;

        if entry.file_type().is_symlink() {
            trace!("Skipping {path}: {:?}", SkipReason::Symlink);
            continue;
        }
        if let Some(reason) = skip_by_name(&path) {
            trace!("Skipping {path}: {reason:?}");
            continue;
        }

        let kind = ArtifactKind::classify(&path, &read_magic(&path)?);
        if let Some(reason) = SkipReason::for_kind(kind) {
            debug!("Skipping {path}: {reason:?}");
            continue;
        }
        artifacts.push(InstalledArtifact {
            path,
            kind,
            build_type: build_type.to_owned(),
        });
    }
    Ok(())
}
