//! Installed files considered for inspection.

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use std::fmt;

/// Prefix identifying a GNU ld linker script such as `libc++.so`.
const LINKER_SCRIPT_MAGIC: &[u8] = b"INPUT";

/// Prefix of a `.a` archive.
const ARCHIVE_MAGIC: &[u8] = b"!<arch>";

const ELF_MAGIC: &[u8] = b"\x7fELF";

/// Thin Mach-O headers in both byte orders, then universal (fat) headers.
const MACH_O_MAGICS: &[[u8; 4]] = &[
    [0xfe, 0xed, 0xfa, 0xce],
    [0xce, 0xfa, 0xed, 0xfe],
    [0xfe, 0xed, 0xfa, 0xcf],
    [0xcf, 0xfa, 0xed, 0xfe],
    [0xca, 0xfe, 0xba, 0xbe],
    [0xbe, 0xba, 0xfe, 0xca],
    [0xca, 0xfe, 0xba, 0xbf],
    [0xbf, 0xba, 0xfe, 0xca],
];

/// Broad category of an installed file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// An ELF or Mach-O object outside the library naming scheme.
    Executable,
    /// A `.so`/`.dylib` shared library, possibly versioned.
    SharedLibrary,
    /// An `ar` archive.
    StaticLibrary,
    /// A text file with `INPUT(...)` standing in for a shared library.
    LinkerScript,
    /// Anything else, such as a shell script or a data file.
    NonObject,
}

impl ArtifactKind {
    /// Classifies a file from its first bytes, using the name only to tell
    /// shared libraries from executables.
    ///
    /// # Examples
    ///
    /// ```
    /// use camino::Utf8Path;
    /// use thirdparty_linkcheck::ArtifactKind;
    ///
    /// let kind = ArtifactKind::classify(Utf8Path::new("lib/libc++.so"), b"INPUT(libc++.so.1)");
    /// assert_eq!(kind, ArtifactKind::LinkerScript);
    /// let kind = ArtifactKind::classify(Utf8Path::new("lib/libz.so.1.2"), b"\x7fELF");
    /// assert_eq!(kind, ArtifactKind::SharedLibrary);
    /// let kind = ArtifactKind::classify(Utf8Path::new("bin/krb5-config"), b"#!/bin/sh");
    /// assert_eq!(kind, ArtifactKind::NonObject);
    /// ```
    #[must_use]
    pub fn classify(path: &Utf8Path, first_bytes: &[u8]) -> Self {
        if first_bytes.starts_with(LINKER_SCRIPT_MAGIC) {
            return Self::LinkerScript;
        }
        if first_bytes.starts_with(ARCHIVE_MAGIC) {
            return Self::StaticLibrary;
        }
        if !is_object_file(first_bytes) {
            return Self::NonObject;
        }
        if is_shared_library_name(path.file_name().unwrap_or_default()) {
            Self::SharedLibrary
        } else {
            Self::Executable
        }
    }

    /// Returns whether files of this kind are handed to the inspection tool.
    #[must_use]
    pub const fn is_inspectable(self) -> bool {
        matches!(self, Self::Executable | Self::SharedLibrary)
    }
}

fn is_object_file(first_bytes: &[u8]) -> bool {
    first_bytes.starts_with(ELF_MAGIC)
        || MACH_O_MAGICS
            .iter()
            .any(|magic| first_bytes.starts_with(magic))
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Executable => "executable",
            Self::SharedLibrary => "shared library",
            Self::StaticLibrary => "static library",
            Self::LinkerScript => "linker script",
            Self::NonObject => "non-object file",
        })
    }
}

/// Returns whether a file name looks like a shared library.
///
/// Matches plain (`libz.so`, `libz.dylib`) and versioned (`libz.so.1`,
/// `libz.1.dylib`) names.
#[must_use]
pub fn is_shared_library_name(name: &str) -> bool {
    name.ends_with(".so")
        || name.ends_with(".dylib")
        || name.contains(".so.")
        || name.contains(".dylib.")
}

/// A file under the installed tree that will be inspected.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct InstalledArtifact {
    /// Absolute path of the file.
    pub path: Utf8PathBuf,
    /// Category of the file.
    pub kind: ArtifactKind,
    /// Build type directory the file was found under, e.g. `asan`.
    pub build_type: String,
}

impl InstalledArtifact {
    /// Returns the file name of the artifact.
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.path.file_name().unwrap_or_default()
    }
}
