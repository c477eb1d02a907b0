//! Per-OS inspection tool adapter.
//!
//! The linkage checker speaks to `ldd` on Linux and `otool` on macOS. The
//! differences between them (tool name, output grammar, lines that are
//! always acceptable, the marker for "nothing to inspect") are captured here
//! so the verifier itself stays OS-agnostic. The platform is chosen once via
//! [`Platform::detect`].

use crate::error::{CheckError, Result};
use camino::Utf8Path;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

/// Libraries that may be resolved from the system library directories.
pub const ALLOWED_SYSTEM_LIBRARIES: &[&str] = &[
    "libc",
    "libdl",
    "libm",
    "libpthread",
    "libresolv",
    "librt",
    "libutil",
    "libgcc_s",
    "ld-linux",
];

/// `ldd -u` output lines that do not name an unused library.
pub const SKIPPED_LDD_OUTPUT_PREFIXES: &[&str] = &["Unused ", "ldd: warning: ", "not a dynamic"];

/// Environment passed to `ldd` so its messages are stable.
pub const LDD_ENV: (&str, &str) = ("LC_ALL", "en_US.UTF-8");

static SYSTEM_LIBRARY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^.* => /lib(?:64|/(?:x86_64|aarch64)-linux-gnu)/([^ /]+) .*$")
        .unwrap_or_else(|err| unreachable!("static system library regex is valid: {err}"))
});

/// Operating systems with an inspection tool adapter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Platform {
    /// Linux, inspected with `ldd`.
    Linux,
    /// macOS, inspected with `otool`.
    MacOs,
}

impl Platform {
    /// Detects the platform the checker is running on.
    ///
    /// # Errors
    ///
    /// Returns [`CheckError::UnsupportedPlatform`] on any other OS.
    pub fn detect() -> Result<Self> {
        Self::from_os_name(std::env::consts::OS)
    }

    /// Maps a `std::env::consts::OS` value to a platform.
    ///
    /// # Errors
    ///
    /// Returns [`CheckError::UnsupportedPlatform`] for unknown names.
    ///
    /// # Examples
    ///
    /// ```
    /// use thirdparty_linkcheck::Platform;
    ///
    /// assert_eq!(Platform::from_os_name("macos")?, Platform::MacOs);
    /// assert!(Platform::from_os_name("windows").is_err());
    /// # Ok::<(), thirdparty_linkcheck::CheckError>(())
    /// ```
    pub fn from_os_name(os: &str) -> Result<Self> {
        match os {
            "linux" => Ok(Self::Linux),
            "macos" => Ok(Self::MacOs),
            other => Err(CheckError::UnsupportedPlatform {
                os: other.to_owned(),
            }),
        }
    }

    /// Human-readable inspection tool, as reported in failures.
    #[must_use]
    pub const fn tool(self) -> &'static str {
        match self {
            Self::Linux => "ldd",
            Self::MacOs => "otool -L",
        }
    }

    /// Output substring meaning the file has no dynamic dependencies at all.
    #[must_use]
    pub const fn not_an_object_marker(self) -> &'static str {
        match self {
            Self::Linux => "not a dynamic executable",
            Self::MacOs => "is not an object file",
        }
    }

    /// Patterns that are always allowed on this platform.
    ///
    /// `thirdparty_dir` is the root of the third-party tree; libraries
    /// resolved from anywhere inside it are acceptable.
    #[must_use]
    pub fn builtin_patterns(self, thirdparty_dir: &Utf8Path) -> Vec<String> {
        let escaped = regex::escape(thirdparty_dir.as_str());
        match self {
            Self::Linux => vec![
                r"^\tlinux-vdso".to_owned(),
                r"^\t/lib64/".to_owned(),
                r"^\t/lib/ld-linux-.*".to_owned(),
                r"^\tstatically linked".to_owned(),
                r"^\tnot a dynamic executable".to_owned(),
                "ldd: warning: you do not have execution permission".to_owned(),
                "^.* => /lib64/".to_owned(),
                "^.* => /lib/".to_owned(),
                "^.* => /usr/lib/x86_64-linux-gnu/".to_owned(),
                format!("^.* => {escaped}"),
            ],
            Self::MacOs => vec![
                r"^\t/System/Library/".to_owned(),
                "^Archive ".to_owned(),
                "^/".to_owned(),
                r"^\t@rpath".to_owned(),
                r"^\t@loader_path".to_owned(),
                format!(r"^\t{escaped}"),
                r"^\t/usr/lib/".to_owned(),
            ],
        }
    }

    /// Pattern allowing shared libraries resolved from `dir`.
    ///
    /// # Examples
    ///
    /// ```
    /// use camino::Utf8Path;
    /// use thirdparty_linkcheck::Platform;
    ///
    /// let pattern = Platform::Linux.shared_lib_dir_pattern(Utf8Path::new("/opt/llvm/lib"));
    /// assert_eq!(pattern, ".* => /opt/llvm/lib/");
    /// ```
    #[must_use]
    pub fn shared_lib_dir_pattern(self, dir: &Utf8Path) -> String {
        let escaped = regex::escape(dir.as_str());
        match self {
            Self::Linux => format!(".* => {escaped}/"),
            Self::MacOs => format!(r"^\t{escaped}/"),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Linux => "linux",
            Self::MacOs => "macos",
        })
    }
}

/// Extracts the system library name from a trimmed `ldd` line resolving into
/// `/lib64/`, `/lib/x86_64-linux-gnu/` or `/lib/aarch64-linux-gnu/`.
///
/// # Examples
///
/// ```
/// use thirdparty_linkcheck::platform::system_library_name;
///
/// let line = "libm.so.6 => /lib64/libm.so.6 (0x00007f)";
/// assert_eq!(system_library_name(line), Some("libm.so.6"));
/// assert_eq!(system_library_name("libz.so.1 => /tp/lib/libz.so.1 (0x1)"), None);
/// ```
#[must_use]
pub fn system_library_name(trimmed_line: &str) -> Option<&str> {
    SYSTEM_LIBRARY_RE
        .captures(trimmed_line)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Returns whether a system library file name is on the allowed list.
///
/// A name matches an allowed base name when it continues with `.` or `-`,
/// so `libm.so.6` matches `libm` but `libmagic.so.1` does not.
#[must_use]
pub fn is_allowed_system_lib<S: AsRef<str>>(lib_name: &str, allowed: &[S]) -> bool {
    allowed.iter().any(|base| {
        lib_name
            .strip_prefix(base.as_ref())
            .is_some_and(|rest| rest.starts_with('.') || rest.starts_with('-'))
    })
}
