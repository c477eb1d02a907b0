//! Parsing of `otool -l` load command listings.

/// A `minos` entry found in a load command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MinOsEntry {
    /// Most recent section header (a line ending with `:`), if any.
    pub section: String,
    /// Declared minimum OS version.
    pub version: String,
    /// The full trimmed line.
    pub line: String,
}

/// Extracts every `minos <version>` entry from `otool -l` output.
///
/// # Examples
///
/// ```
/// use thirdparty_linkcheck::load_commands::min_os_entries;
///
/// let output = [
///     "/tp/installed/common/lib/libz.dylib:",
///     "Load command 9",
///     "      cmd LC_BUILD_VERSION",
///     "    minos 11.0",
/// ];
/// let entries = min_os_entries(output);
/// assert_eq!(entries.len(), 1);
/// assert_eq!(entries[0].version, "11.0");
/// assert_eq!(entries[0].section, "/tp/installed/common/lib/libz.dylib:");
/// ```
pub fn min_os_entries<I, S>(lines: I) -> Vec<MinOsEntry>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut section = String::new();
    let mut entries = Vec::new();
    for raw in lines {
        let line = raw.as_ref().trim();
        if line.ends_with(':') {
            line.clone_into(&mut section);
        }
        if line.starts_with("minos ") {
            if let Some(version) = line.split_whitespace().nth(1) {
                entries.push(MinOsEntry {
                    section: section.clone(),
                    version: version.to_owned(),
                    line: line.to_owned(),
                });
            }
        }
    }
    entries
}
