//! Immutable records describing one third-party package.
//!
//! A [`DependencyDescriptor`] carries everything the external download and
//! patch collaborators need (URL, archive name, patches) together with the
//! build group the scheduler uses. Descriptors are assembled once through
//! [`DescriptorBuilder`], which validates the archive type up front, and are
//! read-only afterwards.

use crate::build_type::BuildGroup;
use crate::error::{BuilderError, Result};

/// Archive extensions recognised at the end of a download URL.
///
/// Multi-part extensions are listed whole so that `foo.tar.gz` is never
/// split into `foo.tar` and `.gz`.
pub const ARCHIVE_TYPES: [&str; 5] = [".tar.bz2", ".tar.gz", ".tar.xz", ".tgz", ".zip"];

/// Extension assumed for sources placed in the download directory by hand.
const DEFAULT_ARCHIVE_TYPE: &str = ".tar.gz";

/// Builds `<stem>-<version><ext>` for a download URL.
///
/// Returns `None` when the URL ends with none of [`ARCHIVE_TYPES`].
///
/// # Examples
///
/// ```
/// use thirdparty_builder::descriptor::make_archive_name;
///
/// assert_eq!(
///     make_archive_name("bison", "3.4.1", Some("https://ftp.gnu.org/gnu/bison/bison-3.4.1.tar.gz")),
///     Some("bison-3.4.1.tar.gz".to_owned())
/// );
/// assert_eq!(make_archive_name("local", "1.0", None), Some("local-1.0.tar.gz".to_owned()));
/// assert_eq!(make_archive_name("x", "1", Some("https://example.com/x.rar")), None);
/// ```
#[must_use]
pub fn make_archive_name(stem: &str, version: &str, download_url: Option<&str>) -> Option<String> {
    let ext = match download_url {
        None => DEFAULT_ARCHIVE_TYPE,
        Some(url) => ARCHIVE_TYPES.into_iter().find(|ext| url.ends_with(ext))?,
    };
    Some(format!("{stem}-{version}{ext}"))
}

/// Splits an archive file name into its stem and extension.
///
/// Known archive extensions are kept whole; any other name falls back to
/// splitting at the last dot.
///
/// # Examples
///
/// ```
/// use thirdparty_builder::descriptor::split_archive_file_name;
///
/// assert_eq!(split_archive_file_name("foo.tar.gz"), ("foo", ".tar.gz"));
/// assert_eq!(split_archive_file_name("my.archive.zip"), ("my.archive", ".zip"));
/// assert_eq!(split_archive_file_name("somefile"), ("somefile", ""));
/// assert_eq!(split_archive_file_name("notes.txt"), ("notes", ".txt"));
/// ```
#[must_use]
pub fn split_archive_file_name(name: &str) -> (&str, &str) {
    for ext in ARCHIVE_TYPES {
        if let Some(stem) = name.strip_suffix(ext) {
            return (stem, ext);
        }
    }
    match name.rfind('.') {
        Some(idx) if name.chars().take(idx).any(|c| c != '.') => name.split_at(idx),
        _ => (name, ""),
    }
}

/// Replaces `{0}` with the version and `{1}` with its underscored form.
fn resolve_url_template(template: &str, version: &str) -> String {
    template
        .replace("{0}", version)
        .replace("{1}", &underscored_version(version))
}

/// Returns the version with dots replaced by underscores, e.g. `1_2_3`.
#[must_use]
pub fn underscored_version(version: &str) -> String {
    version.replace('.', "_")
}

/// An auxiliary archive fetched alongside a dependency's main source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtraDownload {
    /// Name of the auxiliary package.
    pub name: String,
    /// Its version.
    pub version: String,
    /// Resolved download URL.
    pub url: String,
    /// Destination sub-directory inside the dependency's source tree.
    pub dir_name: String,
    /// Archive file name in the download directory.
    pub archive_name: String,
    /// Command run in the destination after extraction, if any.
    pub post_exec: Vec<String>,
}

impl ExtraDownload {
    /// Describes an extra download, resolving the URL pattern.
    ///
    /// # Errors
    ///
    /// Returns [`BuilderError::UnsupportedArchive`] when the URL has no
    /// recognised archive extension.
    pub fn new(name: &str, version: &str, url_pattern: &str, dir_name: &str) -> Result<Self> {
        let url = resolve_url_template(url_pattern, version);
        let archive_name = make_archive_name(name, version, Some(&url)).ok_or_else(|| {
            BuilderError::UnsupportedArchive {
                dependency: name.to_owned(),
                url: url.clone(),
            }
        })?;
        Ok(Self {
            name: name.to_owned(),
            version: version.to_owned(),
            url,
            dir_name: dir_name.to_owned(),
            archive_name,
            post_exec: Vec::new(),
        })
    }

    /// Sets the command run after extraction.
    #[must_use]
    pub fn with_post_exec<I, S>(mut self, argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.post_exec = argv.into_iter().map(Into::into).collect();
        self
    }
}

/// Identity, download and build metadata of one dependency.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DependencyDescriptor {
    name: String,
    version: String,
    build_group: BuildGroup,
    download_url: Option<String>,
    archive_name: String,
    extra_downloads: Vec<ExtraDownload>,
    patches: Vec<String>,
    patch_strip: Option<u32>,
    post_patch: Vec<String>,
    copy_sources: bool,
}

impl DependencyDescriptor {
    /// Starts describing a dependency.
    ///
    /// # Examples
    ///
    /// ```
    /// use thirdparty_builder::build_type::BuildGroup;
    /// use thirdparty_builder::descriptor::DependencyDescriptor;
    ///
    /// let snappy = DependencyDescriptor::builder("snappy", "1.1.3", BuildGroup::PotentiallyInstrumented)
    ///     .download_url("https://github.com/google/snappy/archive/{0}.tar.gz")
    ///     .copy_sources()
    ///     .build()?;
    ///
    /// assert_eq!(snappy.dir_name(), "snappy-1.1.3");
    /// assert_eq!(snappy.archive_name(), "snappy-1.1.3.tar.gz");
    /// # Ok::<(), thirdparty_builder::error::BuilderError>(())
    /// ```
    #[must_use]
    pub fn builder(name: &str, version: &str, build_group: BuildGroup) -> DescriptorBuilder {
        DescriptorBuilder {
            name: name.to_owned(),
            version: version.to_owned(),
            build_group,
            url_template: None,
            archive_name_prefix: None,
            extra_downloads: Vec::new(),
            patches: Vec::new(),
            patch_strip: None,
            post_patch: Vec::new(),
            copy_sources: false,
        }
    }

    /// Package name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Package version.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Build group, fixed at creation.
    #[must_use]
    pub fn build_group(&self) -> BuildGroup {
        self.build_group
    }

    /// `name-version`, used for source and build directories.
    #[must_use]
    pub fn dir_name(&self) -> String {
        format!("{}-{}", self.name, self.version)
    }

    /// Resolved download URL, absent for hand-fetched sources.
    #[must_use]
    pub fn download_url(&self) -> Option<&str> {
        self.download_url.as_deref()
    }

    /// Archive file name in the download directory.
    #[must_use]
    pub fn archive_name(&self) -> &str {
        &self.archive_name
    }

    /// Auxiliary archives, in download order.
    #[must_use]
    pub fn extra_downloads(&self) -> &[ExtraDownload] {
        &self.extra_downloads
    }

    /// Patch file names, in application order.
    #[must_use]
    pub fn patches(&self) -> &[String] {
        &self.patches
    }

    /// Strip depth passed to `patch -p`, when set.
    #[must_use]
    pub fn patch_strip(&self) -> Option<u32> {
        self.patch_strip
    }

    /// Command run in the source tree after patching.
    #[must_use]
    pub fn post_patch(&self) -> &[String] {
        &self.post_patch
    }

    /// Whether sources are copied into each build directory.
    #[must_use]
    pub fn copy_sources(&self) -> bool {
        self.copy_sources
    }
}

/// Collects optional descriptor fields before validation.
#[derive(Clone, Debug)]
#[must_use]
pub struct DescriptorBuilder {
    name: String,
    version: String,
    build_group: BuildGroup,
    url_template: Option<String>,
    archive_name_prefix: Option<String>,
    extra_downloads: Vec<ExtraDownload>,
    patches: Vec<String>,
    patch_strip: Option<u32>,
    post_patch: Vec<String>,
    copy_sources: bool,
}

impl DescriptorBuilder {
    /// Sets the download URL template (`{0}` version, `{1}` underscored).
    pub fn download_url(mut self, template: &str) -> Self {
        self.url_template = Some(template.to_owned());
        self
    }

    /// Overrides the archive name stem, which defaults to the name.
    pub fn archive_name_prefix(mut self, prefix: &str) -> Self {
        self.archive_name_prefix = Some(prefix.to_owned());
        self
    }

    /// Appends an auxiliary archive.
    pub fn extra_download(mut self, download: ExtraDownload) -> Self {
        self.extra_downloads.push(download);
        self
    }

    /// Sets the patch file names.
    pub fn patches<I, S>(mut self, patches: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.patches = patches.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the strip depth applied to every patch.
    pub fn patch_strip(mut self, strip: u32) -> Self {
        self.patch_strip = Some(strip);
        self
    }

    /// Sets the command run after patching.
    pub fn post_patch<I, S>(mut self, argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.post_patch = argv.into_iter().map(Into::into).collect();
        self
    }

    /// Copies sources into each build directory instead of building
    /// out-of-tree.
    pub fn copy_sources(mut self) -> Self {
        self.copy_sources = true;
        self
    }

    /// Validates and freezes the descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`BuilderError::UnsupportedArchive`] when the resolved URL
    /// has no recognised archive extension.
    pub fn build(self) -> Result<DependencyDescriptor> {
        let download_url = self
            .url_template
            .as_deref()
            .map(|template| resolve_url_template(template, &self.version));
        let stem = self.archive_name_prefix.as_deref().unwrap_or(&self.name);
        let archive_name = make_archive_name(stem, &self.version, download_url.as_deref())
            .ok_or_else(|| BuilderError::UnsupportedArchive {
                dependency: self.name.clone(),
                url: download_url.clone().unwrap_or_default(),
            })?;

        Ok(DependencyDescriptor {
            name: self.name,
            version: self.version,
            build_group: self.build_group,
            download_url,
            archive_name,
            extra_downloads: self.extra_downloads,
            patches: self.patches,
            patch_strip: self.patch_strip,
            post_patch: self.post_patch,
            copy_sources: self.copy_sources,
        })
    }
}
