//! Build types and the build groups that select them.

use crate::error::BuilderError;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// One flavour of the installed tree, each under its own prefix.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildType {
    /// Dependencies that never need sanitizer instrumentation.
    Common,
    /// Regular optimised build of instrumentable dependencies.
    Uninstrumented,
    /// AddressSanitizer build.
    Asan,
    /// ThreadSanitizer build.
    Tsan,
}

impl BuildType {
    /// Every build type, in the order the installed tree is scanned.
    pub const ALL: [Self; 4] = [Self::Common, Self::Uninstrumented, Self::Asan, Self::Tsan];

    /// Build types the potentially instrumented group can be built for.
    pub const INSTRUMENTED: [Self; 3] = [Self::Uninstrumented, Self::Asan, Self::Tsan];

    /// Returns the lowercase directory name, e.g. `asan`.
    #[must_use]
    pub const fn dir_name(self) -> &'static str {
        match self {
            Self::Common => "common",
            Self::Uninstrumented => "uninstrumented",
            Self::Asan => "asan",
            Self::Tsan => "tsan",
        }
    }

    /// Returns `true` for sanitizer-instrumented build types.
    #[must_use]
    pub const fn is_sanitizer(self) -> bool {
        matches!(self, Self::Asan | Self::Tsan)
    }

    /// Returns the `-fsanitize=` flag for sanitizer build types.
    #[must_use]
    pub const fn sanitizer_flag(self) -> Option<&'static str> {
        match self {
            Self::Asan => Some("-fsanitize=address"),
            Self::Tsan => Some("-fsanitize=thread"),
            Self::Common | Self::Uninstrumented => None,
        }
    }
}

impl fmt::Display for BuildType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

impl FromStr for BuildType {
    type Err = BuilderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|build_type| build_type.dir_name() == s)
            .ok_or_else(|| BuilderError::InvalidBuildType { name: s.to_owned() })
    }
}

/// Group a dependency belongs to, fixed when it is defined.
///
/// Groups are built in declaration order: everything in
/// [`Common`](Self::Common) is installed before any instrumented build
/// starts, since instrumented dependencies link against common ones.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildGroup {
    /// Built once, for the `common` build type only.
    Common,
    /// Built once per requested instrumented build type.
    PotentiallyInstrumented,
}

impl BuildGroup {
    /// Groups in the order they are built.
    pub const ORDER: [Self; 2] = [Self::Common, Self::PotentiallyInstrumented];

    /// Returns the configuration name of the group.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Common => "common",
            Self::PotentiallyInstrumented => "potentially_instrumented",
        }
    }

    /// Returns the build type used when a caller does not choose one.
    #[must_use]
    pub const fn default_build_type(self) -> BuildType {
        match self {
            Self::Common => BuildType::Common,
            Self::PotentiallyInstrumented => BuildType::Uninstrumented,
        }
    }

    /// Returns the build types this group is built for, given the build
    /// types requested for the run.
    ///
    /// # Examples
    ///
    /// ```
    /// use thirdparty_builder::build_type::{BuildGroup, BuildType};
    ///
    /// let requested = [BuildType::Tsan, BuildType::Uninstrumented];
    /// assert_eq!(BuildGroup::Common.build_types(&requested), vec![BuildType::Common]);
    /// assert_eq!(
    ///     BuildGroup::PotentiallyInstrumented.build_types(&requested),
    ///     vec![BuildType::Uninstrumented, BuildType::Tsan]
    /// );
    /// ```
    #[must_use]
    pub fn build_types(self, requested: &[BuildType]) -> Vec<BuildType> {
        match self {
            Self::Common => vec![BuildType::Common],
            Self::PotentiallyInstrumented => BuildType::INSTRUMENTED
                .into_iter()
                .filter(|build_type| requested.contains(build_type))
                .collect(),
        }
    }
}

impl fmt::Display for BuildGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BuildGroup {
    type Err = BuilderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ORDER
            .into_iter()
            .find(|group| group.name() == s)
            .ok_or_else(|| BuilderError::InvalidBuildGroup { name: s.to_owned() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::common("common", BuildType::Common)]
    #[case::uninstrumented("uninstrumented", BuildType::Uninstrumented)]
    #[case::asan("asan", BuildType::Asan)]
    #[case::tsan("tsan", BuildType::Tsan)]
    fn build_types_round_trip_through_dir_names(#[case] name: &str, #[case] expected: BuildType) {
        let parsed: BuildType = name.parse().expect("known build type");
        assert_eq!(parsed, expected);
        assert_eq!(parsed.to_string(), name);
    }

    #[rstest]
    #[case::asan(BuildType::Asan, true)]
    #[case::tsan(BuildType::Tsan, true)]
    #[case::common(BuildType::Common, false)]
    #[case::uninstrumented(BuildType::Uninstrumented, false)]
    fn only_asan_and_tsan_are_sanitizers(#[case] build_type: BuildType, #[case] expected: bool) {
        assert_eq!(build_type.is_sanitizer(), expected);
        assert_eq!(build_type.sanitizer_flag().is_some(), expected);
    }

    #[rstest]
    #[case::instrumented("instrumented")]
    #[case::upper("COMMON")]
    #[case::empty("")]
    fn unknown_group_names_are_configuration_errors(#[case] name: &str) {
        let err = name.parse::<BuildGroup>().expect_err("group should be rejected");

        assert!(err.is_configuration_error());
        assert!(matches!(err, BuilderError::InvalidBuildGroup { name: n } if n == name));
    }

    #[test]
    fn default_build_types_follow_group() {
        assert_eq!(BuildGroup::Common.default_build_type(), BuildType::Common);
        assert_eq!(
            BuildGroup::PotentiallyInstrumented.default_build_type(),
            BuildType::Uninstrumented
        );
    }

    #[test]
    fn instrumented_group_never_builds_common() {
        let types = BuildGroup::PotentiallyInstrumented.build_types(&BuildType::ALL);

        assert_eq!(types, BuildType::INSTRUMENTED.to_vec());
    }

    #[test]
    fn unknown_build_type_is_rejected() {
        let err = "debug".parse::<BuildType>().expect_err("not a build type");
        assert!(err.to_string().contains("invalid build type: debug"));
    }
}
