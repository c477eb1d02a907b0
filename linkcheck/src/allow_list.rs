//! Allow-list of acceptable inspection output lines.
//!
//! Patterns are matched against the start of each line, so `^.* => /lib64/`
//! and `.* => /lib64/` behave the same. The list only ever grows; all
//! patterns are OR-ed together into one [`RegexSet`].

use crate::error::{CheckError, Result};
use regex::RegexSet;
use serde::Serialize;
use std::fmt;

/// Where an allow-list pattern came from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "dependency", rename_all = "snake_case")]
pub enum PatternOrigin {
    /// Shipped with the platform adapter.
    BuiltIn,
    /// Derived from a shared-library directory a dependency declared.
    Dependency(String),
    /// Supplied by the user through configuration.
    Configured,
}

impl fmt::Display for PatternOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BuiltIn => f.write_str("built-in"),
            Self::Dependency(name) => write!(f, "dependency {name}"),
            Self::Configured => f.write_str("configured"),
        }
    }
}

/// One allowed regular expression and its origin.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AllowListPattern {
    /// Regular expression source, matched at the start of a line.
    pub pattern: String,
    /// Where the pattern came from.
    pub origin: PatternOrigin,
}

impl AllowListPattern {
    /// Creates a pattern with the given origin.
    #[must_use]
    pub fn new(pattern: impl Into<String>, origin: PatternOrigin) -> Self {
        Self {
            pattern: pattern.into(),
            origin,
        }
    }
}

/// The compiled allow-list.
#[derive(Clone, Debug)]
pub struct AllowList {
    patterns: Vec<AllowListPattern>,
    set: RegexSet,
}

impl AllowList {
    /// Compiles every pattern into a single matcher.
    ///
    /// # Errors
    ///
    /// Returns [`CheckError::InvalidPattern`] naming the first pattern that
    /// fails to compile.
    ///
    /// # Examples
    ///
    /// ```
    /// use thirdparty_linkcheck::{AllowList, AllowListPattern, PatternOrigin};
    ///
    /// let list = AllowList::compile(vec![AllowListPattern::new(
    ///     "^.* => /lib64/",
    ///     PatternOrigin::BuiltIn,
    /// )])?;
    /// let accepted = list.first_match("\tlibc.so.6 => /lib64/libc.so.6 (0x00007f)");
    /// assert_eq!(accepted.map(|p| p.pattern.as_str()), Some("^.* => /lib64/"));
    /// assert!(list.first_match("\tlibfoo.so => /usr/local/lib/libfoo.so (0x1)").is_none());
    /// # Ok::<(), thirdparty_linkcheck::CheckError>(())
    /// ```
    pub fn compile(patterns: Vec<AllowListPattern>) -> Result<Self> {
        let anchored: Vec<String> = patterns.iter().map(|p| anchor(&p.pattern)).collect();
        let set = RegexSet::new(&anchored).map_err(|err| {
            let culprit = patterns
                .iter()
                .find(|p| regex::Regex::new(&anchor(&p.pattern)).is_err())
                .map_or_else(String::new, |p| p.pattern.clone());
            CheckError::InvalidPattern {
                pattern: culprit,
                reason: err.to_string(),
            }
        })?;
        Ok(Self { patterns, set })
    }

    /// Returns the first pattern, in insertion order, matching `line`.
    #[must_use]
    pub fn first_match(&self, line: &str) -> Option<&AllowListPattern> {
        self.set
            .matches(line)
            .iter()
            .next()
            .and_then(|index| self.patterns.get(index))
    }
}

/// Wraps a pattern so it only matches at the start of the input.
fn anchor(pattern: &str) -> String {
    format!("^(?:{pattern})")
}
