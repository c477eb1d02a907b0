//! Environment variables shared by the builder and the compiler wrapper.
//!
//! Build systems only pass their environment through to the compiler, so the
//! wrapper settings cross that boundary as variables. Lists use `:` for
//! directories and spaces for flags.

/// Real C compiler invoked by the wrapper.
pub const REAL_C_COMPILER: &str = "THIRDPARTY_REAL_C_COMPILER";

/// Real C++ compiler invoked by the wrapper.
pub const REAL_CXX_COMPILER: &str = "THIRDPARTY_REAL_CXX_COMPILER";

/// Colon-separated include directories the wrapper rejects.
pub const DISALLOWED_INCLUDE_DIRS: &str = "THIRDPARTY_DISALLOWED_INCLUDE_DIRS";

/// `1` routes compilations through `ccache`.
pub const USE_CCACHE: &str = "THIRDPARTY_USE_CCACHE";

/// `1` makes the wrapper echo every command it runs.
pub const VERBOSE: &str = "THIRDPARTY_VERBOSE";

/// Space-separated flags appended when linking a shared library.
pub const LD_FLAGS_TO_APPEND: &str = "THIRDPARTY_LD_FLAGS_TO_APPEND";

/// Space-separated flags removed when linking a shared library.
pub const LD_FLAGS_TO_REMOVE: &str = "THIRDPARTY_LD_FLAGS_TO_REMOVE";

/// Overrides the `make -j` parallelism.
pub const MAKE_PARALLELISM: &str = "THIRDPARTY_MAKE_PARALLELISM";

/// Parses a boolean flag variable: `1`, `true` and `yes` are set.
#[must_use]
pub fn is_truthy(value: Option<&str>) -> bool {
    matches!(
        value.map(str::trim).map(str::to_ascii_lowercase).as_deref(),
        Some("1" | "true" | "yes")
    )
}
