//! Shared configuration for the third-party dependency builder and its
//! linkage checker.

pub mod config;

pub use config::{
    BuildSettingsConfig, CONFIG_FILE_NAME, CompilerConfig, ConfigError, LinkageConfig,
    ThirdpartyConfig, WrapperConfig,
};
