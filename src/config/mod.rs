//! Configuration module
//!
//! Handles application settings: serial framing, link timing and the
//! liveness monitor.

mod settings;

pub use settings::{AppConfig, ConfigError};

use directories::ProjectDirs;
use std::path::PathBuf;

/// Get the application configuration directory
pub fn config_dir() -> Option<PathBuf> {
    ProjectDirs::from("com", "cellular", "cellular-cli")
        .map(|dirs| dirs.config_dir().to_path_buf())
}

/// Default location of `config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("config.toml"))
}
