//! Application settings

use crate::core::liveness::LivenessConfig;
use crate::core::session::LinkConfig;
use crate::core::transport::SerialConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration loading errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// No platform config directory
    #[error("could not determine config directory")]
    NoConfigDir,

    /// Reading or writing the file failed
    #[error("{}: {source}", .path.display())]
    Io {
        /// File involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML for this schema
    #[error("{}: {source}", .path.display())]
    Parse {
        /// File involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: toml::de::Error,
    },

    /// Serializing the configuration failed
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),
}

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Serial device and framing
    pub serial: SerialConfig,
    /// Exchange timing and handshake policy
    pub link: LinkConfig,
    /// Background liveness checks
    pub liveness: LivenessConfig,
}

impl AppConfig {
    /// Load from the platform config directory, falling back to defaults
    /// when no file exists there
    pub fn load() -> Result<Self, ConfigError> {
        let path = super::default_config_path().ok_or(ConfigError::NoConfigDir)?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load from an explicit file
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Write to an explicit file
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let content = self.to_toml()?;
        std::fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Render as TOML
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::session::HandshakePolicy;
    use crate::core::transport::SerialParity;
    use std::io::Write;

    #[test]
    fn test_defaults_match_modem_reference() {
        let config = AppConfig::default();
        assert_eq!(config.serial.baud_rate, 115_200);
        assert_eq!(config.serial.parity, SerialParity::Even);
        assert_eq!(config.serial.data_bits, 7);
        assert_eq!(config.serial.read_timeout_ms, 500);
        assert_eq!(config.link.open_settle_ms, 200);
        assert_eq!(config.link.write_settle_ms, 50);
        assert_eq!(config.link.exchange_timeout_ms, 2000);
        assert_eq!(config.link.handshake, HandshakePolicy::Verify);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[serial]\nport = \"/dev/ttyACM0\"\n\n[link]\nexchange_timeout_ms = 5000\nhandshake = \"prime\"\n"
        )
        .unwrap();

        let config = AppConfig::load_from(file.path()).unwrap();
        assert_eq!(config.serial.port, "/dev/ttyACM0");
        assert_eq!(config.serial.baud_rate, 115_200);
        assert_eq!(config.link.exchange_timeout_ms, 5000);
        assert_eq!(config.link.write_settle_ms, 50);
        assert_eq!(config.link.handshake, HandshakePolicy::Prime);
        assert!(config.liveness.enabled);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut config = AppConfig::default();
        config.liveness.interval_secs = 5;
        config.save_to(&path).unwrap();
        assert_eq!(AppConfig::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_invalid_file_reports_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[link]\nexchange_timeout_ms = \"soon\"").unwrap();
        let err = AppConfig::load_from(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains(&file.path().display().to_string()));
    }
}
