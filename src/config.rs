//! Runtime configuration.
//!
//! Loaded from a TOML file; every key is optional and falls back to its
//! default. CLI flags are applied on top by the binary.
//!
//! ```toml
//! data_dir = "data"
//! output_dir = "output"
//! escalations_dir = "escalations"
//! parallel = true
//! timeout_ms = 30000
//! approval_expiry_hours = 6
//! persist = true
//! listen = "127.0.0.1:8000"
//! ```

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Upper bound on how long an approval may stay valid.
pub const MAX_APPROVAL_EXPIRY_HOURS: u32 = 24 * 365;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DischargeConfig {
    /// Directory holding `<patient_id>.json` records
    pub data_dir: PathBuf,
    /// Decision state and audit logs
    pub output_dir: PathBuf,
    pub escalations_dir: PathBuf,
    /// Run the five checks on separate threads
    pub parallel: bool,
    /// Deadline for all checks to report
    pub timeout_ms: u64,
    /// How long an approval stays valid
    pub approval_expiry_hours: u32,
    /// Write state, audit log and escalations
    pub persist: bool,
    /// Bind address of `serve`
    pub listen: SocketAddr,
}

impl Default for DischargeConfig {
    fn default() -> Self {
        DischargeConfig {
            data_dir: PathBuf::from("data"),
            output_dir: PathBuf::from("output"),
            escalations_dir: PathBuf::from("escalations"),
            parallel: true,
            timeout_ms: 30_000,
            approval_expiry_hours: 6,
            persist: true,
            listen: SocketAddr::from(([127, 0, 0, 1], 8000)),
        }
    }
}

impl DischargeConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// # Errors
    ///
    /// Returns `ConfigError::Validation` for a zero timeout, or an expiry of
    /// zero or above [`MAX_APPROVAL_EXPIRY_HOURS`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.approval_expiry_hours == 0 {
            return Err(ConfigError::Validation(
                "approval_expiry_hours must be greater than zero".to_string(),
            ));
        }
        if self.approval_expiry_hours > MAX_APPROVAL_EXPIRY_HOURS {
            return Err(ConfigError::Validation(format!(
                "approval_expiry_hours must be at most {} (one year)",
                MAX_APPROVAL_EXPIRY_HOURS
            )));
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read configuration file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("configuration validation failed: {0}")]
    Validation(String),
}
