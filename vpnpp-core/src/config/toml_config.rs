//! TOML configuration file I/O
//!
//! Handles loading and saving monitor configuration to/from TOML files
//! in the user's configuration directory.

use crate::config::CheckConfig;
use crate::error::{ConfigError, VpnppError};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Default timeout for the external port check in seconds
pub const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 20;

/// Settings for the external port-check service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// HTTP/HTTPS endpoint answering `?port=<n>` queries
    pub endpoint: String,

    /// Upper bound for one port check
    #[serde(default = "default_probe_timeout")]
    pub timeout_secs: u64,
}

fn default_probe_timeout() -> u64 {
    DEFAULT_PROBE_TIMEOUT_SECS
}

impl ProbeConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        match url::Url::parse(&self.endpoint) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(url) => {
                return Err(ConfigError::ValidationError {
                    message: format!(
                        "Port check endpoint must use http or https, got: {}",
                        url.scheme()
                    ),
                })
            }
            Err(e) => {
                return Err(ConfigError::ValidationError {
                    message: format!("Failed to parse port check endpoint: {}", e),
                })
            }
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::ValidationError {
                message: "Port check timeout cannot be zero".to_string(),
            });
        }
        Ok(())
    }
}

/// Listening socket used when the monitor runs outside the P2P client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindConfig {
    /// Listening port of the client
    pub port: u16,

    /// Address the client is currently bound to, if any
    #[serde(default)]
    pub address: Option<IpAddr>,
}

impl BindConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::ValidationError {
                message: "Bind port cannot be zero".to_string(),
            });
        }
        Ok(())
    }
}

/// Complete TOML configuration structure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Check settings shared with the host
    #[serde(default)]
    pub check: CheckConfig,

    /// External port-check service (optional)
    #[serde(default)]
    pub probe: Option<ProbeConfig>,

    /// Standalone bind settings (optional)
    #[serde(default)]
    pub bind: Option<BindConfig>,
}

impl TomlConfig {
    /// Validate every section present in the file
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.check.validate()?;
        if let Some(ref probe) = self.probe {
            probe.validate()?;
        }
        if let Some(ref bind) = self.bind {
            bind.validate()?;
        }
        Ok(())
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, VpnppError> {
        let contents = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ConfigError::LoadFailed {
                path: path.to_string_lossy().to_string(),
            },
            _ => ConfigError::IoError {
                message: format!("Failed to read config file: {}", e),
            },
        })?;

        let config: TomlConfig = toml::from_str(&contents).map_err(|e| {
            ConfigError::ValidationError {
                message: format!("Failed to parse config file: {}", e),
            }
        })?;

        config.validate()?;

        info!(
            "Loaded configuration: check_minutes={}, vpn_ip_regex={}, port_forwarding={}",
            config.check.check_minutes, config.check.vpn_ip_regex, config.check.port_forwarding
        );
        if config.probe.is_none() {
            debug!("No [probe] section in config, external port checks are unavailable");
        }

        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_file(&self, path: &Path) -> Result<(), VpnppError> {
        self.validate()?;

        let contents = toml::to_string_pretty(self)?;

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError {
                message: format!("Failed to create config directory: {}", e),
            })?;
        }

        std::fs::write(path, contents).map_err(|_e| ConfigError::SaveFailed {
            path: path.to_string_lossy().to_string(),
        })?;

        info!("Saved configuration to {:?}", path);
        Ok(())
    }
}

/// Default configuration file name
const CONFIG_FILE_NAME: &str = "config.toml";

/// Get the default configuration directory
///
/// Returns ~/.config/vpnpp, or the VPNPP_CONFIG_DIR environment variable if set
pub fn get_config_dir() -> Result<PathBuf, VpnppError> {
    if let Ok(config_dir) = std::env::var("VPNPP_CONFIG_DIR") {
        return Ok(PathBuf::from(config_dir));
    }

    let home = std::env::var("HOME").map_err(|_| ConfigError::IoError {
        message: "HOME environment variable not set".to_string(),
    })?;

    Ok(PathBuf::from(home).join(".config").join("vpnpp"))
}

/// Get the default configuration file path
pub fn get_config_path() -> Result<PathBuf, VpnppError> {
    Ok(get_config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load configuration from `path`, falling back to defaults if it does not exist
pub fn load_or_default(path: &Path) -> Result<TomlConfig, VpnppError> {
    if !path.exists() {
        debug!("No config file at {:?}, using defaults", path);
        return Ok(TomlConfig::default());
    }
    TomlConfig::from_file(path)
}
