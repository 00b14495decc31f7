//! Configuration module
//!
//! Holds the check settings the monitor reads every cycle, validates changes
//! coming from the host's configuration layer, and handles loading and saving
//! them from TOML files.

use std::sync::Arc;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::ConfigError;

pub mod toml_config;

/// Configuration key for the check interval in minutes
pub const KEY_CHECK_MINUTES: &str = "check.minutes";

/// Configuration key for the VPN address regular expression
pub const KEY_VPN_IP_REGEX: &str = "vpn.ip.regex";

/// Configuration key toggling port-mapping refresh after a rebind
pub const KEY_PORT_FORWARDING: &str = "vpn.port.forwarding";

pub const DEFAULT_CHECK_MINUTES: u32 = 2;
pub const MAX_CHECK_MINUTES: u32 = 60 * 24;
pub const DEFAULT_VPN_IP_REGEX: &str = r"10\.[0-9]+\.[0-9]+\.[0-9]+";

/// Check settings owned by the host and read by the monitor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckConfig {
    /// Minutes between scheduled checks; 0 disables the timer
    #[serde(default = "default_check_minutes")]
    pub check_minutes: u32,

    /// Regular expression matched against interface addresses
    #[serde(default = "default_vpn_ip_regex")]
    pub vpn_ip_regex: String,

    /// Refresh the router port mapping after a rebind
    #[serde(default = "default_port_forwarding")]
    pub port_forwarding: bool,
}

fn default_check_minutes() -> u32 {
    DEFAULT_CHECK_MINUTES
}
fn default_vpn_ip_regex() -> String {
    DEFAULT_VPN_IP_REGEX.to_string()
}
fn default_port_forwarding() -> bool {
    true
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            check_minutes: default_check_minutes(),
            vpn_ip_regex: default_vpn_ip_regex(),
            port_forwarding: default_port_forwarding(),
        }
    }
}

impl CheckConfig {
    /// Validate the configuration
    ///
    /// Returns the compiled VPN address pattern on success so callers never
    /// compile it twice.
    pub fn validate(&self) -> Result<Regex, ConfigError> {
        validate_minutes(i64::from(self.check_minutes))?;
        compile_pattern(&self.vpn_ip_regex)
    }
}

fn validate_minutes(minutes: i64) -> Result<u32, ConfigError> {
    if !(0..=i64::from(MAX_CHECK_MINUTES)).contains(&minutes) {
        return Err(ConfigError::IntervalOutOfRange { minutes });
    }
    Ok(minutes as u32)
}

/// Compile a VPN address pattern
///
/// The pattern must match the whole textual address, so `10\.[0-9]+...` does
/// not accept `110.20.30.40`.
pub fn compile_pattern(pattern: &str) -> Result<Regex, ConfigError> {
    let invalid = |e: regex::Error| ConfigError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    };
    // Compiling the bare pattern first keeps an unbalanced `)` from closing
    // the anchoring group
    Regex::new(pattern).map_err(invalid)?;
    Regex::new(&format!("^(?:{})$", pattern)).map_err(invalid)
}

/// A consistent, validated copy of the configuration
///
/// Taken once at the start of a cycle; later writes never affect it.
#[derive(Debug, Clone)]
pub struct ConfigSnapshot {
    config: CheckConfig,
    pattern: Regex,
}

impl ConfigSnapshot {
    fn new(config: CheckConfig) -> Result<Self, ConfigError> {
        let pattern = config.validate()?;
        Ok(Self { config, pattern })
    }

    pub fn config(&self) -> &CheckConfig {
        &self.config
    }

    pub fn check_minutes(&self) -> u32 {
        self.config.check_minutes
    }

    /// Compiled form of `vpn.ip.regex`
    pub fn pattern(&self) -> &Regex {
        &self.pattern
    }

    pub fn port_forwarding(&self) -> bool {
        self.config.port_forwarding
    }
}

/// Runtime configuration store shared between the host and the monitor
///
/// Writes are validated before they are published; a rejected write leaves
/// the previous value in effect. Readers take whole snapshots, never single
/// fields, so a cycle always sees one coherent configuration.
#[derive(Debug, Clone)]
pub struct SharedConfig {
    tx: Arc<watch::Sender<Arc<ConfigSnapshot>>>,
}

impl SharedConfig {
    /// Create a store seeded with `config`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the initial configuration is invalid
    pub fn new(config: CheckConfig) -> Result<Self, ConfigError> {
        let snapshot = ConfigSnapshot::new(config)?;
        let (tx, _rx) = watch::channel(Arc::new(snapshot));
        Ok(Self { tx: Arc::new(tx) })
    }

    /// Get a consistent copy of the current configuration
    pub fn snapshot(&self) -> Arc<ConfigSnapshot> {
        self.tx.borrow().clone()
    }

    /// Subscribe to accepted configuration changes
    pub fn subscribe(&self) -> watch::Receiver<Arc<ConfigSnapshot>> {
        self.tx.subscribe()
    }

    /// Set the check interval in minutes (0 disables the timer)
    pub fn set_check_minutes(&self, minutes: i64) -> Result<(), ConfigError> {
        let minutes = validate_minutes(minutes).map_err(|e| {
            warn!("Rejected {} change: {}", KEY_CHECK_MINUTES, e);
            e
        })?;
        self.update(KEY_CHECK_MINUTES, |config| config.check_minutes = minutes)
    }

    /// Set the VPN address pattern; it must compile as a regular expression
    pub fn set_vpn_ip_regex(&self, pattern: &str) -> Result<(), ConfigError> {
        compile_pattern(pattern).map_err(|e| {
            warn!("Rejected {} change: {}", KEY_VPN_IP_REGEX, e);
            e
        })?;
        self.update(KEY_VPN_IP_REGEX, |config| {
            config.vpn_ip_regex = pattern.to_string()
        })
    }

    pub fn set_port_forwarding(&self, enabled: bool) -> Result<(), ConfigError> {
        self.update(KEY_PORT_FORWARDING, |config| config.port_forwarding = enabled)
    }

    /// Replace the whole configuration at once
    pub fn replace(&self, config: CheckConfig) -> Result<(), ConfigError> {
        let snapshot = ConfigSnapshot::new(config)?;
        self.tx.send_replace(Arc::new(snapshot));
        info!("Configuration replaced");
        Ok(())
    }

    /// Set a value by key from its textual form
    pub fn set_value(&self, key: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = || ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        };
        match key {
            KEY_CHECK_MINUTES => {
                let minutes = value.trim().parse::<i64>().map_err(|_| invalid())?;
                self.set_check_minutes(minutes)
            }
            KEY_VPN_IP_REGEX => self.set_vpn_ip_regex(value),
            KEY_PORT_FORWARDING => {
                let enabled = value.trim().parse::<bool>().map_err(|_| invalid())?;
                self.set_port_forwarding(enabled)
            }
            _ => Err(ConfigError::UnknownKey {
                key: key.to_string(),
            }),
        }
    }

    pub fn get_int(&self, key: &str) -> Result<i64, ConfigError> {
        match key {
            KEY_CHECK_MINUTES => Ok(i64::from(self.snapshot().check_minutes())),
            _ => Err(ConfigError::UnknownKey {
                key: key.to_string(),
            }),
        }
    }

    pub fn get_string(&self, key: &str) -> Result<String, ConfigError> {
        let snapshot = self.snapshot();
        match key {
            KEY_CHECK_MINUTES => Ok(snapshot.check_minutes().to_string()),
            KEY_VPN_IP_REGEX => Ok(snapshot.config().vpn_ip_regex.clone()),
            KEY_PORT_FORWARDING => Ok(snapshot.port_forwarding().to_string()),
            _ => Err(ConfigError::UnknownKey {
                key: key.to_string(),
            }),
        }
    }

    pub fn get_bool(&self, key: &str) -> Result<bool, ConfigError> {
        match key {
            KEY_PORT_FORWARDING => Ok(self.snapshot().port_forwarding()),
            _ => Err(ConfigError::UnknownKey {
                key: key.to_string(),
            }),
        }
    }

    fn update<F>(&self, key: &str, apply: F) -> Result<(), ConfigError>
    where
        F: FnOnce(&mut CheckConfig),
    {
        // Read-modify-write under the channel's lock so concurrent writers
        // never overwrite each other's fields.
        let mut result = Ok(());
        self.tx.send_if_modified(|current| {
            let mut config = current.config().clone();
            apply(&mut config);
            if &config == current.config() {
                debug!(key, "Configuration value unchanged");
                return false;
            }
            match ConfigSnapshot::new(config) {
                Ok(snapshot) => {
                    *current = Arc::new(snapshot);
                    info!(key, "Configuration value changed");
                    true
                }
                Err(e) => {
                    result = Err(e);
                    false
                }
            }
        });
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = CheckConfig::default();
        assert_eq!(config.check_minutes, 2);
        assert!(config.port_forwarding);
        let pattern = config.validate().unwrap();
        assert!(pattern.is_match("10.8.0.5"));
    }

    #[test]
    fn test_pattern_matches_whole_address() {
        let pattern = compile_pattern(DEFAULT_VPN_IP_REGEX).unwrap();
        assert!(pattern.is_match("10.8.0.5"));
        assert!(!pattern.is_match("110.20.30.40"));
        assert!(!pattern.is_match("210.10.0.1"));

        let alternation = compile_pattern(r"10\..*|172\.16\..*").unwrap();
        assert!(alternation.is_match("172.16.0.9"));
        assert!(!alternation.is_match("1172.16.0.9"));

        assert!(compile_pattern(r"10\..*)|(.*").is_err());
    }

    #[test]
    fn test_invalid_pattern_reports_original_text() {
        match compile_pattern(r"10\.(") {
            Err(ConfigError::InvalidPattern { pattern, .. }) => assert_eq!(pattern, r"10\.("),
            other => panic!("expected InvalidPattern, got {:?}", other),
        }
    }

    #[test]
    fn test_minutes_bounds() {
        assert!(validate_minutes(0).is_ok());
        assert!(validate_minutes(1440).is_ok());
        assert_eq!(
            validate_minutes(1441),
            Err(ConfigError::IntervalOutOfRange { minutes: 1441 })
        );
        assert!(validate_minutes(-1).is_err());
    }

    #[test]
    fn test_unchanged_value_does_not_notify() {
        let shared = SharedConfig::new(CheckConfig::default()).unwrap();
        let rx = shared.subscribe();
        shared.set_check_minutes(2).unwrap();
        assert!(!rx.has_changed().unwrap());
        shared.set_check_minutes(5).unwrap();
        assert!(rx.has_changed().unwrap());
    }
}
