//! Error types for the vpnpp port monitor
//!
//! Every failure the engine can observe is a value here. None of them is
//! fatal to the host: transient ones are logged and retried on the next
//! cycle, configuration ones are rejected before they reach the engine.

use thiserror::Error;

/// Main error type for the vpnpp engine
#[derive(Error, Debug)]
pub enum VpnppError {
    /// Errors related to configuration loading/validation
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Errors related to network interface enumeration
    #[error("Address resolution error: {0}")]
    Resolve(#[from] ResolveError),

    /// Errors reported by the host bind controller or port-mapping layer
    #[error("Bind error: {0}")]
    Bind(#[from] BindError),

    /// Errors related to the external reachability probe
    #[error("Probe error: {0}")]
    Probe(#[from] ProbeError),

    /// Generic I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing errors
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization errors
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

/// Configuration-related errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid VPN address pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Check interval must be between 0 and 1440 minutes, got: {minutes}")]
    IntervalOutOfRange { minutes: i64 },

    #[error("Unknown configuration key: {key}")]
    UnknownKey { key: String },

    #[error("Invalid value {value:?} for configuration key {key}")]
    InvalidValue { key: String, value: String },

    #[error("Failed to load configuration file: {path}")]
    LoadFailed { path: String },

    #[error("Failed to save configuration file: {path}")]
    SaveFailed { path: String },

    #[error("Configuration validation error: {message}")]
    ValidationError { message: String },

    #[error("I/O error: {message}")]
    IoError { message: String },
}

/// Network interface enumeration errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("Failed to enumerate network interfaces: {reason}")]
    EnumerationFailed { reason: String },
}

/// Host networking collaborator errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BindError {
    #[error("Host networking layer is not ready")]
    NotReady,

    #[error("Failed to rebind to {address}:{port}: {reason}")]
    RebindFailed {
        address: String,
        port: u16,
        reason: String,
    },

    #[error("Failed to refresh port mapping for {address}:{port}: {reason}")]
    PortMappingFailed {
        address: String,
        port: u16,
        reason: String,
    },
}

/// External port-check errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProbeError {
    #[error("Port check timed out after {seconds} seconds")]
    Timeout { seconds: u64 },

    #[error("Port check endpoint is invalid: {reason}")]
    InvalidEndpoint { reason: String },

    #[error("Port check request failed: {reason}")]
    RequestFailed { reason: String },
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, VpnppError>;
