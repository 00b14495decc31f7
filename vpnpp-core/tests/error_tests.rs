//! Unit tests for error types and conversions

use vpnpp_core::error::{BindError, ConfigError, ProbeError, ResolveError, VpnppError};

#[test]
fn test_config_error_display() {
    let error = ConfigError::IntervalOutOfRange { minutes: 2000 };
    assert_eq!(
        error.to_string(),
        "Check interval must be between 0 and 1440 minutes, got: 2000"
    );
}

#[test]
fn test_bind_error_display() {
    let error = BindError::RebindFailed {
        address: "10.8.0.5".to_string(),
        port: 6881,
        reason: "address in use".to_string(),
    };
    assert_eq!(
        error.to_string(),
        "Failed to rebind to 10.8.0.5:6881: address in use"
    );
}

#[test]
fn test_probe_error_display() {
    let error = ProbeError::Timeout { seconds: 20 };
    assert_eq!(error.to_string(), "Port check timed out after 20 seconds");
}

#[test]
fn test_resolve_error_display() {
    let error = ResolveError::EnumerationFailed {
        reason: "permission denied".to_string(),
    };
    assert_eq!(
        error.to_string(),
        "Failed to enumerate network interfaces: permission denied"
    );
}

#[test]
fn test_vpnpp_error_from_config() {
    let config_error = ConfigError::UnknownKey {
        key: "vpn.port".to_string(),
    };
    let error: VpnppError = config_error.into();
    assert!(matches!(error, VpnppError::Config(_)));
}

#[test]
fn test_vpnpp_error_from_bind() {
    let error: VpnppError = BindError::NotReady.into();
    assert!(matches!(error, VpnppError::Bind(BindError::NotReady)));
    assert_eq!(
        error.to_string(),
        "Bind error: Host networking layer is not ready"
    );
}
