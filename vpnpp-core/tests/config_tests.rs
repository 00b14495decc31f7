//! Tests for runtime configuration validation and change notification

use vpnpp_core::config::{
    CheckConfig, SharedConfig, DEFAULT_VPN_IP_REGEX, KEY_CHECK_MINUTES, KEY_PORT_FORWARDING,
    KEY_VPN_IP_REGEX,
};
use vpnpp_core::error::ConfigError;

fn shared() -> SharedConfig {
    SharedConfig::new(CheckConfig::default()).unwrap()
}

#[test]
fn test_defaults_exposed_by_key() {
    let config = shared();
    assert_eq!(config.get_int(KEY_CHECK_MINUTES).unwrap(), 2);
    assert_eq!(
        config.get_string(KEY_VPN_IP_REGEX).unwrap(),
        DEFAULT_VPN_IP_REGEX
    );
    assert!(config.get_bool(KEY_PORT_FORWARDING).unwrap());
}

#[test]
fn test_invalid_regex_keeps_previous_pattern() {
    let config = shared();
    config.set_vpn_ip_regex(r"10\.8\..*").unwrap();

    let result = config.set_vpn_ip_regex("10\\.(");

    assert!(matches!(result, Err(ConfigError::InvalidPattern { .. })));
    assert_eq!(config.get_string(KEY_VPN_IP_REGEX).unwrap(), r"10\.8\..*");
    assert!(config.snapshot().pattern().is_match("10.8.1.1"));
}

#[test]
fn test_out_of_range_interval_rejected() {
    let config = shared();

    assert_eq!(
        config.set_check_minutes(1441),
        Err(ConfigError::IntervalOutOfRange { minutes: 1441 })
    );
    assert!(config.set_check_minutes(-5).is_err());
    assert_eq!(config.get_int(KEY_CHECK_MINUTES).unwrap(), 2);

    config.set_check_minutes(0).unwrap();
    assert_eq!(config.snapshot().check_minutes(), 0);
    config.set_check_minutes(1440).unwrap();
    assert_eq!(config.snapshot().check_minutes(), 1440);
}

#[test]
fn test_set_value_parses_text() {
    let config = shared();
    config.set_value(KEY_CHECK_MINUTES, " 30 ").unwrap();
    config.set_value(KEY_PORT_FORWARDING, "false").unwrap();
    config.set_value(KEY_VPN_IP_REGEX, r"172\.16\..*").unwrap();

    let snapshot = config.snapshot();
    assert_eq!(snapshot.check_minutes(), 30);
    assert!(!snapshot.port_forwarding());
    assert!(snapshot.pattern().is_match("172.16.0.9"));
}

#[test]
fn test_set_value_rejects_bad_input() {
    let config = shared();
    assert!(matches!(
        config.set_value(KEY_CHECK_MINUTES, "soon"),
        Err(ConfigError::InvalidValue { .. })
    ));
    assert!(matches!(
        config.set_value(KEY_PORT_FORWARDING, "maybe"),
        Err(ConfigError::InvalidValue { .. })
    ));
    assert!(matches!(
        config.set_value("vpn.port", "1"),
        Err(ConfigError::UnknownKey { .. })
    ));
    assert_eq!(config.snapshot().config(), &CheckConfig::default());
}

#[test]
fn test_typed_getter_rejects_wrong_key() {
    let config = shared();
    assert!(config.get_int(KEY_VPN_IP_REGEX).is_err());
    assert!(config.get_bool(KEY_CHECK_MINUTES).is_err());
}

#[test]
fn test_invalid_initial_config_rejected() {
    let config = CheckConfig {
        vpn_ip_regex: "[".to_string(),
        ..CheckConfig::default()
    };
    assert!(SharedConfig::new(config).is_err());
}

#[test]
fn test_snapshot_unaffected_by_later_writes() {
    let config = shared();
    let before = config.snapshot();

    config.set_check_minutes(10).unwrap();
    config.set_port_forwarding(false).unwrap();

    assert_eq!(before.check_minutes(), 2);
    assert!(before.port_forwarding());
    assert_eq!(config.snapshot().check_minutes(), 10);
}

#[test]
fn test_subscribers_see_accepted_changes_only() {
    let config = shared();
    let mut rx = config.subscribe();

    assert!(config.set_vpn_ip_regex("(").is_err());
    assert!(!rx.has_changed().unwrap());

    config.set_check_minutes(7).unwrap();
    assert!(rx.has_changed().unwrap());
    assert_eq!(rx.borrow_and_update().check_minutes(), 7);
}

#[test]
fn test_concurrent_writers_keep_both_fields() {
    let config = shared();
    let minutes = config.clone();
    let forwarding = config.clone();

    let a = std::thread::spawn(move || {
        for m in 1..=50 {
            minutes.set_check_minutes(m).unwrap();
        }
    });
    let b = std::thread::spawn(move || {
        for i in 0..50 {
            forwarding.set_port_forwarding(i % 2 == 0).unwrap();
        }
    });
    a.join().unwrap();
    b.join().unwrap();

    let snapshot = config.snapshot();
    assert_eq!(snapshot.check_minutes(), 50);
    assert!(!snapshot.port_forwarding());
}
