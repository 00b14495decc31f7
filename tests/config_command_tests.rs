//! Integration tests for the config and check commands
//!
//! These run the built binary against a temporary config file and verify
//! that invalid values are rejected with exit code 2 and never persisted.

use std::path::Path;
use std::process::{Command, Output};

use tempfile::tempdir;
use vpnpp_core::config::toml_config::TomlConfig;

fn vpnpp(config: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_vpnpp"))
        .arg("--config")
        .arg(config)
        .args(args)
        .env_remove("JOURNAL_STREAM")
        .output()
        .expect("Failed to execute vpnpp")
}

#[test]
fn test_config_set_persists_valid_value() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");

    let output = vpnpp(&path, &["config", "set", "check.minutes", "15"]);

    assert!(output.status.success(), "{:?}", output);
    assert!(String::from_utf8_lossy(&output.stdout).contains("check.minutes = 15"));
    let saved = TomlConfig::from_file(&path).unwrap();
    assert_eq!(saved.check.check_minutes, 15);
}

#[test]
fn test_config_set_rejects_invalid_regex() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    assert!(vpnpp(&path, &["config", "set", "vpn.ip.regex", r"10\.8\..*"])
        .status
        .success());

    let output = vpnpp(&path, &["config", "set", "vpn.ip.regex", "10\\.("]);

    assert_eq!(output.status.code(), Some(2));
    let saved = TomlConfig::from_file(&path).unwrap();
    assert_eq!(saved.check.vpn_ip_regex, r"10\.8\..*");
}

#[test]
fn test_config_set_rejects_out_of_range_interval() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");

    let output = vpnpp(&path, &["config", "set", "check.minutes", "5000"]);

    assert_eq!(output.status.code(), Some(2));
    assert!(!path.exists());
}

#[test]
fn test_config_show_defaults_without_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");

    let output = vpnpp(&path, &["config", "show"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("check_minutes = 2"));
    assert!(stdout.contains("port_forwarding = true"));
}

#[test]
fn test_check_requires_probe_section() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");

    let output = vpnpp(&path, &["check"]);

    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("[probe]"));
}
