//! Configuration commands

use std::path::PathBuf;

use tracing::info;
use vpnpp_core::config::SharedConfig;
use vpnpp_core::error::VpnppError;

use crate::cli::{config_path, load};

/// Print the effective configuration as TOML
pub fn run_config_show(config: Option<PathBuf>) -> Result<(), VpnppError> {
    let path = config_path(config)?;
    let loaded = load(Some(path.clone()))?;
    println!("# {}", path.display());
    print!("{}", toml_string(&loaded)?);
    Ok(())
}

/// Validate and persist a single check setting
pub fn run_config_set(config: Option<PathBuf>, key: &str, value: &str) -> Result<(), VpnppError> {
    let path = config_path(config)?;
    let mut loaded = load(Some(path.clone()))?;

    let shared = SharedConfig::new(loaded.check.clone())?;
    shared.set_value(key, value)?;
    loaded.check = shared.snapshot().config().clone();

    loaded.to_file(&path)?;
    info!(key, value, "Configuration updated");
    println!("{} = {}", key, shared.get_string(key)?);
    Ok(())
}

fn toml_string(config: &vpnpp_core::config::toml_config::TomlConfig) -> Result<String, VpnppError> {
    Ok(toml::to_string_pretty(config)?)
}
