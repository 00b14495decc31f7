//! CLI command implementations
//!
//! This module contains the implementation of all CLI subcommands.

pub mod check;
pub mod config;
pub mod interfaces;
pub mod watch;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use colored::{ColoredString, Colorize};
use vpnpp_core::config::toml_config::{get_config_path, load_or_default, BindConfig, TomlConfig};
use vpnpp_core::config::SharedConfig;
use vpnpp_core::error::{ConfigError, VpnppError};
use vpnpp_core::monitor::{
    BindReconciler, Checker, HttpPortChecker, ReachabilityProber, StatusHub, StatusId,
    SystemInterfaces,
};

use crate::host::StandaloneHost;

/// Resolve the config path from the command line or the default location
pub fn config_path(explicit: Option<PathBuf>) -> Result<PathBuf, VpnppError> {
    match explicit {
        Some(path) => Ok(path),
        None => get_config_path(),
    }
}

pub fn load(explicit: Option<PathBuf>) -> Result<TomlConfig, VpnppError> {
    load_or_default(&config_path(explicit)?)
}

/// Wire the engine to the standalone host
pub fn build_checker(config: &TomlConfig) -> Result<Checker, VpnppError> {
    let probe = config.probe.as_ref().ok_or_else(|| ConfigError::ValidationError {
        message: "No [probe] section configured; set probe.endpoint to a port-check service"
            .to_string(),
    })?;
    let bind = config.bind.clone().unwrap_or(BindConfig {
        port: 6881,
        address: None,
    });

    let host = Arc::new(StandaloneHost::new(&bind));
    let timeout = Duration::from_secs(probe.timeout_secs);
    let service = HttpPortChecker::new(&probe.endpoint, timeout)?;

    Ok(Checker::new(
        SharedConfig::new(config.check.clone())?,
        Arc::new(SystemInterfaces),
        BindReconciler::new(host.clone(), host),
        ReachabilityProber::new(Arc::new(service), timeout),
        Arc::new(StatusHub::new()),
    ))
}

pub fn paint_status(status: StatusId) -> ColoredString {
    let label = format!("[{}]", status.indicator_text().unwrap_or("?"));
    match status.indicator_rgb() {
        Some([r, g, b]) => label.truecolor(r, g, b).bold(),
        None => label.normal(),
    }
}
