//! Interface listing command

use std::path::PathBuf;

use colored::Colorize;
use vpnpp_core::config::SharedConfig;
use vpnpp_core::error::VpnppError;
use vpnpp_core::monitor::{resolve_vpn_address, InterfaceEnumerator, SystemInterfaces};

use crate::cli::load;

/// Print every interface address, marking pattern matches and the resolver's pick
pub fn run_interfaces(config: Option<PathBuf>) -> Result<(), VpnppError> {
    let config = load(config)?;
    let snapshot = SharedConfig::new(config.check)?.snapshot();
    let pattern = snapshot.pattern();

    let addresses = SystemInterfaces.addresses()?;
    let chosen = resolve_vpn_address(&SystemInterfaces, pattern);

    println!("Pattern: {}", pattern.as_str().bold());
    for address in &addresses {
        let text = address.ip_address.to_string();
        let marker = if chosen.as_ref() == Some(address) {
            "*".green().bold()
        } else if pattern.is_match(&text) {
            "+".yellow()
        } else {
            " ".normal()
        };
        let mut line = format!("{} {:<12} {}", marker, address.interface_name, text);
        if address.is_loopback {
            line.push_str(" (loopback)");
        } else if address.is_link_local() {
            line.push_str(" (link-local)");
        }
        println!("{}", line);
    }

    if chosen.is_none() {
        println!("{}", "No interface address matches the VPN pattern".yellow());
    }
    Ok(())
}
