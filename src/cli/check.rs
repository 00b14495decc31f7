//! One-shot check command

use std::path::PathBuf;
use std::sync::Arc;

use colored::Colorize;
use tracing::info;
use vpnpp_core::error::VpnppError;

use crate::cli::{build_checker, load, paint_status};
use crate::host::ConsoleListener;

/// Run a single check cycle and print the outcome
pub async fn run_check(config: Option<PathBuf>, json: bool) -> Result<(), VpnppError> {
    let config = load(config)?;
    let checker = build_checker(&config)?;

    if !json {
        checker
            .hub()
            .add_listener(Arc::new(ConsoleListener::new(checker.hub())));
    }

    info!("Running one check cycle");
    let result = checker.run_cycle().await?;

    if json {
        let rendered = serde_json::to_string_pretty(&result).map_err(std::io::Error::from)?;
        println!("{}", rendered);
        return Ok(());
    }

    println!();
    match result.address_resolved {
        Some(ref address) => println!("{} {}", "VPN address:".bold(), address),
        None => println!("{} {}", "VPN address:".bold(), "none".yellow()),
    }
    let bound = result
        .bind
        .bound_ip()
        .map(|ip| ip.to_string())
        .unwrap_or_else(|| "all interfaces".to_string());
    println!("{} {}:{}", "Bound to:".bold(), bound, result.bind.bound_port);
    println!("{} {}", "Status:".bold(), paint_status(result.reachability));
    Ok(())
}
