//! vpnpp - VPN port binding monitor
//!
//! Keeps a P2P client's listening port bound to the VPN tunnel address and
//! checks from outside that the port is reachable.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use vpnpp_core::error::VpnppError;
use vpnpp_core::{init_logging, LevelFilter};

mod cli;
mod host;

#[derive(Parser)]
#[command(name = "vpnpp")]
#[command(about = "Keep the listening port on the VPN and check it is reachable")]
struct Cli {
    /// Configuration file (default: ~/.config/vpnpp/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one check cycle and print the outcome
    Check {
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run checks on the configured interval until interrupted (SIGHUP reloads [check])
    Watch,
    /// List interface addresses and show which one matches the VPN pattern
    Interfaces,
    /// Show or change configuration values
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the effective configuration
    Show,
    /// Set a value (check.minutes, vpn.ip.regex, vpn.port.forwarding)
    Set { key: String, value: String },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    if let Err(e) = init_logging(level) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(2);
    }

    let result = match cli.command {
        Commands::Check { json } => cli::check::run_check(cli.config, json).await,
        Commands::Watch => cli::watch::run_watch(cli.config).await,
        Commands::Interfaces => cli::interfaces::run_interfaces(cli.config),
        Commands::Config { action } => match action {
            ConfigCommands::Show => cli::config::run_config_show(cli.config),
            ConfigCommands::Set { key, value } => {
                cli::config::run_config_set(cli.config, &key, &value)
            }
        },
    };

    match result {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            let exit_code = match e {
                // Configuration errors (exit code 2)
                VpnppError::Config(_) | VpnppError::Toml(_) | VpnppError::TomlSerialize(_) => 2,
                // Runtime errors (exit code 1)
                VpnppError::Resolve(_)
                | VpnppError::Bind(_)
                | VpnppError::Probe(_)
                | VpnppError::Io(_) => 1,
            };

            eprintln!("{}", e);
            std::process::exit(exit_code);
        }
    }
}
