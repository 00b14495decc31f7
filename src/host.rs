//! Standalone host collaborators
//!
//! When vpnpp runs outside the P2P client there is no networking layer to
//! move, so the bind lives in memory and rebinds are logged for the operator.

use std::net::IpAddr;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use async_trait::async_trait;
use colored::Colorize;
use tracing::info;
use vpnpp_core::config::toml_config::BindConfig;
use vpnpp_core::error::BindError;
use vpnpp_core::monitor::{
    BindController, BindState, NetworkAddress, PortForwarder, StatusHub, StatusListener,
};

/// Bind controller remembering the last requested bind
#[derive(Debug)]
pub struct StandaloneHost {
    bind: Mutex<BindState>,
}

impl StandaloneHost {
    pub fn new(config: &BindConfig) -> Self {
        let bound_address = config
            .address
            .map(|ip| NetworkAddress::new("configured", ip));
        Self {
            bind: Mutex::new(BindState::new(bound_address, config.port)),
        }
    }
}

#[async_trait]
impl BindController for StandaloneHost {
    async fn current_bind(&self) -> Result<BindState, BindError> {
        Ok(self
            .bind
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    async fn rebind(&self, address: &NetworkAddress, port: u16) -> Result<(), BindError> {
        info!(address = %address, port, "Client should now listen on the VPN address");
        *self.bind.lock().unwrap_or_else(PoisonError::into_inner) =
            BindState::new(Some(address.clone()), port);
        Ok(())
    }
}

#[async_trait]
impl PortForwarder for StandaloneHost {
    async fn refresh_mapping(&self, address: IpAddr, port: u16) -> Result<(), BindError> {
        info!(%address, port, "No port-mapping layer attached, refresh skipped");
        Ok(())
    }
}

/// Prints status events to the terminal
pub struct ConsoleListener {
    hub: Weak<StatusHub>,
}

impl ConsoleListener {
    pub fn new(hub: &Arc<StatusHub>) -> Self {
        Self {
            hub: Arc::downgrade(hub),
        }
    }
}

impl StatusListener for ConsoleListener {
    fn protocol_addresses_status_changed(&self, text: &str) {
        println!("{} {}", "address:".bold(), text);
    }

    fn port_check_status_changed(&self, text: &str) {
        let status = self
            .hub
            .upgrade()
            .map(|hub| hub.current_status_id())
            .unwrap_or_default();
        println!("{} {}", crate::cli::paint_status(status), text);
    }

    fn port_check_start(&self) {
        println!("{}", "checking port...".dimmed());
    }
}
