//! Bind reconciliation
//!
//! Decides whether the host's listening socket must move to the VPN address
//! and asks the host to do it. Socket work itself always belongs to the host.

use std::net::IpAddr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::BindError;
use crate::monitor::resolver::NetworkAddress;

/// The host's current listening bind
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BindState {
    /// None, or an unspecified address, means "all interfaces"
    pub bound_address: Option<NetworkAddress>,
    pub bound_port: u16,
}

impl BindState {
    pub fn new(bound_address: Option<NetworkAddress>, bound_port: u16) -> Self {
        Self {
            bound_address,
            bound_port,
        }
    }

    pub fn bound_ip(&self) -> Option<IpAddr> {
        self.bound_address.as_ref().map(|address| address.ip_address)
    }
}

/// The host networking layer owning the listening socket
#[async_trait]
pub trait BindController: Send + Sync {
    /// Report the current bind
    async fn current_bind(&self) -> Result<BindState, BindError>;

    /// Move the listening socket to `address`, keeping `port`
    async fn rebind(&self, address: &NetworkAddress, port: u16) -> Result<(), BindError>;
}

/// The host's router port-mapping layer (UPnP, NAT-PMP)
#[async_trait]
pub trait PortForwarder: Send + Sync {
    /// Refresh the mapping for the given address/port pair (best effort)
    async fn refresh_mapping(&self, address: IpAddr, port: u16) -> Result<(), BindError>;
}

/// Outcome of one reconciliation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// The resolved address differed from the bound one
    pub bind_mismatch: bool,
    /// A rebind was requested from the host
    pub rebind_requested: bool,
    /// Set when the host refused or failed the rebind
    pub rebind_error: Option<BindError>,
    /// Bind in effect after reconciliation
    pub new_bind: BindState,
}

/// Compares the resolved VPN address with the host bind and requests rebinds
#[derive(Clone)]
pub struct BindReconciler {
    bind: Arc<dyn BindController>,
    forwarder: Arc<dyn PortForwarder>,
}

impl BindReconciler {
    pub fn new(bind: Arc<dyn BindController>, forwarder: Arc<dyn PortForwarder>) -> Self {
        Self { bind, forwarder }
    }

    /// Read the host's current bind
    pub async fn current_bind(&self) -> Result<BindState, BindError> {
        self.bind.current_bind().await
    }

    /// Reconcile the host bind with the resolved VPN address
    ///
    /// * No resolved address: the host keeps its bind.
    /// * Same IP: nothing to do.
    /// * Different IP: request a rebind on the same port and, when
    ///   `port_forwarding` is enabled and the rebind succeeded, a port-mapping
    ///   refresh. Failures are logged and the previous bind is kept.
    #[tracing::instrument(skip(self, resolved, current), fields(port = current.bound_port))]
    pub async fn reconcile(
        &self,
        resolved: Option<&NetworkAddress>,
        current: &BindState,
        port_forwarding: bool,
    ) -> ReconcileOutcome {
        let unchanged = |bind_mismatch| ReconcileOutcome {
            bind_mismatch,
            rebind_requested: false,
            rebind_error: None,
            new_bind: current.clone(),
        };

        let Some(resolved) = resolved else {
            debug!("No VPN address resolved, keeping current bind");
            return unchanged(false);
        };

        if current.bound_ip() == Some(resolved.ip_address) {
            debug!(address = %resolved.ip_address, "Bind already matches VPN address");
            return unchanged(false);
        }

        let port = current.bound_port;
        info!(
            from = ?current.bound_ip(),
            to = %resolved.ip_address,
            port,
            "Bind does not match VPN address, requesting rebind"
        );

        if let Err(e) = self.bind.rebind(resolved, port).await {
            warn!(error = %e, "Rebind failed, keeping previous bind until next check");
            return ReconcileOutcome {
                rebind_requested: true,
                rebind_error: Some(e),
                ..unchanged(true)
            };
        }

        if port_forwarding {
            match self.forwarder.refresh_mapping(resolved.ip_address, port).await {
                Ok(()) => debug!(address = %resolved.ip_address, port, "Port mapping refreshed"),
                Err(e) => warn!(error = %e, "Port mapping refresh failed"),
            }
        }

        ReconcileOutcome {
            bind_mismatch: true,
            rebind_requested: true,
            rebind_error: None,
            new_bind: BindState::new(Some(resolved.clone()), port),
        }
    }
}
