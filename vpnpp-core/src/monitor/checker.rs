//! One check cycle
//!
//! Resolver, reconciler, prober and hub run strictly in that order against a
//! single configuration snapshot.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, instrument};

use crate::config::SharedConfig;
use crate::error::VpnppError;
use crate::monitor::prober::ReachabilityProber;
use crate::monitor::reconciler::{BindReconciler, BindState, ReconcileOutcome};
use crate::monitor::resolver::{resolve_vpn_address, InterfaceEnumerator, NetworkAddress};
use crate::monitor::status::{StatusHub, StatusId};

/// What one cycle observed and decided
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckResult {
    pub address_resolved: Option<NetworkAddress>,
    pub bind_mismatch: bool,
    pub rebind_requested: bool,
    /// Bind in effect after reconciliation
    pub bind: BindState,
    pub reachability: StatusId,
    pub timestamp: DateTime<Utc>,
}

/// Runs check cycles against the host collaborators
pub struct Checker {
    config: SharedConfig,
    interfaces: Arc<dyn InterfaceEnumerator>,
    reconciler: BindReconciler,
    prober: ReachabilityProber,
    hub: Arc<StatusHub>,
    last_result: Mutex<Option<CheckResult>>,
}

impl Checker {
    pub fn new(
        config: SharedConfig,
        interfaces: Arc<dyn InterfaceEnumerator>,
        reconciler: BindReconciler,
        prober: ReachabilityProber,
        hub: Arc<StatusHub>,
    ) -> Self {
        Self {
            config,
            interfaces,
            reconciler,
            prober,
            hub,
            last_result: Mutex::new(None),
        }
    }

    pub fn hub(&self) -> &Arc<StatusHub> {
        &self.hub
    }

    pub fn config(&self) -> &SharedConfig {
        &self.config
    }

    /// Result of the last completed cycle
    pub fn last_result(&self) -> Option<CheckResult> {
        self.last_result
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Run one full cycle
    ///
    /// Transient collaborator failures are absorbed and reflected in the
    /// status. An error is returned only when the host cannot report its bind
    /// at all, in which case the cycle is abandoned for this tick.
    #[instrument(skip(self))]
    pub async fn run_cycle(&self) -> Result<CheckResult, VpnppError> {
        let snapshot = self.config.snapshot();

        let resolved = resolve_vpn_address(self.interfaces.as_ref(), snapshot.pattern());

        let current = self.reconciler.current_bind().await?;
        let outcome = self
            .reconciler
            .reconcile(resolved.as_ref(), &current, snapshot.port_forwarding())
            .await;
        self.hub
            .set_protocol_address_status(&address_status_text(resolved.as_ref(), &outcome));

        let reachability = match resolved {
            Some(_) => {
                self.hub.port_check_start();
                let probe = self.prober.probe(outcome.new_bind.bound_port).await;
                self.hub.set_port_check_status(probe.status, &probe.text);
                probe.status
            }
            None => {
                self.hub
                    .set_port_check_status(StatusId::Warn, "No VPN address found, port not checked");
                StatusId::Warn
            }
        };

        let result = CheckResult {
            address_resolved: resolved,
            bind_mismatch: outcome.bind_mismatch,
            rebind_requested: outcome.rebind_requested,
            bind: outcome.new_bind,
            reachability,
            timestamp: Utc::now(),
        };

        info!(
            address = ?result.address_resolved.as_ref().map(|a| a.ip_address),
            mismatch = result.bind_mismatch,
            status = %result.reachability,
            "Check cycle complete"
        );

        *self
            .last_result
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(result.clone());
        Ok(result)
    }
}

fn address_status_text(resolved: Option<&NetworkAddress>, outcome: &ReconcileOutcome) -> String {
    let port = outcome.new_bind.bound_port;
    match (resolved, &outcome.rebind_error) {
        (None, _) => match outcome.new_bind.bound_ip() {
            Some(ip) => format!("No VPN address found; still bound to {}:{}", ip, port),
            None => format!("No VPN address found; bound to all interfaces on port {}", port),
        },
        (Some(address), Some(e)) => {
            format!("VPN address {} differs from bind; rebind failed: {}", address, e)
        }
        (Some(address), None) if outcome.rebind_requested => {
            format!("Rebound to VPN address {} on port {}", address, port)
        }
        (Some(address), None) => format!("Bound to VPN address {} on port {}", address, port),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BindError;

    fn tun() -> NetworkAddress {
        NetworkAddress::new("tun0", "10.8.0.5".parse().unwrap())
    }

    fn outcome(rebind_requested: bool, rebind_error: Option<BindError>) -> ReconcileOutcome {
        ReconcileOutcome {
            bind_mismatch: rebind_requested,
            rebind_requested,
            rebind_error,
            new_bind: BindState::new(Some(tun()), 6881),
        }
    }

    #[test]
    fn test_address_text_reflects_rebind() {
        assert_eq!(
            address_status_text(Some(&tun()), &outcome(true, None)),
            "Rebound to VPN address 10.8.0.5 (tun0) on port 6881"
        );
        assert_eq!(
            address_status_text(Some(&tun()), &outcome(false, None)),
            "Bound to VPN address 10.8.0.5 (tun0) on port 6881"
        );
    }

    #[test]
    fn test_address_text_without_vpn() {
        let unbound = ReconcileOutcome {
            bind_mismatch: false,
            rebind_requested: false,
            rebind_error: None,
            new_bind: BindState::new(None, 6881),
        };
        assert_eq!(
            address_status_text(None, &unbound),
            "No VPN address found; bound to all interfaces on port 6881"
        );
    }

    #[test]
    fn test_address_text_rebind_failure() {
        let text = address_status_text(Some(&tun()), &outcome(true, Some(BindError::NotReady)));
        assert!(text.contains("rebind failed"));
    }
}
