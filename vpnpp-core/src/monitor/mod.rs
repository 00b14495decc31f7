//! Port monitoring module
//!
//! Resolves the VPN address, reconciles the host's bind with it, probes the
//! bound port from outside and publishes the outcome to status listeners.

pub mod checker;
pub mod prober;
pub mod reconciler;
pub mod resolver;
pub mod scheduler;
pub mod status;

// In-memory host collaborators for tests
#[cfg(any(test, feature = "mock-host"))]
pub mod mock;

// Public re-exports
pub use checker::{CheckResult, Checker};
pub use prober::{HttpPortChecker, PortCheckService, PortState, ProbeOutcome, ReachabilityProber};
pub use reconciler::{BindController, BindReconciler, BindState, PortForwarder, ReconcileOutcome};
pub use resolver::{resolve_vpn_address, InterfaceEnumerator, NetworkAddress, SystemInterfaces};
pub use scheduler::{Scheduler, SchedulerState, SchedulerStats};
pub use status::{ListenerId, StatusHub, StatusId, StatusListener};
