//! Mock host collaborators for testing
//!
//! In-memory stand-ins for the host's interface list, bind controller,
//! port-mapping layer, port-check service and status listeners. Each records
//! what the engine asked of it so tests can assert on the calls.

use std::collections::VecDeque;
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{BindError, ProbeError, ResolveError};
use crate::monitor::prober::{PortCheckService, PortState};
use crate::monitor::reconciler::{BindController, BindState, PortForwarder};
use crate::monitor::resolver::{InterfaceEnumerator, NetworkAddress};
use crate::monitor::status::StatusListener;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Interface list that tests can change between cycles
#[derive(Debug, Default)]
pub struct MockInterfaces {
    addresses: Mutex<Vec<NetworkAddress>>,
    fail: Mutex<Option<String>>,
}

impl MockInterfaces {
    pub fn new(addresses: Vec<NetworkAddress>) -> Self {
        Self {
            addresses: Mutex::new(addresses),
            fail: Mutex::new(None),
        }
    }

    /// Build from `(interface, ip)` pairs
    pub fn with(pairs: &[(&str, &str)]) -> Self {
        Self::new(
            pairs
                .iter()
                .map(|(name, ip)| NetworkAddress::new(*name, ip.parse().expect("test IP")))
                .collect(),
        )
    }

    pub fn set(&self, addresses: Vec<NetworkAddress>) {
        *lock(&self.addresses) = addresses;
    }

    /// Make enumeration fail with `reason`, or succeed again with None
    pub fn fail_with(&self, reason: Option<&str>) {
        *lock(&self.fail) = reason.map(str::to_string);
    }
}

impl InterfaceEnumerator for MockInterfaces {
    fn addresses(&self) -> Result<Vec<NetworkAddress>, ResolveError> {
        if let Some(reason) = lock(&self.fail).clone() {
            return Err(ResolveError::EnumerationFailed { reason });
        }
        Ok(lock(&self.addresses).clone())
    }
}

/// Bind controller holding the bind in memory
#[derive(Debug)]
pub struct MockBindController {
    bind: Mutex<Option<BindState>>,
    rebinds: Mutex<Vec<(IpAddr, u16)>>,
    fail_rebind: Mutex<Option<String>>,
}

impl MockBindController {
    pub fn new(bind: BindState) -> Self {
        Self {
            bind: Mutex::new(Some(bind)),
            rebinds: Mutex::new(Vec::new()),
            fail_rebind: Mutex::new(None),
        }
    }

    /// Bound to all interfaces (0.0.0.0) on `port`
    pub fn unspecified(port: u16) -> Self {
        Self::new(BindState::new(
            Some(NetworkAddress::new("any", "0.0.0.0".parse().expect("test IP"))),
            port,
        ))
    }

    /// A host whose networking layer has not come up yet
    pub fn not_ready() -> Self {
        Self {
            bind: Mutex::new(None),
            rebinds: Mutex::new(Vec::new()),
            fail_rebind: Mutex::new(None),
        }
    }

    pub fn set_bind(&self, bind: BindState) {
        *lock(&self.bind) = Some(bind);
    }

    pub fn fail_rebind_with(&self, reason: Option<&str>) {
        *lock(&self.fail_rebind) = reason.map(str::to_string);
    }

    /// Rebind requests received so far
    pub fn rebinds(&self) -> Vec<(IpAddr, u16)> {
        lock(&self.rebinds).clone()
    }

    pub fn bind(&self) -> Option<BindState> {
        lock(&self.bind).clone()
    }
}

#[async_trait]
impl BindController for MockBindController {
    async fn current_bind(&self) -> Result<BindState, BindError> {
        lock(&self.bind).clone().ok_or(BindError::NotReady)
    }

    async fn rebind(&self, address: &NetworkAddress, port: u16) -> Result<(), BindError> {
        lock(&self.rebinds).push((address.ip_address, port));
        if let Some(reason) = lock(&self.fail_rebind).clone() {
            return Err(BindError::RebindFailed {
                address: address.ip_address.to_string(),
                port,
                reason,
            });
        }
        *lock(&self.bind) = Some(BindState::new(Some(address.clone()), port));
        Ok(())
    }
}

/// Port forwarder recording refresh requests
#[derive(Debug, Default)]
pub struct MockPortForwarder {
    refreshes: Mutex<Vec<(IpAddr, u16)>>,
    fail: Mutex<bool>,
}

impl MockPortForwarder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, fail: bool) {
        *lock(&self.fail) = fail;
    }

    pub fn refreshes(&self) -> Vec<(IpAddr, u16)> {
        lock(&self.refreshes).clone()
    }
}

#[async_trait]
impl PortForwarder for MockPortForwarder {
    async fn refresh_mapping(&self, address: IpAddr, port: u16) -> Result<(), BindError> {
        lock(&self.refreshes).push((address, port));
        if *lock(&self.fail) {
            return Err(BindError::PortMappingFailed {
                address: address.to_string(),
                port,
                reason: "mapping refused".to_string(),
            });
        }
        Ok(())
    }
}

/// Port-check service answering from a script
///
/// Scripted answers are consumed in order; once exhausted the default answer
/// repeats. An optional delay simulates a slow remote service.
#[derive(Debug)]
pub struct MockPortCheck {
    script: Mutex<VecDeque<Result<PortState, ProbeError>>>,
    default: Mutex<Result<PortState, ProbeError>>,
    delay: Mutex<Duration>,
    calls: AtomicUsize,
}

impl MockPortCheck {
    pub fn answering(state: PortState) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            default: Mutex::new(Ok(state)),
            delay: Mutex::new(Duration::ZERO),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn push(&self, answer: Result<PortState, ProbeError>) {
        lock(&self.script).push_back(answer);
    }

    pub fn set_default(&self, answer: Result<PortState, ProbeError>) {
        *lock(&self.default) = answer;
    }

    pub fn set_delay(&self, delay: Duration) {
        *lock(&self.delay) = delay;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PortCheckService for MockPortCheck {
    async fn check_external_port(&self, _port: u16) -> Result<PortState, ProbeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *lock(&self.delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let scripted = lock(&self.script).pop_front();
        scripted.unwrap_or_else(|| lock(&self.default).clone())
    }
}

/// A single listener callback, as recorded by [`RecordingListener`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenerEvent {
    AddressStatus(String),
    PortStatus(String),
    PortCheckStart,
}

/// Listener that records every callback
#[derive(Debug, Default)]
pub struct RecordingListener {
    events: Mutex<Vec<ListenerEvent>>,
}

impl RecordingListener {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<ListenerEvent> {
        lock(&self.events).clone()
    }

    /// Port status texts received, in order
    pub fn port_statuses(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                ListenerEvent::PortStatus(text) => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn port_check_starts(&self) -> usize {
        self.events()
            .iter()
            .filter(|event| matches!(event, ListenerEvent::PortCheckStart))
            .count()
    }
}

impl StatusListener for RecordingListener {
    fn protocol_addresses_status_changed(&self, text: &str) {
        lock(&self.events).push(ListenerEvent::AddressStatus(text.to_string()));
    }

    fn port_check_status_changed(&self, text: &str) {
        lock(&self.events).push(ListenerEvent::PortStatus(text.to_string()));
    }

    fn port_check_start(&self) {
        lock(&self.events).push(ListenerEvent::PortCheckStart);
    }
}
