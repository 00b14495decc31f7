//! Status tracking and listener notification
//!
//! The hub is the only place the current [`StatusId`] changes. Listeners are
//! notified from a snapshot of the registry, so they may register or remove
//! listeners (themselves included) while being notified.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tracing::debug;

/// Port status classification
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StatusId {
    /// No check has completed yet
    #[default]
    Unknown,
    Ok,
    /// Ambiguous or unverifiable; may recover on its own
    Warn,
    /// Port confirmed closed
    Bad,
}

impl StatusId {
    /// Short indicator text for a view title, none while unknown
    pub fn indicator_text(self) -> Option<&'static str> {
        match self {
            StatusId::Unknown => None,
            StatusId::Ok => Some("OK"),
            StatusId::Warn => Some("Warn"),
            StatusId::Bad => Some("Bad"),
        }
    }

    /// Indicator colour as RGB, none while unknown
    pub fn indicator_rgb(self) -> Option<[u8; 3]> {
        match self {
            StatusId::Unknown => None,
            StatusId::Ok => Some([0, 80, 0]),
            StatusId::Warn => Some([255, 140, 0]),
            StatusId::Bad => Some([128, 30, 30]),
        }
    }
}

impl fmt::Display for StatusId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusId::Unknown => write!(f, "unknown"),
            StatusId::Ok => write!(f, "ok"),
            StatusId::Warn => write!(f, "warn"),
            StatusId::Bad => write!(f, "bad"),
        }
    }
}

/// Receives status change events
///
/// Callbacks run on the check task; they must not block for long.
pub trait StatusListener: Send + Sync {
    fn protocol_addresses_status_changed(&self, _text: &str) {}

    fn port_check_status_changed(&self, _text: &str) {}

    /// A probe is about to start
    fn port_check_start(&self) {}
}

/// Handle returned on registration, used to remove the listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Debug, Default)]
struct HubState {
    status: StatusId,
    port_text: Option<String>,
    address_text: Option<String>,
}

/// Holds the current status and fans out changes to listeners
#[derive(Default)]
pub struct StatusHub {
    state: Mutex<HubState>,
    listeners: Mutex<Vec<(ListenerId, Arc<dyn StatusListener>)>>,
    next_id: AtomicU64,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // Listener panics cannot leave the state half-written, so a poisoned
    // lock is still consistent.
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl StatusHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_listener(&self, listener: Arc<dyn StatusListener>) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        lock(&self.listeners).push((id, listener));
        id
    }

    /// Remove a listener; returns false if it was not registered
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = lock(&self.listeners);
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.listeners).len()
    }

    /// Latest status; `Unknown` until the first probe completes
    pub fn current_status_id(&self) -> StatusId {
        lock(&self.state).status
    }

    pub fn current_port_status_text(&self) -> Option<String> {
        lock(&self.state).port_text.clone()
    }

    pub fn current_address_status_text(&self) -> Option<String> {
        lock(&self.state).address_text.clone()
    }

    /// Record a probe outcome
    ///
    /// Listeners are notified only if the status or the text differs from
    /// the current one. Returns whether a notification was sent.
    pub fn set_port_check_status(&self, status: StatusId, text: &str) -> bool {
        {
            let mut state = lock(&self.state);
            if state.status == status && state.port_text.as_deref() == Some(text) {
                debug!(status = %status, "Port status unchanged");
                return false;
            }
            state.status = status;
            state.port_text = Some(text.to_string());
        }
        debug!(status = %status, text, "Port status changed");
        for listener in self.snapshot() {
            listener.port_check_status_changed(text);
        }
        true
    }

    /// Record address-resolution diagnostics, notifying only on change
    pub fn set_protocol_address_status(&self, text: &str) -> bool {
        {
            let mut state = lock(&self.state);
            if state.address_text.as_deref() == Some(text) {
                return false;
            }
            state.address_text = Some(text.to_string());
        }
        debug!(text, "Address status changed");
        for listener in self.snapshot() {
            listener.protocol_addresses_status_changed(text);
        }
        true
    }

    /// Tell listeners a probe is starting
    pub fn port_check_start(&self) {
        for listener in self.snapshot() {
            listener.port_check_start();
        }
    }

    fn snapshot(&self) -> Vec<Arc<dyn StatusListener>> {
        lock(&self.listeners)
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect()
    }
}

impl fmt::Debug for StatusHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatusHub")
            .field("state", &*lock(&self.state))
            .field("listeners", &self.listener_count())
            .finish()
    }
}
