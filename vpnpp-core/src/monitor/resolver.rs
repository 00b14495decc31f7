//! VPN address resolution
//!
//! Scans the host's network interfaces for the first address whose textual
//! form matches the configured pattern. Nothing is cached between calls so
//! tunnels coming and going are picked up on the next cycle.

use std::fmt;
use std::net::IpAddr;

use regex::Regex;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::ResolveError;

/// An address bound to one host interface
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkAddress {
    /// Interface name (e.g., "tun0", "wg0")
    pub interface_name: String,
    pub ip_address: IpAddr,
    pub is_loopback: bool,
}

impl NetworkAddress {
    pub fn new(interface_name: impl Into<String>, ip_address: IpAddr) -> Self {
        Self {
            interface_name: interface_name.into(),
            ip_address,
            is_loopback: ip_address.is_loopback(),
        }
    }

    /// Link-local only addresses (169.254/16, fe80::/10) are not routable
    pub fn is_link_local(&self) -> bool {
        match self.ip_address {
            IpAddr::V4(v4) => v4.is_link_local(),
            IpAddr::V6(v6) => (v6.segments()[0] & 0xffc0) == 0xfe80,
        }
    }
}

impl fmt::Display for NetworkAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.ip_address, self.interface_name)
    }
}

/// Lists the host's interfaces and their bound addresses
pub trait InterfaceEnumerator: Send + Sync {
    fn addresses(&self) -> Result<Vec<NetworkAddress>, ResolveError>;
}

/// Enumerates interfaces through the operating system
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemInterfaces;

impl InterfaceEnumerator for SystemInterfaces {
    fn addresses(&self) -> Result<Vec<NetworkAddress>, ResolveError> {
        let interfaces = if_addrs::get_if_addrs().map_err(|e| ResolveError::EnumerationFailed {
            reason: e.to_string(),
        })?;

        Ok(interfaces
            .into_iter()
            .map(|iface| NetworkAddress {
                is_loopback: iface.is_loopback(),
                ip_address: iface.ip(),
                interface_name: iface.name,
            })
            .collect())
    }
}

/// Find the current VPN address
///
/// Ordinary addresses are tried first, in enumeration order; loopback and
/// link-local addresses are only returned when nothing else matches.
/// Enumeration failures are logged and treated as "no VPN address".
pub fn resolve_vpn_address(
    enumerator: &dyn InterfaceEnumerator,
    pattern: &Regex,
) -> Option<NetworkAddress> {
    let addresses = match enumerator.addresses() {
        Ok(addresses) => addresses,
        Err(e) => {
            warn!(error = %e, "Interface enumeration failed, continuing without a VPN address");
            return None;
        }
    };

    let (ordinary, local): (Vec<_>, Vec<_>) = addresses
        .into_iter()
        .partition(|address| !address.is_loopback && !address.is_link_local());

    let found = ordinary
        .into_iter()
        .chain(local)
        .find(|address| pattern.is_match(&address.ip_address.to_string()));

    match found {
        Some(ref address) => debug!(address = %address, "Resolved VPN address"),
        None => debug!(pattern = %pattern, "No interface address matches the VPN pattern"),
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loopback_detected_from_address() {
        let lo = NetworkAddress::new("lo", "127.0.0.1".parse().unwrap());
        assert!(lo.is_loopback);
        let tun = NetworkAddress::new("tun0", "10.8.0.5".parse().unwrap());
        assert!(!tun.is_loopback);
    }

    #[test]
    fn test_link_local_detection() {
        assert!(NetworkAddress::new("eth0", "169.254.3.4".parse().unwrap()).is_link_local());
        assert!(NetworkAddress::new("eth0", "fe80::1".parse().unwrap()).is_link_local());
        assert!(!NetworkAddress::new("eth0", "2001:db8::1".parse().unwrap()).is_link_local());
        assert!(!NetworkAddress::new("eth0", "10.0.0.1".parse().unwrap()).is_link_local());
    }

    #[test]
    fn test_display() {
        let tun = NetworkAddress::new("tun0", "10.8.0.5".parse().unwrap());
        assert_eq!(tun.to_string(), "10.8.0.5 (tun0)");
    }
}
