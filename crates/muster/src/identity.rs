//! Node identity resolution.
//!
//! Every cloud provider names the primary private interface differently, so
//! the node's own address is found by probing a small ordered list of
//! plausible interface names and taking the first one that carries an IPv4
//! address.

use muster_common::MusterError;
use std::net::IpAddr;
use sysinfo::Networks;

/// Interface name candidates in probe order: eth0, ens0, eth1, ens1, ...
fn candidate_interfaces() -> Vec<String> {
    (0..=5)
        .flat_map(|i| [format!("eth{i}"), format!("ens{i}")])
        .collect()
}

/// Resolve this node's private address from local network interfaces.
///
/// Fatal if no candidate matches: a node with no discoverable address cannot
/// coordinate, so this is surfaced to the operator rather than retried.
pub fn resolve_self_address() -> Result<String, MusterError> {
    let networks = Networks::new_with_refreshed_list();
    resolve_from(&networks)
}

fn resolve_from(networks: &Networks) -> Result<String, MusterError> {
    for candidate in candidate_interfaces() {
        let Some(data) = networks.list().get(candidate.as_str()) else {
            continue;
        };
        let addr = data
            .ip_networks()
            .iter()
            .map(|net| net.addr)
            .find(|addr| matches!(addr, IpAddr::V4(_)));
        if let Some(addr) = addr {
            tracing::info!(interface = %candidate, address = %addr, "Resolved self address");
            return Ok(addr.to_string());
        }
    }

    Err(MusterError::NoUsableInterface(
        candidate_interfaces().join(", "),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_order_is_provider_agnostic() {
        let candidates = candidate_interfaces();
        assert_eq!(candidates[0], "eth0");
        assert_eq!(candidates[1], "ens0");
        assert_eq!(candidates[10], "eth5");
        assert_eq!(candidates[11], "ens5");
        assert_eq!(candidates.len(), 12);
    }

    #[test]
    fn test_empty_interface_list_is_fatal() {
        let networks = Networks::new();
        let err = resolve_from(&networks).unwrap_err();
        assert!(err.is_fatal());
        assert!(matches!(err, MusterError::NoUsableInterface(_)));
    }
}
