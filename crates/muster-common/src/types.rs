//! Core types shared across Muster components.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::constants;

/// The single arbitration document for one cluster.
///
/// Lives behind the arbitration endpoint, keyed by cluster name. Created
/// lazily by the first node to observe it missing; never explicitly deleted
/// by this component (a concurrent reset is a tolerated external event).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClusterDocument {
    /// Self-reported node addresses in registration order.
    /// Index 0 determines elector eligibility.
    pub hosts: Vec<String>,

    /// The shared cluster secret, once the elector has published it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

impl ClusterDocument {
    /// A fresh document with no registrations, as posted by the initializer
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn contains_host(&self, address: &str) -> bool {
        self.hosts.iter().any(|h| h == address)
    }

    /// Append an address unless it is already registered
    pub fn register(&mut self, address: &str) {
        if !self.contains_host(address) {
            self.hosts.push(address.to_string());
        }
    }

    pub fn first_host(&self) -> Option<&str> {
        self.hosts.first().map(String::as_str)
    }
}

/// Everything a node needs to join the cluster, produced by the bootstrap
/// state machine when it reaches `Ready`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinParameters {
    /// This node's self-observed private address
    pub self_address: String,

    /// Address at index 0 of the host list (the retry-join target)
    pub elector_address: String,

    /// The shared cluster encryption key
    pub secret: String,

    /// Number of nodes expected before the cluster forms
    pub expected_nodes: u32,

    /// Whether this node generated and published the secret
    pub is_elector: bool,
}

/// Poll and backoff intervals for the coordination loops.
///
/// Defaults reproduce the production cadence; tests shrink these to run the
/// unbounded loops at full speed.
#[derive(Debug, Clone, Copy)]
pub struct PollIntervals {
    /// Backoff while initializing the arbitration document
    pub init_retry: Duration,
    /// Poll interval while verifying registration
    pub register_poll: Duration,
    /// Poll interval while waiting for quorum
    pub quorum_poll: Duration,
    /// Poll interval while waiting for the cluster key
    pub key_poll: Duration,
    /// Backoff between artifact download attempts
    pub download_retry: Duration,
    /// Poll interval while waiting for a local service to come up
    pub service_ready_poll: Duration,
}

impl Default for PollIntervals {
    fn default() -> Self {
        Self {
            init_retry: Duration::from_secs(constants::INIT_RETRY_SECS),
            register_poll: Duration::from_secs(constants::REGISTER_POLL_SECS),
            quorum_poll: Duration::from_secs(constants::QUORUM_POLL_SECS),
            key_poll: Duration::from_secs(constants::KEY_POLL_SECS),
            download_retry: Duration::from_secs(constants::DOWNLOAD_RETRY_SECS),
            service_ready_poll: Duration::from_secs(constants::SERVICE_READY_POLL_SECS),
        }
    }
}

impl PollIntervals {
    /// Millisecond-scale intervals for exercising the loops in tests
    pub fn fast() -> Self {
        let tick = Duration::from_millis(2);
        Self {
            init_retry: tick,
            register_poll: tick,
            quorum_poll: tick,
            key_poll: tick,
            download_retry: tick,
            service_ready_poll: tick,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_is_idempotent() {
        let mut doc = ClusterDocument::empty();
        doc.register("10.0.0.5");
        doc.register("10.0.0.5");
        doc.register("10.0.0.6");
        assert_eq!(doc.hosts, vec!["10.0.0.5", "10.0.0.6"]);
    }

    #[test]
    fn test_first_host_is_registration_order() {
        let mut doc = ClusterDocument::empty();
        assert_eq!(doc.first_host(), None);
        doc.register("10.0.0.7");
        doc.register("10.0.0.5");
        assert_eq!(doc.first_host(), Some("10.0.0.7"));
    }

    #[test]
    fn test_document_serialization_omits_absent_key() {
        let doc = ClusterDocument::empty();
        let json = serde_json::to_string(&doc).unwrap();
        assert_eq!(json, r#"{"hosts":[]}"#);

        let with_key = ClusterDocument {
            hosts: vec!["10.0.0.5".into()],
            key: Some("abc".into()),
        };
        let json = serde_json::to_string(&with_key).unwrap();
        assert!(json.contains(r#""key":"abc""#));
    }
}
