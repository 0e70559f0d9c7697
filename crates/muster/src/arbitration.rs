//! Arbitration client: the retry discipline over the blackboard.
//!
//! Nothing here is transactional. Correctness comes from every node
//! re-checking and re-registering on every loop iteration, not from any
//! single write being atomic: all operations are idempotent, all failures
//! are retried in place with a fixed backoff, and every wait is intentionally
//! unbounded. A node that cannot make progress polls forever; that
//! silent-hang is an accepted design tradeoff, not a bug.

use muster_common::{MusterError, PollIntervals};
use tracing::{debug, info, warn};

use crate::blackboard::Blackboard;

/// Typed coordination operations against one cluster's arbitration document
pub struct ArbitrationClient<B: Blackboard> {
    board: B,
    intervals: PollIntervals,
}

impl<B: Blackboard> ArbitrationClient<B> {
    pub fn new(board: B, intervals: PollIntervals) -> Self {
        Self { board, intervals }
    }

    /// Create the hosts document if no node has yet.
    ///
    /// This call races across all nodes and only one write needs to succeed;
    /// duplicate initialization attempts are harmless. Loops until a read
    /// confirms the hosts list exists.
    pub async fn ensure_initialized(&self) -> Result<(), MusterError> {
        let existing = self.board.hosts_len().await.unwrap_or(0);
        if existing > 0 {
            debug!(hosts = existing, "Arbitration document already initialized");
            return Ok(());
        }

        if let Err(e) = self.board.initialize().await {
            warn!(error = %e, "Initial document write failed, will verify and retry");
        }

        // Verify the root object actually exists before moving on
        loop {
            match self.board.keys().await {
                Ok(keys) if keys.contains("hosts") => {
                    info!("Arbitration document initialized");
                    return Ok(());
                }
                Ok(keys) => debug!(keys = %keys, "Hosts list not visible yet"),
                Err(e) => warn!(error = %e, "Arbitration endpoint not reachable yet"),
            }
            tokio::time::sleep(self.intervals.init_retry).await;
            if let Err(e) = self.board.initialize().await {
                warn!(error = %e, "Re-initialization attempt failed");
            }
        }
    }

    /// Register this node's address, looping until a read shows it present.
    ///
    /// The read-then-write is not atomic and a concurrent reset by another
    /// node can erase a prior registration, so the write is never trusted;
    /// only a subsequent read ends the loop.
    pub async fn register_self(&self, address: &str) -> Result<(), MusterError> {
        loop {
            match self.board.document().await {
                Ok(doc) if doc.contains(address) => {
                    debug!(address, "Registration verified");
                    return Ok(());
                }
                Ok(_) => {
                    info!(address, "Registering self with arbitration endpoint");
                    if let Err(e) = self.board.append_host(address).await {
                        warn!(error = %e, "Host registration failed");
                    }
                }
                Err(e) => warn!(error = %e, "Could not read host list"),
            }
            tokio::time::sleep(self.intervals.register_poll).await;
        }
    }

    /// Wait until at least `expected` hosts are registered.
    ///
    /// Re-registers on every iteration: another node may have reset the
    /// document mid-run, and the only defense is to keep re-asserting our
    /// own entry. Never returns below quorum.
    pub async fn await_quorum(&self, address: &str, expected: u32) -> Result<(), MusterError> {
        loop {
            match self.board.hosts_len().await {
                Ok(count) if count >= i64::from(expected) => {
                    info!(count, expected, "Quorum reached");
                    return Ok(());
                }
                Ok(count) => debug!(count, expected, "Waiting for quorum"),
                Err(e) => warn!(error = %e, "Quorum poll failed"),
            }

            // Self-healing against a concurrent reset
            match self.board.document().await {
                Ok(doc) if !doc.contains(address) => {
                    warn!(address, "Own registration missing, re-registering");
                    if let Err(e) = self.board.append_host(address).await {
                        warn!(error = %e, "Re-registration failed");
                    }
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, "Could not verify own registration"),
            }

            tokio::time::sleep(self.intervals.quorum_poll).await;
        }
    }

    /// Whether this node sits at index 0 of the host list.
    ///
    /// Leader election by array-index convention: whoever registered first
    /// generates the key. No voting round; the host list is the only shared
    /// mutable state and every node can read it.
    pub async fn is_elector(&self, address: &str) -> bool {
        match self.board.first_host().await {
            Ok(first) => first.contains(address),
            Err(e) => {
                warn!(error = %e, "Could not read elector entry");
                false
            }
        }
    }

    /// Publish the cluster secret, retrying transport failures in place:
    /// the elector is the only node holding the key, so an escalated publish
    /// would strand every other node in its key wait. A re-running elector
    /// publishing twice is an accepted no-op hazard, not specially guarded.
    pub async fn publish_key(&self, key: &str) -> Result<(), MusterError> {
        loop {
            match self.board.publish_key(key).await {
                Ok(()) => return Ok(()),
                Err(e) => warn!(error = %e, "Key publish failed"),
            }
            tokio::time::sleep(self.intervals.key_poll).await;
        }
    }

    /// Poll until the key field is present, then fetch it.
    pub async fn await_key(&self) -> Result<String, MusterError> {
        loop {
            match self.board.keys().await {
                Ok(keys) if keys.contains("key") => break,
                Ok(_) => info!("Waiting for cluster key to be published"),
                Err(e) => warn!(error = %e, "Key poll failed"),
            }
            tokio::time::sleep(self.intervals.key_poll).await;
        }

        loop {
            match self.board.fetch_key().await {
                Ok(key) => return Ok(key),
                Err(e) => warn!(error = %e, "Key fetch failed"),
            }
            tokio::time::sleep(self.intervals.key_poll).await;
        }
    }

    /// The address at index 0 of the host list, quotes stripped.
    /// Retries transport failures in place like every other read.
    pub async fn elector_address(&self) -> Result<String, MusterError> {
        loop {
            match self.board.first_host().await {
                Ok(body) => return Ok(body.trim().trim_matches('"').to_string()),
                Err(e) => warn!(error = %e, "Elector address fetch failed"),
            }
            tokio::time::sleep(self.intervals.key_poll).await;
        }
    }

    pub fn intervals(&self) -> &PollIntervals {
        &self.intervals
    }

    pub fn board(&self) -> &B {
        &self.board
    }
}
