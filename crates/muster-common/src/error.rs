//! Common error types for Muster components.

use thiserror::Error;

/// Common errors across Muster components
#[derive(Debug, Error)]
pub enum MusterError {
    /// Missing or invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Arbitration endpoint transport failure or non-2xx response
    #[error("Arbitration error: {0}")]
    Arbitration(String),

    /// The OS entropy source could not be read
    #[error("Entropy source unavailable: {0}")]
    EntropyUnavailable(String),

    /// No candidate network interface yielded an address
    #[error("No usable network interface among candidates: {0}")]
    NoUsableInterface(String),

    /// Agent artifact download or extraction failure
    #[error("Artifact error: {0}")]
    Artifact(String),

    /// Process supervision error (spawn, probe, log handling)
    #[error("Supervisor error: {0}")]
    Supervisor(String),

    /// Replica designation flow error
    #[error("Replica error: {0}")]
    Replica(String),
}

impl MusterError {
    /// Returns true if this error should be retried in place.
    ///
    /// Transient arbitration and download failures are the expected steady
    /// state right after machine boot and are never escalated.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Arbitration(_) | Self::Artifact(_))
    }

    /// Returns true if this error must abort the node immediately.
    ///
    /// A node with no discoverable address or no entropy cannot coordinate.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::EntropyUnavailable(_) | Self::NoUsableInterface(_)
        )
    }
}
