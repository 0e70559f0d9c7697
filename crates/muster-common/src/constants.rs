//! Shared constants for Muster components.

/// Default cluster name (the arbitration namespace under /metadata)
pub const DEFAULT_CLUSTER_NAME: &str = "consul";

/// Default directory for the clustered agent binary and data
pub const DEFAULT_AGENT_DIR: &str = "/consul";

/// Default clustered agent binary name
pub const DEFAULT_AGENT_BINARY: &str = "consul";

/// Backoff while initializing the arbitration document (seconds)
pub const INIT_RETRY_SECS: u64 = 2;

/// Poll interval while registering this node's address (seconds)
pub const REGISTER_POLL_SECS: u64 = 1;

/// Poll interval while waiting for quorum (seconds)
pub const QUORUM_POLL_SECS: u64 = 1;

/// Poll interval while waiting for the cluster key (seconds)
pub const KEY_POLL_SECS: u64 = 1;

/// Backoff between agent download attempts (seconds)
pub const DOWNLOAD_RETRY_SECS: u64 = 5;

/// Supervisor liveness poll interval (seconds)
pub const SUPERVISOR_POLL_SECS: u64 = 2;

/// Poll interval while waiting for a local service to report running (seconds)
pub const SERVICE_READY_POLL_SECS: u64 = 2;

/// Managed process log size ceiling (1 MiB)
pub const DEFAULT_LOG_CEILING_BYTES: u64 = 1024 * 1024;

/// Cluster encryption key length after encoding
pub const CLUSTER_KEY_LEN: usize = 24;

/// Database credentials cap out at 31 characters
pub const DB_PASSWORD_MAX_LEN: usize = 31;

/// Arbitration endpoint path suffixes, relative to the cluster base URL
pub mod paths {
    /// Integer count of registered hosts: {base}/hosts.length
    pub const HOSTS_LENGTH: &str = "/hosts.length";

    /// Append one host: {base}/hosts
    pub const HOSTS: &str = "/hosts";

    /// The elector's address: {base}/hosts/0
    pub const FIRST_HOST: &str = "/hosts/0";

    /// Presence-checkable key listing: {base}.keys
    pub const KEYS: &str = ".keys";

    /// The published cluster secret: {base}/key
    pub const KEY: &str = "/key";
}
