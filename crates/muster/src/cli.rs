//! Command line surface.
//!
//! Muster runs as a boot-time payload, so every parameter is also readable
//! from the environment. The `supervise` subcommand is the hidden re-exec
//! target for detached supervision loops.

use clap::{Args, Parser, Subcommand};
use muster_common::MusterError;
use muster_common::constants::{DEFAULT_LOG_CEILING_BYTES, SUPERVISOR_POLL_SECS};
use std::path::PathBuf;
use std::time::Duration;

use crate::supervisor::{ProcessProbe, SupervisorSpec};

/// Muster - cluster bootstrap coordinator
#[derive(Parser, Debug)]
#[command(name = "muster")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config/muster.toml")]
    pub config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "LOG_LEVEL")]
    pub log_level: String,

    /// Enable JSON logging output
    #[arg(long, default_value = "false")]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Join or form a cluster through the arbitration endpoint, then launch
    /// the clustered agent under supervision
    Bootstrap(BootstrapArgs),

    /// Configure a statically designated database primary or replica
    Replica(ReplicaArgs),

    /// Provision the node hosting the arbitration service itself
    Arbiter(ArbiterArgs),

    /// Internal: run one detached supervision loop
    #[command(hide = true)]
    Supervise(SuperviseArgs),
}

/// Parameters for the cluster bootstrap flow
#[derive(Args, Debug)]
pub struct BootstrapArgs {
    /// Arbitration endpoint base URL (credentials included)
    #[arg(long, env = "ENDPOINT")]
    pub endpoint: Option<String>,

    /// Cluster name scoping the arbitration namespace
    #[arg(long, env = "CLUSTER_NAME")]
    pub cluster_name: Option<String>,

    /// Expected number of cluster nodes
    #[arg(long, env = "NODE_COUNT")]
    pub node_count: Option<u32>,

    /// URL of the clustered agent zip archive
    #[arg(long, env = "AGENT_DOWNLOAD_URL")]
    pub download_url: Option<String>,

    /// Directory for the agent binary and data
    #[arg(long, env = "AGENT_DIR")]
    pub agent_dir: Option<String>,

    /// Agent binary name
    #[arg(long, env = "AGENT_BINARY")]
    pub agent_binary: Option<String>,
}

/// Parameters for the primary/replica designation flow.
/// All of them are required; membership is known in advance here and there
/// is no arbitration involvement at all.
#[derive(Args, Debug)]
pub struct ReplicaArgs {
    /// Replication account name
    #[arg(long, env = "REPLICATION_USER")]
    pub replication_user: String,

    /// Replication account password
    #[arg(long, env = "REPLICATION_PASSWORD")]
    pub replication_password: String,

    /// "1" designates this node as a replica
    #[arg(long, env = "IS_REPLICA")]
    pub is_replica: String,

    /// Address of the primary this replica points at
    #[arg(long, env = "MASTER_HOST")]
    pub master_host: String,

    /// This node's ordinal identity
    #[arg(long, env = "SERVER_ID")]
    pub server_id: u32,
}

/// Parameters for the arbitration-service node
#[derive(Args, Debug)]
pub struct ArbiterArgs {
    /// Admin account asserted on the arbitration service
    #[arg(long, env = "ARBITER_USER")]
    pub user: String,

    /// Admin account password
    #[arg(long, env = "ARBITER_PASSWORD")]
    pub password: String,

    /// Install directory of the arbitration service
    #[arg(long, env = "ARBITER_DIR", default_value = "/cloud-init-buddy")]
    pub service_dir: String,
}

/// Internal flags mirrored by [`SupervisorSpec::to_args`]
#[derive(Args, Debug)]
pub struct SuperviseArgs {
    /// Managed process log file; omitted for the quiet variant
    #[arg(long)]
    pub log_path: Option<PathBuf>,

    /// Truncate the log above this many bytes
    #[arg(long, default_value_t = DEFAULT_LOG_CEILING_BYTES)]
    pub log_ceiling: u64,

    /// Loop interval in milliseconds
    #[arg(long, default_value_t = SUPERVISOR_POLL_SECS * 1000)]
    pub interval_ms: u64,

    /// Working directory for the managed command
    #[arg(long)]
    pub work_dir: Option<PathBuf>,

    /// Liveness: a process command line containing this pattern
    #[arg(long)]
    pub probe_pattern: Option<String>,

    /// Liveness: a probe command, one argument per occurrence
    #[arg(long, allow_hyphen_values = true)]
    pub probe_check: Vec<String>,

    /// Needle expected in the probe command's output
    #[arg(long)]
    pub probe_needle: Option<String>,

    /// The managed command line
    #[arg(last = true, required = true)]
    pub command: Vec<String>,
}

impl SuperviseArgs {
    /// Rebuild the supervisor spec these flags were serialized from
    pub fn into_spec(self) -> Result<SupervisorSpec, MusterError> {
        let probe = match (self.probe_pattern, self.probe_needle) {
            (Some(pattern), None) if self.probe_check.is_empty() => {
                ProcessProbe::Pattern(pattern)
            }
            (None, Some(needle)) if !self.probe_check.is_empty() => ProcessProbe::Check {
                command: self.probe_check,
                needle,
            },
            _ => {
                return Err(MusterError::Supervisor(
                    "exactly one of --probe-pattern or --probe-check/--probe-needle required"
                        .into(),
                ));
            }
        };

        Ok(SupervisorSpec {
            command: self.command,
            log_path: self.log_path,
            log_ceiling_bytes: self.log_ceiling,
            probe,
            interval: Duration::from_millis(self.interval_ms),
            work_dir: self.work_dir,
        })
    }
}
