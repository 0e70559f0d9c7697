//! Primary/replica designation flow.
//!
//! The structurally simpler sibling of the bootstrap protocol: membership is
//! known in advance, so there is no blackboard and no election. A fixed
//! external designation (ordinal identity plus a replica flag) decides
//! whether this node configures itself as the primary or as a replica
//! pointed at a statically supplied primary address. This module never
//! touches the arbitration endpoint.

use anyhow::{Context, Result};
use muster_common::constants::SERVICE_READY_POLL_SECS;
use std::fs::File;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::Duration;
use tracing::{debug, info};

use crate::cli::ReplicaArgs;

/// File receiving the replica status output for operator inspection
const REPLICA_STATUS_FILE: &str = "replica-status";

/// Replica flow configuration.
///
/// The service commands are injectable so tests can run the flow without a
/// database installed.
#[derive(Debug, Clone)]
pub struct ReplicaConfig {
    pub replication_user: String,
    pub replication_password: String,
    pub is_replica: bool,
    pub master_host: String,
    pub server_id: u32,

    /// Where rendered SQL scripts and the status file land
    pub work_dir: PathBuf,
    /// Command applying a SQL script fed on stdin
    pub sql_command: Vec<String>,
    /// Command whose output contains "running" once the service is up
    pub status_command: Vec<String>,
    /// Poll interval for the readiness wait
    pub poll: Duration,
}

impl ReplicaConfig {
    pub fn from_args(args: &ReplicaArgs) -> Self {
        Self {
            replication_user: args.replication_user.clone(),
            replication_password: args.replication_password.clone(),
            is_replica: is_replica_designated(&args.is_replica),
            master_host: args.master_host.clone(),
            server_id: args.server_id,
            work_dir: PathBuf::from("."),
            sql_command: vec!["mysql".into(), "-f".into()],
            status_command: vec!["service".into(), "mysql".into(), "status".into()],
            poll: Duration::from_secs(SERVICE_READY_POLL_SECS),
        }
    }
}

/// The designation flag is the literal string "1", whitespace tolerated
pub fn is_replica_designated(flag: &str) -> bool {
    flag.trim() == "1"
}

/// Replication account and GTID configuration applied on every node
pub fn server_configuration(config: &ReplicaConfig) -> String {
    format!(
        "CREATE USER '{user}'@'%' IDENTIFIED BY '{password}';\n\
         GRANT REPLICATION SLAVE ON *.* TO '{user}'@'%';\n\
         FLUSH TABLES WITH READ LOCK;\n\
         SET PERSIST server_id={server_id};\n\
         SET PERSIST_ONLY gtid_mode=ON;\n\
         SET PERSIST_ONLY enforce_gtid_consistency=true;\n\
         RESTART;\n",
        user = config.replication_user,
        password = config.replication_password,
        server_id = config.server_id,
    )
}

/// Replica-only configuration pointing this node at the primary
pub fn replica_configuration(config: &ReplicaConfig) -> String {
    format!(
        "STOP SLAVE;\n\
         CHANGE MASTER TO\n\
         \x20 MASTER_HOST='{master}',\n\
         \x20 MASTER_USER='{user}',\n\
         \x20 MASTER_PASSWORD='{password}',\n\
         \x20 MASTER_AUTO_POSITION=1;\n\
         START SLAVE;\n\
         SHOW SLAVE STATUS;\n",
        master = config.master_host,
        user = config.replication_user,
        password = config.replication_password,
    )
}

/// Write a rendered script into the work dir and feed it to the SQL command,
/// optionally capturing stdout to `capture`
fn apply_sql(config: &ReplicaConfig, name: &str, sql: &str, capture: Option<&str>) -> Result<()> {
    let script_path = config.work_dir.join(name);
    std::fs::write(&script_path, sql)
        .with_context(|| format!("Failed to write {}", script_path.display()))?;

    let (program, args) = config
        .sql_command
        .split_first()
        .context("Empty SQL command")?;

    let stdin = File::open(&script_path)
        .with_context(|| format!("Failed to reopen {}", script_path.display()))?;
    let stdout = match capture {
        Some(file) => Stdio::from(
            File::create(config.work_dir.join(file)).context("Failed to create capture file")?,
        ),
        None => Stdio::null(),
    };

    let status = Command::new(program)
        .args(args)
        .stdin(Stdio::from(stdin))
        .stdout(stdout)
        .status()
        .with_context(|| format!("Failed to run {program}"))?;

    debug!(script = name, code = ?status.code(), "Applied SQL script");
    Ok(())
}

/// Poll the local service status command until it reports running.
/// Unbounded, like every other wait in this component.
fn await_service_running(config: &ReplicaConfig) {
    let (program, args) = match config.status_command.split_first() {
        Some(split) => split,
        None => return,
    };

    loop {
        let running = Command::new(program)
            .args(args)
            .output()
            .map(|out| String::from_utf8_lossy(&out.stdout).contains("running"))
            .unwrap_or(false);
        if running {
            info!("Database service is running");
            return;
        }
        debug!("Waiting for database service");
        std::thread::sleep(config.poll);
    }
}

/// The whole designation flow. Returns to the caller once done; nothing is
/// daemonized here.
pub fn run(config: &ReplicaConfig) -> Result<()> {
    info!(
        server_id = config.server_id,
        is_replica = config.is_replica,
        "Configuring replication"
    );

    apply_sql(
        config,
        "configuration.sql",
        &server_configuration(config),
        None,
    )?;
    await_service_running(config);

    // The primary is done once the service is confirmed up
    if !config.is_replica {
        info!("Primary designation, no replica configuration needed");
        return Ok(());
    }

    apply_sql(
        config,
        "replica-config.sql",
        &replica_configuration(config),
        Some(REPLICA_STATUS_FILE),
    )?;
    info!(master = %config.master_host, "Replica configured against primary");
    Ok(())
}
