//! The per-node bootstrap state machine and orchestrator.
//!
//! `Start -> DownloadBinary -> RegisterAndAwaitQuorum -> ElectKeyOrAwaitKey
//! -> Ready`. No state is revisited once left, except the implicit
//! re-registration inside the quorum wait. There is no rollback: a node that
//! cannot progress never reaches `Ready` and the clustered agent is simply
//! never launched.

use anyhow::{Context, Result};
use muster_common::JoinParameters;
use muster_common::constants::CLUSTER_KEY_LEN;
use std::path::Path;
use tracing::info;

use crate::arbitration::ArbitrationClient;
use crate::artifact;
use crate::blackboard::{Blackboard, HttpBlackboard};
use crate::config::BootstrapConfig;
use crate::identity;
use crate::secret::generate_secret;
use crate::supervisor::{self, ProcessProbe, SupervisorSpec};

/// Drive the coordination protocol from "isolated" to "cluster-ready".
///
/// Exactly one node — whichever address sits at index 0 of the host list —
/// generates and publishes the cluster secret; everyone else polls for it.
/// All nodes leave this function holding the same key and the same
/// retry-join target.
pub async fn coordinate<B: Blackboard>(
    client: &ArbitrationClient<B>,
    self_address: &str,
    expected: u32,
) -> Result<JoinParameters, muster_common::MusterError> {
    client.ensure_initialized().await?;
    client.register_self(self_address).await?;
    client.await_quorum(self_address, expected).await?;

    let is_elector = client.is_elector(self_address).await;
    if is_elector {
        info!("This node registered first, generating the cluster key");
        let key = generate_secret(CLUSTER_KEY_LEN)?;
        client.publish_key(&key).await?;
    }

    let secret = client.await_key().await?;
    let elector_address = client.elector_address().await?;

    info!(
        elector = %elector_address,
        is_elector,
        "Cluster ready to form"
    );

    Ok(JoinParameters {
        self_address: self_address.to_string(),
        elector_address,
        secret,
        expected_nodes: expected,
        is_elector,
    })
}

/// Assemble the clustered agent command line from the join parameters.
///
/// In a production environment these settings would go in a file to avoid
/// leaking the encryption key through the process table.
pub fn agent_command(params: &JoinParameters, config: &BootstrapConfig) -> Vec<String> {
    let binary = Path::new(&config.agent_dir)
        .join(&config.agent_binary)
        .display()
        .to_string();
    vec![
        binary,
        "agent".into(),
        "-ui".into(),
        "-syslog".into(),
        "-server".into(),
        "-bootstrap-expect".into(),
        params.expected_nodes.to_string(),
        "-data-dir".into(),
        config.agent_dir.clone(),
        "-bind".into(),
        params.self_address.clone(),
        "-advertise".into(),
        params.self_address.clone(),
        "-encrypt".into(),
        params.secret.clone(),
        "-retry-join".into(),
        params.elector_address.clone(),
    ]
}

/// Hand the join parameters to the process supervisor, which owns the agent
/// for the rest of the node's lifetime.
pub fn launch_agent(params: &JoinParameters, config: &BootstrapConfig) -> Result<()> {
    let log_path = Path::new(&config.agent_dir).join("output.log");
    let probe = ProcessProbe::Pattern(format!("{} agent", config.agent_binary));
    let spec = SupervisorSpec::new(agent_command(params, config), Some(log_path), probe);

    supervisor::spawn_detached(&spec).context("Failed to detach agent supervisor")?;
    info!("Agent handed off to supervisor");
    Ok(())
}

/// The full boot-time flow for a cluster node. Exits 0 on handoff.
pub async fn run(config: BootstrapConfig) -> Result<()> {
    let self_address = identity::resolve_self_address()?;
    info!(address = %self_address, "Bootstrap starting");

    artifact::ensure_agent(
        Path::new(&config.agent_dir),
        &config.agent_binary,
        &config.download_url,
        &config.intervals,
    )
    .await?;

    let board = HttpBlackboard::new(&config.endpoint, &config.cluster_name)?;
    let client = ArbitrationClient::new(board, config.intervals);
    let params = coordinate(&client, &self_address, config.node_count).await?;

    launch_agent(&params, &config)
}
