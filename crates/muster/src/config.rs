//! Configuration management for Muster.
//!
//! The binary is invoked as a boot-time payload, so every parameter can come
//! from the environment; an optional config file provides the same fields for
//! non-cloud-init deployments.

use anyhow::{Context, Result, bail};
use muster_common::PollIntervals;
use muster_common::constants::{DEFAULT_AGENT_BINARY, DEFAULT_AGENT_DIR, DEFAULT_CLUSTER_NAME};
use serde::Deserialize;
use std::path::Path;

use crate::cli::BootstrapArgs;

/// Bootstrap flow configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BootstrapConfig {
    /// Arbitration endpoint base URL, credentials included
    #[serde(default)]
    pub endpoint: String,

    /// Cluster name, scoping the arbitration namespace
    #[serde(default = "default_cluster_name")]
    pub cluster_name: String,

    /// Number of nodes expected before the cluster forms
    #[serde(default)]
    pub node_count: u32,

    /// Where to fetch the clustered agent zip archive
    #[serde(default)]
    pub download_url: String,

    /// Directory holding the agent binary and its data
    #[serde(default = "default_agent_dir")]
    pub agent_dir: String,

    /// Agent binary name inside `agent_dir`
    #[serde(default = "default_agent_binary")]
    pub agent_binary: String,

    /// Poll cadence for the coordination loops
    #[serde(skip, default)]
    pub intervals: PollIntervals,
}

// Default value functions
fn default_cluster_name() -> String {
    DEFAULT_CLUSTER_NAME.to_string()
}
fn default_agent_dir() -> String {
    DEFAULT_AGENT_DIR.to_string()
}
fn default_agent_binary() -> String {
    DEFAULT_AGENT_BINARY.to_string()
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            cluster_name: default_cluster_name(),
            node_count: 0,
            download_url: String::new(),
            agent_dir: default_agent_dir(),
            agent_binary: default_agent_binary(),
            intervals: PollIntervals::default(),
        }
    }
}

impl BootstrapConfig {
    /// Load configuration from file, with environment/CLI overrides
    pub fn load(config_path: &str, args: &BootstrapArgs) -> Result<Self> {
        let mut config = if Path::new(config_path).exists() {
            let settings = config::Config::builder()
                .add_source(config::File::with_name(config_path))
                .build()
                .context("Failed to load config file")?;

            settings
                .try_deserialize()
                .context("Failed to parse config")?
        } else {
            Self::default()
        };

        // Apply environment/CLI overrides
        if let Some(ref endpoint) = args.endpoint {
            config.endpoint = endpoint.clone();
        }
        if let Some(ref cluster) = args.cluster_name {
            config.cluster_name = cluster.clone();
        }
        if let Some(count) = args.node_count {
            config.node_count = count;
        }
        if let Some(ref url) = args.download_url {
            config.download_url = url.clone();
        }
        if let Some(ref dir) = args.agent_dir {
            config.agent_dir = dir.clone();
        }
        if let Some(ref binary) = args.agent_binary {
            config.agent_binary = binary.clone();
        }

        config.validate()?;
        Ok(config)
    }

    /// Missing required configuration is fatal, never retried
    fn validate(&self) -> Result<()> {
        if self.endpoint.is_empty() {
            bail!("ENDPOINT is required");
        }
        if self.node_count == 0 {
            bail!("NODE_COUNT must be at least 1");
        }
        if self.download_url.is_empty() {
            bail!("AGENT_DOWNLOAD_URL is required");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_args() -> BootstrapArgs {
        BootstrapArgs {
            endpoint: Some("https://admin:pw@10.0.0.2:8443".into()),
            cluster_name: None,
            node_count: Some(3),
            download_url: Some("https://example.com/agent.zip".into()),
            agent_dir: None,
            agent_binary: None,
        }
    }

    #[test]
    fn test_args_override_defaults() {
        let config = BootstrapConfig::load("does-not-exist.toml", &full_args()).unwrap();
        assert_eq!(config.endpoint, "https://admin:pw@10.0.0.2:8443");
        assert_eq!(config.node_count, 3);
        assert_eq!(config.cluster_name, "consul");
        assert_eq!(config.agent_dir, "/consul");
    }

    #[test]
    fn test_missing_required_configuration_is_fatal() {
        let mut args = full_args();
        args.endpoint = None;
        assert!(BootstrapConfig::load("does-not-exist.toml", &args).is_err());

        let mut args = full_args();
        args.node_count = Some(0);
        assert!(BootstrapConfig::load("does-not-exist.toml", &args).is_err());
    }
}
