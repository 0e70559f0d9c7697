//! Arbitration-service node provisioning.
//!
//! The node hosting the arbitration endpoint runs two independent supervision
//! loops: one keeping the service process alive, one re-asserting the admin
//! credential the cluster nodes authenticate with. They share no state and
//! tolerate each other's restarts.

use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::info;

use crate::cli::ArbiterArgs;
use crate::supervisor::{self, ProcessProbe, SupervisorSpec};

/// Arbitration-service node configuration
#[derive(Debug, Clone)]
pub struct ArbiterConfig {
    /// Admin account name
    pub user: String,
    /// Admin account password
    pub password: String,
    /// Service install directory (working directory for all commands)
    pub service_dir: PathBuf,
    /// Long-running arbitration service command
    pub service_command: Vec<String>,
    /// Command listing existing service users
    pub list_users_command: Vec<String>,
    /// Command creating the admin user
    pub add_user_command: Vec<String>,
    /// Supervisor log for the service process
    pub watcher_log: PathBuf,
}

impl ArbiterConfig {
    pub fn from_args(args: &ArbiterArgs) -> Self {
        let service_dir = PathBuf::from(&args.service_dir);
        Self {
            user: args.user.clone(),
            password: args.password.clone(),
            service_command: vec!["node".into(), "app.js".into()],
            list_users_command: vec!["node".into(), "utils/users.js".into(), "list-users".into()],
            add_user_command: vec![
                "node".into(),
                "utils/users.js".into(),
                "add-user".into(),
                args.user.clone(),
                args.password.clone(),
            ],
            watcher_log: PathBuf::from("/tmp/arbiter-watcher.log"),
            service_dir,
        }
    }

    /// Keep-alive loop for the arbitration service process
    pub fn service_spec(&self) -> SupervisorSpec {
        let mut spec = SupervisorSpec::new(
            self.service_command.clone(),
            Some(self.watcher_log.clone()),
            ProcessProbe::Pattern(self.service_command.join(" ")),
        );
        spec.work_dir = Some(self.service_dir.clone());
        spec
    }

    /// Credential re-assert loop: "alive" means the admin user exists, the
    /// restart action creates it. Quiet variant; the password must not land
    /// in a log file.
    pub fn credential_spec(&self) -> SupervisorSpec {
        let mut spec = SupervisorSpec::new(
            self.add_user_command.clone(),
            None,
            ProcessProbe::Check {
                command: self.list_users_command.clone(),
                needle: self.user.clone(),
            },
        );
        spec.work_dir = Some(self.service_dir.clone());
        spec
    }
}

/// Detach both supervision loops and keep the password recoverable for the
/// operator.
pub fn run(config: &ArbiterConfig) -> Result<()> {
    supervisor::spawn_detached(&config.service_spec())
        .context("Failed to detach service supervisor")?;
    supervisor::spawn_detached(&config.credential_spec())
        .context("Failed to detach credential supervisor")?;

    // Keep the password around just in case
    let password_file = config.service_dir.join("password");
    std::fs::write(&password_file, &config.password)
        .with_context(|| format!("Failed to write {}", password_file.display()))?;

    info!(user = %config.user, "Arbitration service node provisioned");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stub_config() -> ArbiterConfig {
        ArbiterConfig::from_args(&ArbiterArgs {
            user: "admin".into(),
            password: "s3cr3tS3cr3t".into(),
            service_dir: "/cloud-init-buddy".into(),
        })
    }

    #[test]
    fn test_service_spec_probes_service_command_line() {
        let spec = stub_config().service_spec();
        assert_eq!(spec.probe, ProcessProbe::Pattern("node app.js".into()));
        assert!(spec.log_path.is_some());
        assert_eq!(spec.work_dir, Some(PathBuf::from("/cloud-init-buddy")));
    }

    #[test]
    fn test_credential_spec_is_quiet_and_independent() {
        let config = stub_config();
        let spec = config.credential_spec();

        // Quiet variant: no log file to leak the password into
        assert!(spec.log_path.is_none());
        assert!(spec.command.contains(&"admin".to_string()));
        match &spec.probe {
            ProcessProbe::Check { needle, .. } => assert_eq!(needle, "admin"),
            other => panic!("unexpected probe {other:?}"),
        }

        // The two loops must not share state
        assert_ne!(spec, config.service_spec());
    }
}
