//! Clustered agent artifact download.
//!
//! Right after machine boot the network is often not ready yet; every failure
//! here (DNS, connection, non-2xx) is the expected steady state and is
//! retried with a fixed backoff, never escalated.

use muster_common::{MusterError, PollIntervals};
use std::path::Path;
use tracing::{info, warn};

/// Archive name used for the in-place download
const ARCHIVE_NAME: &str = "agent.zip";

/// Make sure the agent binary exists under `dir`, downloading and extracting
/// the zip archive from `url` if it does not.
pub async fn ensure_agent(
    dir: &Path,
    binary: &str,
    url: &str,
    intervals: &PollIntervals,
) -> Result<(), MusterError> {
    if agent_installed(dir, binary).await {
        info!(binary, "Agent binary already present, skipping download");
        return Ok(());
    }

    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| MusterError::Artifact(format!("create {}: {e}", dir.display())))?;

    loop {
        match fetch_and_extract(dir, url).await {
            Ok(()) => {
                info!(url, dir = %dir.display(), "Agent binary installed");
                return Ok(());
            }
            Err(e) => {
                warn!(error = %e, "Agent download failed, backing off");
                tokio::time::sleep(intervals.download_retry).await;
            }
        }
    }
}

/// A binary that can be executed at all counts as installed; its exit status
/// is irrelevant.
async fn agent_installed(dir: &Path, binary: &str) -> bool {
    tokio::process::Command::new(dir.join(binary))
        .arg("-v")
        .output()
        .await
        .is_ok()
}

async fn fetch_and_extract(dir: &Path, url: &str) -> Result<(), MusterError> {
    let response = reqwest::get(url)
        .await
        .map_err(|e| MusterError::Artifact(format!("GET {url}: {e}")))?;

    if !response.status().is_success() {
        return Err(MusterError::Artifact(format!(
            "GET {url}: status {}",
            response.status()
        )));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| MusterError::Artifact(format!("GET {url}: {e}")))?;

    let archive = dir.join(ARCHIVE_NAME);
    tokio::fs::write(&archive, &bytes)
        .await
        .map_err(|e| MusterError::Artifact(format!("write {}: {e}", archive.display())))?;

    let status = tokio::process::Command::new("unzip")
        .arg("-o")
        .arg(ARCHIVE_NAME)
        .current_dir(dir)
        .output()
        .await
        .map_err(|e| MusterError::Artifact(format!("unzip: {e}")))?;

    if !status.status.success() {
        return Err(MusterError::Artifact(format!(
            "unzip exited with {}",
            status.status
        )));
    }

    tokio::fs::remove_file(&archive)
        .await
        .map_err(|e| MusterError::Artifact(format!("rm {}: {e}", archive.display())))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_binary_is_not_installed() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!agent_installed(dir.path(), "no-such-binary").await);
    }

    #[tokio::test]
    async fn test_runnable_binary_counts_as_installed() {
        // A binary that exits non-zero still counts; only spawn failure
        // means "not installed"
        assert!(agent_installed(Path::new("/bin"), "false").await);
    }
}
