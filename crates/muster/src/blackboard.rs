//! Arbitration blackboard transport.
//!
//! The arbitration endpoint is a single mutable JSON document per cluster,
//! reached over HTTPS with a self-signed certificate. Every operation here is
//! a single, non-retrying shot; the retry discipline lives in
//! [`crate::arbitration`]. The wire surface must stay bit-compatible with the
//! existing arbitration service:
//!
//! - `GET  {base}/hosts.length` - integer count of registered hosts
//! - `GET  {base}`              - `{"hosts": [...]}`, membership by containment
//! - `POST {base}` `{"hosts":[]}` - initialize
//! - `POST {base}/hosts` `"<addr>"` - append one host
//! - `GET  {base}/hosts/0`      - the elector's address, quoted
//! - `GET  {base}.keys`         - presence-checkable key listing
//! - `POST {base}` `{"key":"…"}` - publish the cluster secret
//! - `GET  {base}/key`          - the cluster secret, quoted

use muster_common::constants::paths;
use muster_common::{ClusterDocument, MusterError};

/// Single-shot operations against the arbitration document.
///
/// Injectable so tests can substitute an in-memory fake with controllable
/// race injection instead of a live HTTP service.
pub trait Blackboard {
    /// Number of registered hosts; transport failures are retryable errors
    fn hosts_len(&self) -> impl Future<Output = Result<i64, MusterError>>;

    /// The raw document body. Membership is checked by substring containment,
    /// matching the original protocol.
    fn document(&self) -> impl Future<Output = Result<String, MusterError>>;

    /// Write the empty document. Races across nodes are harmless: the create
    /// is last-write-wins for an empty list.
    fn initialize(&self) -> impl Future<Output = Result<(), MusterError>>;

    /// Append one host address. Callers check membership first; a duplicate
    /// append is an accepted hazard, not an error.
    fn append_host(&self, address: &str) -> impl Future<Output = Result<(), MusterError>>;

    /// Raw body of the first host entry (quotes preserved)
    fn first_host(&self) -> impl Future<Output = Result<String, MusterError>>;

    /// Raw body of the key listing; `"hosts"` / `"key"` presence is checked
    /// by containment
    fn keys(&self) -> impl Future<Output = Result<String, MusterError>>;

    /// Publish the cluster secret. Duplicate publishes are accepted no-ops.
    fn publish_key(&self, key: &str) -> impl Future<Output = Result<(), MusterError>>;

    /// The published cluster secret, quotes stripped
    fn fetch_key(&self) -> impl Future<Output = Result<String, MusterError>>;
}

/// HTTP implementation against the external arbitration service
pub struct HttpBlackboard {
    client: reqwest::Client,
    base: String,
}

impl HttpBlackboard {
    /// Build a client for `{endpoint}/metadata/{cluster}`.
    ///
    /// The arbitration service fronts itself with a self-signed certificate,
    /// so verification is disabled on this client.
    pub fn new(endpoint: &str, cluster: &str) -> Result<Self, MusterError> {
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|e| MusterError::Arbitration(e.to_string()))?;

        Ok(Self {
            client,
            base: format!("{}/metadata/{}", endpoint.trim_end_matches('/'), cluster),
        })
    }

    async fn get_text(&self, url: String) -> Result<String, MusterError> {
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| MusterError::Arbitration(format!("GET {url}: {e}")))?;

        if !response.status().is_success() {
            return Err(MusterError::Arbitration(format!(
                "GET {url}: status {}",
                response.status()
            )));
        }

        response
            .text()
            .await
            .map_err(|e| MusterError::Arbitration(format!("GET {url}: {e}")))
    }

    async fn post_body(&self, url: String, body: String) -> Result<(), MusterError> {
        let response = self
            .client
            .post(&url)
            .body(body)
            .send()
            .await
            .map_err(|e| MusterError::Arbitration(format!("POST {url}: {e}")))?;

        if !response.status().is_success() {
            return Err(MusterError::Arbitration(format!(
                "POST {url}: status {}",
                response.status()
            )));
        }

        Ok(())
    }
}

impl Blackboard for HttpBlackboard {
    async fn hosts_len(&self) -> Result<i64, MusterError> {
        let body = self.get_text(format!("{}{}", self.base, paths::HOSTS_LENGTH)).await?;
        // A garbled body reads as zero, same as the original client
        Ok(body.trim().parse().unwrap_or(0))
    }

    async fn document(&self) -> Result<String, MusterError> {
        self.get_text(self.base.clone()).await
    }

    async fn initialize(&self) -> Result<(), MusterError> {
        let payload = serde_json::to_string(&ClusterDocument::empty())
            .map_err(|e| MusterError::Arbitration(e.to_string()))?;
        self.post_body(self.base.clone(), payload).await
    }

    async fn append_host(&self, address: &str) -> Result<(), MusterError> {
        self.post_body(
            format!("{}{}", self.base, paths::HOSTS),
            format!("\"{address}\""),
        )
        .await
    }

    async fn first_host(&self) -> Result<String, MusterError> {
        self.get_text(format!("{}{}", self.base, paths::FIRST_HOST)).await
    }

    async fn keys(&self) -> Result<String, MusterError> {
        self.get_text(format!("{}{}", self.base, paths::KEYS)).await
    }

    async fn publish_key(&self, key: &str) -> Result<(), MusterError> {
        let payload = serde_json::json!({ "key": key }).to_string();
        self.post_body(self.base.clone(), payload).await
    }

    async fn fetch_key(&self) -> Result<String, MusterError> {
        let body = self.get_text(format!("{}{}", self.base, paths::KEY)).await?;
        Ok(body.trim().trim_matches('"').to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_construction() {
        let board = HttpBlackboard::new("https://admin:pw@10.0.0.2:8443/", "consul").unwrap();
        assert_eq!(board.base, "https://admin:pw@10.0.0.2:8443/metadata/consul");
    }
}
