//! Protocol properties of the bootstrap coordination, run against an
//! in-memory blackboard with controllable race injection.

use futures::future::join_all;
use muster::arbitration::ArbitrationClient;
use muster::blackboard::Blackboard;
use muster::bootstrap;
use muster_common::{ClusterDocument, MusterError, PollIntervals};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// In-memory arbitration document with failure and reset injection
#[derive(Clone, Default)]
struct FakeBlackboard {
    state: Arc<Mutex<Option<ClusterDocument>>>,
    failures_left: Arc<AtomicUsize>,
    publish_failures_left: Arc<AtomicUsize>,
}

impl FakeBlackboard {
    fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` operations fail with a transport error
    fn fail_next(&self, n: usize) {
        self.failures_left.store(n, Ordering::SeqCst);
    }

    /// Make only the next `n` key publishes fail, leaving reads intact
    fn fail_publish(&self, n: usize) {
        self.publish_failures_left.store(n, Ordering::SeqCst);
    }

    /// Simulate another node resetting the document mid-run
    fn wipe(&self) {
        *self.state.lock().unwrap() = Some(ClusterDocument::empty());
    }

    fn snapshot(&self) -> Option<ClusterDocument> {
        self.state.lock().unwrap().clone()
    }

    fn check_failure(&self) -> Result<(), MusterError> {
        let left = self.failures_left.load(Ordering::SeqCst);
        if left > 0 {
            self.failures_left.store(left - 1, Ordering::SeqCst);
            return Err(MusterError::Arbitration("injected transport failure".into()));
        }
        Ok(())
    }

    fn with_doc<T>(
        &self,
        f: impl FnOnce(&mut ClusterDocument) -> T,
    ) -> Result<T, MusterError> {
        self.check_failure()?;
        let mut guard = self.state.lock().unwrap();
        match guard.as_mut() {
            Some(doc) => Ok(f(doc)),
            None => Err(MusterError::Arbitration("document missing".into())),
        }
    }
}

impl Blackboard for FakeBlackboard {
    async fn hosts_len(&self) -> Result<i64, MusterError> {
        self.with_doc(|doc| doc.hosts.len() as i64)
    }

    async fn document(&self) -> Result<String, MusterError> {
        self.with_doc(|doc| serde_json::to_string(doc).unwrap())
    }

    async fn initialize(&self) -> Result<(), MusterError> {
        self.check_failure()?;
        // Last-write-wins for an empty list: a late initializer can erase
        // prior registrations, which the protocol must absorb
        *self.state.lock().unwrap() = Some(ClusterDocument::empty());
        Ok(())
    }

    async fn append_host(&self, address: &str) -> Result<(), MusterError> {
        self.with_doc(|doc| doc.register(address))
    }

    async fn first_host(&self) -> Result<String, MusterError> {
        self.with_doc(|doc| match doc.first_host() {
            Some(host) => format!("\"{host}\""),
            None => "null".to_string(),
        })
    }

    async fn keys(&self) -> Result<String, MusterError> {
        self.with_doc(|doc| {
            if doc.key.is_some() {
                r#"["hosts","key"]"#.to_string()
            } else {
                r#"["hosts"]"#.to_string()
            }
        })
    }

    async fn publish_key(&self, key: &str) -> Result<(), MusterError> {
        let left = self.publish_failures_left.load(Ordering::SeqCst);
        if left > 0 {
            self.publish_failures_left.store(left - 1, Ordering::SeqCst);
            return Err(MusterError::Arbitration("publish: status 503".into()));
        }
        self.with_doc(|doc| doc.key = Some(key.to_string()))
    }

    async fn fetch_key(&self) -> Result<String, MusterError> {
        self.with_doc(|doc| doc.key.clone())?
            .ok_or_else(|| MusterError::Arbitration("key not set".into()))
    }
}

fn client(board: &FakeBlackboard) -> ArbitrationClient<FakeBlackboard> {
    ArbitrationClient::new(board.clone(), PollIntervals::fast())
}

#[tokio::test]
async fn test_three_nodes_converge_on_one_elector_and_one_secret() {
    let board = FakeBlackboard::new();
    let addresses = ["10.0.0.4", "10.0.0.5", "10.0.0.6"];

    let runs = addresses.iter().map(|addr| {
        let board = board.clone();
        async move {
            let client = client(&board);
            bootstrap::coordinate(&client, addr, 3).await.unwrap()
        }
    });
    let results = join_all(runs).await;

    let secrets: Vec<_> = results.iter().map(|r| r.secret.clone()).collect();
    assert!(secrets.iter().all(|s| s == &secrets[0]));
    assert!(!secrets[0].is_empty());

    let electors: Vec<_> = results.iter().map(|r| r.elector_address.clone()).collect();
    assert!(electors.iter().all(|e| e == &electors[0]));

    let elector_count = results.iter().filter(|r| r.is_elector).count();
    assert_eq!(elector_count, 1);

    // The elector is whoever landed at index 0 of the final host list
    let doc = board.snapshot().unwrap();
    assert_eq!(doc.hosts.len(), 3);
    assert_eq!(doc.first_host().unwrap(), electors[0]);
}

#[tokio::test]
async fn test_single_node_cluster_elects_itself() {
    let board = FakeBlackboard::new();
    let params = bootstrap::coordinate(&client(&board), "10.0.0.9", 1)
        .await
        .unwrap();

    assert!(params.is_elector);
    assert_eq!(params.elector_address, "10.0.0.9");
    assert_eq!(params.secret.len(), 24);
}

#[tokio::test]
async fn test_register_self_is_idempotent() {
    let board = FakeBlackboard::new();
    let client = client(&board);

    client.ensure_initialized().await.unwrap();
    client.register_self("10.0.0.4").await.unwrap();
    client.register_self("10.0.0.4").await.unwrap();

    assert_eq!(board.snapshot().unwrap().hosts, vec!["10.0.0.4"]);
}

#[tokio::test]
async fn test_node_reregisters_after_concurrent_reset() {
    let board = FakeBlackboard::new();
    let client = client(&board);

    client.ensure_initialized().await.unwrap();
    client.register_self("10.0.0.4").await.unwrap();

    // Another node re-initializes, erasing the registration
    board.wipe();
    assert!(!board.snapshot().unwrap().contains_host("10.0.0.4"));

    let quorum = {
        let board = board.clone();
        tokio::spawn(async move {
            ArbitrationClient::new(board, PollIntervals::fast())
                .await_quorum("10.0.0.4", 2)
                .await
        })
    };

    // Within a few polls the node must have re-asserted its own entry
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(board.snapshot().unwrap().contains_host("10.0.0.4"));

    // Quorum completes once the second node shows up
    board.append_host("10.0.0.5").await.unwrap();
    tokio::time::timeout(Duration::from_secs(1), quorum)
        .await
        .expect("quorum wait should finish after second registration")
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_await_quorum_never_returns_early() {
    let board = FakeBlackboard::new();
    let client = client(&board);

    client.ensure_initialized().await.unwrap();
    client.register_self("10.0.0.4").await.unwrap();

    // One registered, three expected: the wait must still be pending after
    // many poll intervals. There is deliberately no timeout to hit.
    let pending = client.await_quorum("10.0.0.4", 3);
    let outcome = tokio::time::timeout(Duration::from_millis(100), pending).await;
    assert!(outcome.is_err(), "await_quorum returned below quorum");
}

#[tokio::test]
async fn test_transient_failures_are_retried_not_escalated() {
    let board = FakeBlackboard::new();
    board.fail_next(5);

    let params = bootstrap::coordinate(&client(&board), "10.0.0.4", 1)
        .await
        .unwrap();
    assert_eq!(params.self_address, "10.0.0.4");
    assert!(board.snapshot().unwrap().key.is_some());
}

#[tokio::test]
async fn test_elector_absorbs_transient_publish_failure() {
    let board = FakeBlackboard::new();

    // Only the key publish fails, and only once: the elector must retry it
    // in place rather than abort, since no other node can supply the key
    board.fail_publish(1);
    let params = bootstrap::coordinate(&client(&board), "10.0.0.4", 1)
        .await
        .expect("transient publish failure must not escalate");

    assert!(params.is_elector);
    assert_eq!(
        board.snapshot().unwrap().key.as_deref(),
        Some(params.secret.as_str())
    );
}

#[tokio::test]
async fn test_late_joiner_sees_published_key() {
    let board = FakeBlackboard::new();

    let first = bootstrap::coordinate(&client(&board), "10.0.0.4", 1)
        .await
        .unwrap();

    // A node arriving after the key exists must adopt it, not mint another
    let late = bootstrap::coordinate(&client(&board), "10.0.0.5", 2)
        .await
        .unwrap();

    assert!(!late.is_elector);
    assert_eq!(late.secret, first.secret);
    assert_eq!(late.elector_address, "10.0.0.4");
}
