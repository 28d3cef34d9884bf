//! Fan-out engine: drains a [`BatchMap`] into the RPC endpoint.
//!
//! One worker per batch, pulled from a shared [`ClientPool`], admission-gated
//! by an optional [`RateLimiter`]. Per-transaction and per-batch failures are
//! recovered locally; the only error this module can surface is a dead pool.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chainbench_rpc::ClientPool;
use tracing::{debug, instrument, warn};

use crate::batch::{BatchMap, Transaction};
use crate::limiter::RateLimiter;

const POOL_RETRY_SLEEP: Duration = Duration::from_millis(10);
const ADMISSION_DENIED_SLEEP: Duration = Duration::from_millis(10);
const MAX_SEND_ATTEMPTS: u32 = 4;

/// Counts collected over a `broadcast` call, for the CLI to print a
/// summary. Purely additive to the `Ok(())` contract — does not change
/// error semantics.
#[derive(Debug, Default)]
pub struct BroadcastStats {
    /// Transactions that were eventually sent successfully.
    pub sent: AtomicU64,
    /// Transactions that exhausted their retry budget.
    pub failed: AtomicU64,
    /// Total retry attempts across all transactions (attempts beyond the
    /// first per transaction).
    pub retried: AtomicU64,
}

impl BroadcastStats {
    fn new() -> Self {
        Self::default()
    }

    /// Snapshot the counters into plain numbers.
    #[must_use]
    pub fn snapshot(&self) -> (u64, u64, u64) {
        (
            self.sent.load(Ordering::Relaxed),
            self.failed.load(Ordering::Relaxed),
            self.retried.load(Ordering::Relaxed),
        )
    }
}

/// Drains `BatchMap`s into an RPC endpoint at maximum rate consistent with
/// an admission gate.
#[derive(Debug)]
pub struct Broadcaster {
    pool: Arc<ClientPool>,
    limiter: Option<Arc<dyn RateLimiter>>,
}

impl Broadcaster {
    /// Build a broadcaster over a shared pool and an optional admission
    /// gate. `limiter: None` behaves as if every call to `allow()` returned
    /// `true`.
    #[must_use]
    pub fn new(pool: Arc<ClientPool>, limiter: Option<Arc<dyn RateLimiter>>) -> Self {
        Self { pool, limiter }
    }

    /// Drain `batches` into the pool's endpoint, blocking until every
    /// batch's worker has exited.
    ///
    /// Returns the stats for the run. Per-transaction and per-batch errors
    /// never propagate here; the only failure this surfaces is the pool
    /// never coming up in the first place, which is fatal to the whole
    /// call — checked once, up front, so a dead pool can't leave every
    /// worker spinning forever in its own retry loop.
    ///
    /// # Errors
    ///
    /// Returns the pool's initialization error if it fails to dial.
    pub async fn broadcast(&self, batches: BatchMap) -> Result<Arc<BroadcastStats>, chainbench_rpc::PoolError> {
        let stats = Arc::new(BroadcastStats::new());

        if batches.is_empty() {
            debug!("Empty batch map, nothing to broadcast");
            return Ok(stats);
        }

        // Force and validate pool initialization before fanning out. Once
        // this succeeds, every worker's own `pool.get()` calls are O(1)
        // dispatch and can't fail the same way again.
        self.pool.get().await?;

        let mut handles = Vec::with_capacity(batches.len());
        for (batch_id, txs) in batches {
            let pool = Arc::clone(&self.pool);
            let limiter = self.limiter.clone();
            let stats = Arc::clone(&stats);
            handles.push(tokio::spawn(async move {
                run_batch_worker(batch_id, txs, pool, limiter, stats).await;
            }));
        }

        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "Broadcaster worker panicked");
            }
        }

        Ok(stats)
    }
}

#[instrument(skip(txs, pool, limiter, stats), fields(batch_id))]
async fn run_batch_worker(
    batch_id: i64,
    txs: Vec<Transaction>,
    pool: Arc<ClientPool>,
    limiter: Option<Arc<dyn RateLimiter>>,
    stats: Arc<BroadcastStats>,
) {
    for tx in &txs {
        loop {
            if limiter.as_deref().is_none_or(|l| l.allow()) {
                let client = match pool.get().await {
                    Ok(client) => client,
                    Err(e) => {
                        warn!(batch_id, error = %e, "Pool exhausted, retrying in 10ms");
                        tokio::time::sleep(POOL_RETRY_SLEEP).await;
                        continue;
                    }
                };

                match send_with_retry(&client, tx, &stats).await {
                    Ok(hash) => {
                        debug!(batch_id, tx_hash = %hash, "Transaction sent");
                        stats.sent.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(e) => {
                        warn!(batch_id, tx_hash = %tx.hash(), error = %e, "Transaction failed after 4 retries");
                        stats.failed.fetch_add(1, Ordering::Relaxed);
                    }
                }
                break;
            }

            tokio::time::sleep(ADMISSION_DENIED_SLEEP).await;
        }
    }
}

/// Send `tx` via `client`, retrying transient failures up to
/// [`MAX_SEND_ATTEMPTS`] times with exponential backoff (100, 200, 400 ms).
async fn send_with_retry(
    client: &chainbench_rpc::RpcClient,
    tx: &Transaction,
    stats: &BroadcastStats,
) -> Result<String, chainbench_rpc::RpcError> {
    let mut last_err = None;
    for attempt in 0..MAX_SEND_ATTEMPTS {
        match client.send_raw_transaction(tx.raw()).await {
            Ok(hash) => return Ok(hash),
            Err(e) => {
                if attempt < MAX_SEND_ATTEMPTS - 1 {
                    stats.retried.fetch_add(1, Ordering::Relaxed);
                    let backoff = Duration::from_millis(100u64 << attempt);
                    warn!(attempt, error = %e, backoff_ms = backoff.as_millis(), "Transaction send failed, retrying");
                    tokio::time::sleep(backoff).await;
                }
                last_err = Some(e);
            }
        }
    }
    Err(last_err.unwrap_or(chainbench_rpc::RpcError::Connection("no attempts made".into())))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;
    use crate::limiter::TokenBucketLimiter;

    fn ok_dialer() -> impl Fn(&str) -> Result<chainbench_rpc::RpcClient, chainbench_rpc::RpcError> + Send + Sync {
        |url| chainbench_rpc::RpcClient::new(url)
    }

    #[tokio::test]
    async fn empty_batch_map_returns_immediately() {
        let pool = Arc::new(ClientPool::with_dialer("http://localhost:8545", 2, ok_dialer()));
        let broadcaster = Broadcaster::new(pool, None);
        let stats = broadcaster.broadcast(BatchMap::new()).await.expect("empty broadcast must not fail");
        let (sent, failed, retried) = stats.snapshot();
        assert_eq!((sent, failed, retried), (0, 0, 0));
    }

    #[tokio::test]
    async fn empty_batch_map_skips_pool_validation() {
        // A dead pool is fine as long as there's nothing to send — S1 says
        // "no pool init" for the empty case.
        let pool = Arc::new(ClientPool::with_dialer("http://localhost:8545", 1, |_url| {
            Err(chainbench_rpc::RpcError::Connection("refused".into()))
        }));
        let broadcaster = Broadcaster::new(pool, None);
        let result = broadcaster.broadcast(BatchMap::new()).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn dead_pool_aborts_broadcast_without_spawning_workers() {
        let calls = Arc::new(std::sync::atomic::AtomicU32::new(0));
        let calls_clone = Arc::clone(&calls);
        let pool = Arc::new(ClientPool::with_dialer("http://localhost:8545", 1, move |_url| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
            Err(chainbench_rpc::RpcError::Connection("refused".into()))
        }));
        let broadcaster = Broadcaster::new(pool, None);

        let mut batches = BatchMap::new();
        batches.insert(0, vec![Transaction::new(vec![1], "0xaa")]);

        let result = broadcaster.broadcast(batches).await;
        assert!(result.is_err());
        // Exactly one dial pass (4 attempts for the single slot); no worker
        // ever got a chance to retry against the dead pool.
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn intra_batch_sends_preserve_order() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let mock_server = MockServer::start().await;
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);

        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(move |req: &wiremock::Request| {
                let body: serde_json::Value = serde_json::from_slice(&req.body).expect("valid json-rpc body");
                let raw_hex = body["params"][0].as_str().unwrap_or_default().to_string();
                seen_clone.lock().expect("lock poisoned").push(raw_hex);
                ResponseTemplate::new(200).set_body_json(serde_json::json!({
                    "jsonrpc": "2.0",
                    "id": 1,
                    "result": "0xresult",
                }))
            })
            .mount(&mock_server)
            .await;

        let pool = Arc::new(ClientPool::with_dialer(mock_server.uri(), 1, |url| chainbench_rpc::RpcClient::new(url)));
        let broadcaster = Broadcaster::new(pool, None);

        let txs = vec![
            Transaction::new(vec![1], "0x01"),
            Transaction::new(vec![2], "0x02"),
            Transaction::new(vec![3], "0x03"),
        ];
        let mut batches = BatchMap::new();
        batches.insert(0, txs);

        let stats = broadcaster.broadcast(batches).await.expect("broadcast failed");
        let (sent, failed, _) = stats.snapshot();
        assert_eq!((sent, failed), (3, 0));

        let order = seen.lock().expect("lock poisoned");
        assert_eq!(*order, vec!["0x01".to_string(), "0x02".to_string(), "0x03".to_string()]);
    }

    #[tokio::test]
    async fn limiter_denial_blocks_admission() {
        let limiter = TokenBucketLimiter::new(0);
        assert!(!limiter.allow());
        limiter.increase_limit(1);
        assert!(limiter.allow());
    }

    #[tokio::test]
    async fn send_with_retry_gives_up_after_four_attempts() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let mock_server = MockServer::start().await;
        let attempt_count = Arc::new(AtomicUsize::new(0));
        let count_clone = Arc::clone(&attempt_count);

        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(move |_: &wiremock::Request| {
                count_clone.fetch_add(1, Ordering::SeqCst);
                ResponseTemplate::new(500)
            })
            .mount(&mock_server)
            .await;

        let client = chainbench_rpc::RpcClient::new(mock_server.uri()).expect("client failed");
        let tx = Transaction::new(vec![1, 2, 3], "0xdead");
        let stats = BroadcastStats::new();

        let result = send_with_retry(&client, &tx, &stats).await;
        assert!(result.is_err());
        assert_eq!(attempt_count.load(Ordering::SeqCst), 4);
        assert_eq!(stats.retried.load(Ordering::Relaxed), 3);
    }

    #[tokio::test]
    async fn single_tx_immediate_success() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "jsonrpc": "2.0",
                "id": 1,
                "result": "0xgood",
            })))
            .mount(&mock_server)
            .await;

        let pool = Arc::new(ClientPool::with_dialer(mock_server.uri(), 1, |url| chainbench_rpc::RpcClient::new(url)));
        let broadcaster = Broadcaster::new(pool, None);

        let mut batches = BatchMap::new();
        batches.insert(0, vec![Transaction::new(vec![1], "0x01")]);

        let stats = broadcaster.broadcast(batches).await.expect("broadcast failed");
        let (sent, failed, retried) = stats.snapshot();
        assert_eq!((sent, failed, retried), (1, 0, 0));
    }

    #[tokio::test]
    async fn single_tx_recovers_after_two_transient_failures() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let mock_server = MockServer::start().await;
        let attempt_count = Arc::new(AtomicUsize::new(0));
        let count_clone = Arc::clone(&attempt_count);

        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(move |_: &wiremock::Request| {
                let n = count_clone.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    ResponseTemplate::new(500)
                } else {
                    ResponseTemplate::new(200).set_body_json(serde_json::json!({
                        "jsonrpc": "2.0",
                        "id": 1,
                        "result": "0xrecovered",
                    }))
                }
            })
            .mount(&mock_server)
            .await;

        let client = chainbench_rpc::RpcClient::new(mock_server.uri()).expect("client failed");
        let tx = Transaction::new(vec![1], "0x01");
        let stats = BroadcastStats::new();

        let start = std::time::Instant::now();
        let result = send_with_retry(&client, &tx, &stats).await;
        let elapsed = start.elapsed();

        assert_eq!(result.expect("must recover"), "0xrecovered");
        assert_eq!(attempt_count.load(Ordering::SeqCst), 3);
        assert_eq!(stats.retried.load(Ordering::Relaxed), 2);
        // Two failed attempts back off 100ms then 200ms before the third,
        // successful, attempt.
        assert!(elapsed >= Duration::from_millis(300), "elapsed {elapsed:?} should be at least 300ms");
    }
}
