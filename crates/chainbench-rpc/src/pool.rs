//! Fixed-size, lazily-initialized pool of RPC clients handed out round-robin.
//!
//! See spec §4.1. The pool dials `size` connections once, tolerating a
//! bounded number of per-slot retries, then serves them out via an atomic
//! round-robin counter. Initialization is a one-shot: concurrent first
//! callers all observe the result of the single dial pass.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::OnceCell;
use tracing::{debug, instrument, warn};

use crate::client::RpcClient;
use crate::error::{PoolError, RpcError};

/// Pool size used when the configured size is `0` ("non-positive" in the
/// source, which collapses to zero once represented as `usize`).
pub const DEFAULT_POOL_SIZE: usize = 800;

/// Maximum dial attempts per slot before the slot — and the whole pool — is
/// considered failed.
const MAX_DIAL_ATTEMPTS: u32 = 4;

type Dialer = dyn Fn(&str) -> Result<RpcClient, RpcError> + Send + Sync;

/// An owning reference to one live RPC connection, handed out by
/// [`ClientPool::get`].
pub type ClientHandle = Arc<RpcClient>;

/// A fixed-size, lazily-initialized pool of RPC connections.
pub struct ClientPool {
    rpc_url: String,
    size: usize,
    dialer: Arc<Dialer>,
    slots: OnceCell<Vec<ClientHandle>>,
    counter: AtomicUsize,
    /// Latched once initialization has failed, so a pool that has given
    /// up stays given up — `OnceCell::get_or_try_init` alone would retry
    /// the whole dial pass on every subsequent `Err`.
    failed: AtomicBool,
}

impl std::fmt::Debug for ClientPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientPool")
            .field("rpc_url", &self.rpc_url)
            .field("size", &self.size)
            .field("initialized", &self.slots.initialized())
            .finish()
    }
}

impl ClientPool {
    /// Create a new pool for `rpc_url`. `size == 0` is treated as
    /// [`DEFAULT_POOL_SIZE`]. The pool is not dialed until the first call to
    /// [`get`](Self::get).
    #[must_use]
    pub fn new(rpc_url: impl Into<String>, size: usize) -> Self {
        let rpc_url = rpc_url.into();
        Self::with_dialer(rpc_url.clone(), size, move |url| RpcClient::new(url))
    }

    /// Create a pool with a custom dial function. Used in tests to inject
    /// transient dial failures without a real network.
    pub fn with_dialer<F>(rpc_url: impl Into<String>, size: usize, dialer: F) -> Self
    where
        F: Fn(&str) -> Result<RpcClient, RpcError> + Send + Sync + 'static,
    {
        Self {
            rpc_url: rpc_url.into(),
            size: if size == 0 { DEFAULT_POOL_SIZE } else { size },
            dialer: Arc::new(dialer),
            slots: OnceCell::new(),
            counter: AtomicUsize::new(0),
            failed: AtomicBool::new(false),
        }
    }

    /// Number of slots this pool was configured with.
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Hand out the next client in round-robin order.
    ///
    /// On first call this triggers (and blocks concurrent callers on) the
    /// one-shot dial pass. Once initialized, dispatch is an O(1) atomic
    /// increment with no per-call liveness check — a dead connection
    /// surfaces as a send error one level up, in the broadcaster's retry
    /// loop.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::SlotInit`] if any slot exhausted its dial
    /// attempts during initialization. Once the pool has failed to
    /// initialize, it stays in that failed state permanently.
    #[instrument(skip(self))]
    pub async fn get(&self) -> Result<ClientHandle, PoolError> {
        if self.failed.load(Ordering::Acquire) {
            return Err(PoolError::NotInitialized);
        }

        let slots = match self.slots.get_or_try_init(|| self.dial_all()).await {
            Ok(slots) => slots,
            Err(e) => {
                self.failed.store(true, Ordering::Release);
                return Err(e);
            }
        };
        let idx = self.counter.fetch_add(1, Ordering::Relaxed) % slots.len();
        Ok(Arc::clone(&slots[idx]))
    }

    async fn dial_all(&self) -> Result<Vec<ClientHandle>, PoolError> {
        debug!(size = self.size, rpc_url = %self.rpc_url, "Initializing RPC client pool");
        let mut slots = Vec::with_capacity(self.size);
        for slot in 0..self.size {
            slots.push(Arc::new(self.dial_slot(slot).await?));
        }
        debug!(size = slots.len(), "RPC client pool initialized");
        Ok(slots)
    }

    async fn dial_slot(&self, slot: usize) -> Result<RpcClient, PoolError> {
        let mut last_err = None;
        for attempt in 0..MAX_DIAL_ATTEMPTS {
            match (self.dialer)(&self.rpc_url) {
                Ok(client) => return Ok(client),
                Err(e) => {
                    warn!(slot, attempt, error = %e, "Failed to dial pool slot, retrying");
                    last_err = Some(e);
                    let backoff = Duration::from_millis(u64::from(attempt + 1) * 100);
                    tokio::time::sleep(backoff).await;
                }
            }
        }

        Err(PoolError::SlotInit {
            slot,
            source: last_err.unwrap_or(RpcError::Connection("no attempts made".into())),
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
