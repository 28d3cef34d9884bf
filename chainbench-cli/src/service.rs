//! Main service orchestrator.
//!
//! [`BenchService`] ties together the client pool, rate limiter,
//! broadcaster, and chain listener, then runs the broadcaster and listener
//! concurrently until both have finished.

use std::sync::Arc;

use anyhow::Result;
use chainbench_core::{Broadcaster, ChainListener, RateLimiter, TokenBucketLimiter};
use chainbench_rpc::ClientPool;
use tracing::info;

use crate::config::Settings;
use crate::error::CliError;
use crate::persistence;

/// Orchestrates one end-to-end benchmark run.
#[derive(Debug)]
pub struct BenchService {
    settings: Settings,
}

impl BenchService {
    /// Build a service from loaded, validated settings.
    #[must_use]
    pub const fn new(settings: Settings) -> Self {
        Self { settings }
    }

    /// Run the broadcaster and listener concurrently, printing the final
    /// `Best TPS` line.
    ///
    /// # Errors
    ///
    /// Returns an error if the batch file can't be loaded, the RPC pool
    /// fails to initialize, or the listener can't open its websocket.
    pub async fn run(&self) -> Result<()> {
        let batches = persistence::load_batch_map(&self.settings.batches.path).map_err(|source| CliError::BatchLoad {
            path: self.settings.batches.path.clone().into(),
            source,
        })?;
        info!(batches = batches.len(), "Loaded batch map");

        let pool = Arc::new(ClientPool::new(self.settings.rpc.rpc_url.clone(), self.settings.rpc.pool_size));
        let limiter: Arc<dyn RateLimiter> = Arc::new(TokenBucketLimiter::new(0));

        let broadcaster = Broadcaster::new(Arc::clone(&pool), Some(Arc::clone(&limiter)));
        let listener = ChainListener::new(self.settings.rpc.ws_url.clone(), Some(Arc::clone(&limiter)));
        let shutdown = listener.shutdown_handle();

        info!(
            rpc_url = %self.settings.rpc.rpc_url,
            ws_url = %self.settings.rpc.ws_url,
            "Starting benchmark run"
        );

        // A dead pool is fatal to the whole run; cancel the listener too
        // rather than let it wait indefinitely on a feed with nothing to
        // observe.
        let broadcast_fut = async {
            let result = broadcaster.broadcast(batches).await;
            if result.is_err() {
                shutdown.cancel();
            }
            result
        };

        let (broadcast_result, listener_result) = tokio::join!(broadcast_fut, listener.run());

        let stats = broadcast_result.map_err(CliError::Pool)?;
        let (sent, failed, retried) = stats.snapshot();
        info!(sent, failed, retried, "Broadcaster drained");

        listener_result.map_err(CliError::Core)?;

        // The listener itself prints the stable "Best TPS: ..." line when
        // its drain condition fires (chainbench_core::listener). Nothing
        // further to print here if that happened; if the socket closed
        // before a drain was ever detected, there's simply no TPS sample
        // to report.
        let best = listener.best();
        info!(best_tps = best.best_tps, gas_ratio = best.gas_used_ratio_at_best, "Run complete");

        Ok(())
    }
}
