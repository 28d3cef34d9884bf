//! Error types for chainbench-core.

use thiserror::Error;

/// Result type alias using [`CoreError`].
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors surfaced by the broadcaster and listener.
///
/// Per-transaction and per-block failures are recovered locally and never
/// reach this type — `CoreError` only carries the handful of failure modes
/// that are fatal to a run.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CoreError {
    /// The RPC client pool failed to initialize; nothing can be broadcast.
    #[error("rpc pool unavailable: {0}")]
    Pool(#[from] chainbench_rpc::PoolError),

    /// The websocket connection to the chain endpoint could not be
    /// established.
    #[error("listener connection failed: {0}")]
    Connect(String),

    /// The websocket URL could not be parsed.
    #[error("invalid websocket url: {0}")]
    InvalidUrl(String),
}
