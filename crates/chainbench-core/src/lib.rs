//! Batch types, rate limiter, broadcaster, and chain listener for chainbench.
//!
//! # Modules
//!
//! - [`batch`] — [`Transaction`] and [`BatchMap`]
//! - [`limiter`] — the [`RateLimiter`] contract plus [`TokenBucketLimiter`]
//!   and [`NullLimiter`]
//! - [`broadcaster`] — [`Broadcaster`], the per-batch fan-out engine
//! - [`window`] — the rolling block window and active-window TPS estimator
//! - [`listener`] — [`ChainListener`], the websocket block subscriber
//! - [`error`] — [`CoreError`]

// ═══════════════════════════════════════════════════════════════════════════════
// MODULES
// ═══════════════════════════════════════════════════════════════════════════════

pub mod batch;
pub mod broadcaster;
pub mod error;
pub mod limiter;
pub mod listener;
pub mod window;

// ═══════════════════════════════════════════════════════════════════════════════
// RE-EXPORTS
// ═══════════════════════════════════════════════════════════════════════════════

pub use batch::{BatchMap, Transaction};
pub use broadcaster::{BroadcastStats, Broadcaster};
pub use error::{CoreError, Result};
pub use limiter::{NullLimiter, RateLimiter, TokenBucketLimiter};
pub use listener::{ChainListener, ListenerState};
pub use window::{BestObservation, BlockInfo, BlockWindow, WindowSample};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
