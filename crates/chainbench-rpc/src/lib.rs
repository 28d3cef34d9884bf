//! JSON-RPC client and connection pool used by the chainbench broadcaster.
//!
//! # Modules
//!
//! - [`client`] — a single [`RpcClient`] connection
//! - [`pool`] — [`ClientPool`], the round-robin pool of clients the
//!   broadcaster dispatches through
//! - [`types`] — JSON-RPC request/response envelopes
//! - [`error`] — [`RpcError`] and [`PoolError`]

// ═══════════════════════════════════════════════════════════════════════════════
// MODULES
// ═══════════════════════════════════════════════════════════════════════════════

pub mod client;
pub mod error;
pub mod pool;
pub mod types;

// ═══════════════════════════════════════════════════════════════════════════════
// RE-EXPORTS
// ═══════════════════════════════════════════════════════════════════════════════

pub use client::RpcClient;
pub use error::{PoolError, Result, RpcError};
pub use pool::{ClientHandle, ClientPool, DEFAULT_POOL_SIZE};

// ═══════════════════════════════════════════════════════════════════════════════
// CRATE INFO
// ═══════════════════════════════════════════════════════════════════════════════

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
