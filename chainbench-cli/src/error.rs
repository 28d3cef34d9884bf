//! Error types for the chainbench CLI.

use std::path::PathBuf;

use thiserror::Error;

/// Result type for chainbench CLI operations.
pub type Result<T> = std::result::Result<T, CliError>;

/// Errors that can occur while running the chainbench CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Core engine error (pool init failure, listener connect failure).
    #[error("core error: {0}")]
    Core(#[from] chainbench_core::CoreError),

    /// RPC pool error surfaced directly (e.g. during an explicit warm-up).
    #[error("pool error: {0}")]
    Pool(#[from] chainbench_rpc::PoolError),

    /// Failed to load the prepared batch file.
    #[error("failed to load batches from {path}: {source}")]
    BatchLoad {
        /// Path to the batch file.
        path: PathBuf,
        /// Underlying error.
        source: PersistenceError,
    },
}

/// Configuration-specific errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the config file.
    #[error("failed to read config file {path}: {source}")]
    FileRead {
        /// Path to the file.
        path: PathBuf,
        /// IO error.
        source: std::io::Error,
    },

    /// Failed to parse the config file as TOML.
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        /// Path to the file.
        path: PathBuf,
        /// TOML parse error.
        source: toml::de::Error,
    },

    /// Configuration failed validation.
    #[error("config validation failed: {0}")]
    Validation(String),
}

/// Errors from the minimal batch-file loader in [`crate::persistence`].
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// Failed to read the batch file.
    #[error("failed to read batch file: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse the batch file as JSON.
    #[error("failed to parse batch file: {0}")]
    Json(#[from] serde_json::Error),

    /// A transaction entry wasn't valid hex.
    #[error("invalid hex in batch {batch_id}, tx {index}: {source}")]
    InvalidHex {
        /// Batch id containing the bad entry.
        batch_id: i64,
        /// Index of the entry within the batch.
        index: usize,
        /// Underlying hex-decode error.
        source: hex::FromHexError,
    },

    /// A batch-id key in the file wasn't a valid integer.
    #[error("invalid batch id key: {0}")]
    InvalidBatchId(String),
}
