//! Configuration loading and validation.
//!
//! Settings are loaded from a TOML file; CLI flags (see [`crate::Args`])
//! take precedence where both are supplied.
//!
//! # Example Configuration
//!
//! ```toml
//! [rpc]
//! rpc_url = "https://example-chain.invalid/rpc"
//! ws_url = "wss://example-chain.invalid/ws"
//! pool_size = 800
//!
//! [batches]
//! path = "batches.json"
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ConfigError, Result};

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    /// RPC endpoint configuration.
    pub rpc: RpcConfig,
    /// Prepared-batch file configuration.
    pub batches: BatchesConfig,
}

/// RPC endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RpcConfig {
    /// JSON-RPC HTTPS endpoint the broadcaster sends transactions to.
    pub rpc_url: String,
    /// Websocket endpoint the listener subscribes to.
    pub ws_url: String,
    /// Number of pooled RPC connections. `0` means the pool's default
    /// (800).
    #[serde(default)]
    pub pool_size: usize,
}

/// Prepared-batch file configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BatchesConfig {
    /// Path to the JSON file holding `{batch_id: [hex tx, ...]}`.
    pub path: String,
}

impl Settings {
    /// Load settings from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::FileRead`] or [`ConfigError::Parse`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "Loading configuration");

        let content = fs::read_to_string(path)
            .map_err(|e| ConfigError::FileRead { path: path.to_path_buf(), source: e })?;

        let settings: Self =
            toml::from_str(&content).map_err(|e| ConfigError::Parse { path: path.to_path_buf(), source: e })?;

        Ok(settings)
    }

    /// Validate the configuration, failing fast on obviously-broken input.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if a required field is empty.
    pub fn validate(&self) -> Result<()> {
        if self.rpc.rpc_url.is_empty() {
            return Err(ConfigError::Validation("rpc.rpc_url is required".into()).into());
        }
        if self.rpc.ws_url.is_empty() {
            return Err(ConfigError::Validation("rpc.ws_url is required".into()).into());
        }
        if self.batches.path.is_empty() {
            return Err(ConfigError::Validation("batches.path is required".into()).into());
        }
        Ok(())
    }

    /// Apply CLI overrides on top of a loaded (or default) settings value.
    pub fn apply_overrides(
        &mut self,
        rpc_url: Option<String>,
        ws_url: Option<String>,
        pool_size: Option<usize>,
        batches_path: Option<String>,
    ) {
        if let Some(rpc_url) = rpc_url {
            self.rpc.rpc_url = rpc_url;
        }
        if let Some(ws_url) = ws_url {
            self.rpc.ws_url = ws_url;
        }
        if let Some(pool_size) = pool_size {
            self.rpc.pool_size = pool_size;
        }
        if let Some(batches_path) = batches_path {
            self.batches.path = batches_path;
        }
    }
}
