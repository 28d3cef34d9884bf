//! Error types for the chainbench RPC client and pool.
//!
//! - [`RpcError`] — failures talking to a single JSON-RPC endpoint.
//! - [`PoolError`] — failures initializing or dispatching from the client pool.

use thiserror::Error;

/// Result type alias using [`RpcError`].
pub type Result<T> = std::result::Result<T, RpcError>;

/// Errors that can occur when sending a JSON-RPC request.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RpcError {
    /// Failed to establish or reuse a connection to the RPC endpoint.
    #[error("connection failed: {0}")]
    Connection(String),

    /// Request timed out waiting for a response.
    #[error("request timed out")]
    Timeout,

    /// HTTP-level error (non-2xx status, TLS issues, etc).
    #[error("HTTP error: {0}")]
    Http(String),

    /// JSON-RPC error returned by the server.
    #[error("RPC error ({code}): {message}")]
    Rpc {
        /// JSON-RPC error code.
        code: i64,
        /// Human-readable error message from the server.
        message: String,
    },

    /// Failed to serialize the request or deserialize the response.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Response was valid JSON but missing the expected fields.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl RpcError {
    /// Returns `true` if this error is likely transient and worth retrying.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connection(_) | Self::Timeout => true,
            Self::Http(msg) => {
                msg.contains("500") || msg.contains("502") || msg.contains("503") || msg.contains("504")
            }
            Self::Rpc { code, .. } => *code == -32000 || *code == -32005,
            Self::Serialization(_) | Self::InvalidResponse(_) => false,
        }
    }
}

impl From<reqwest::Error> for RpcError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_connect() {
            Self::Connection(err.to_string())
        } else {
            Self::Http(err.to_string())
        }
    }
}

/// Errors that can occur when initializing or dispatching from a [`crate::ClientPool`].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PoolError {
    /// A connection slot could not be established after its retry budget.
    #[error("failed to initialize pool slot {slot}: {source}")]
    SlotInit {
        /// Index of the slot that failed.
        slot: usize,
        /// Underlying connection error.
        source: RpcError,
    },

    /// The pool has not been initialized yet, or a prior initialization failed.
    #[error("pool is not initialized")]
    NotInitialized,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_and_timeout_are_retryable() {
        assert!(RpcError::Connection("refused".into()).is_retryable());
        assert!(RpcError::Timeout.is_retryable());
    }

    #[test]
    fn http_5xx_is_retryable() {
        assert!(RpcError::Http("503 Service Unavailable".into()).is_retryable());
        assert!(!RpcError::Http("404 Not Found".into()).is_retryable());
    }

    #[test]
    fn server_overloaded_rpc_codes_are_retryable() {
        assert!(RpcError::Rpc { code: -32000, message: "server error".into() }.is_retryable());
        assert!(RpcError::Rpc { code: -32005, message: "limit exceeded".into() }.is_retryable());
        assert!(!RpcError::Rpc { code: -32601, message: "method not found".into() }.is_retryable());
    }

    #[test]
    fn decode_errors_are_not_retryable() {
        assert!(!RpcError::InvalidResponse("missing field".into()).is_retryable());
    }
}
