//! Minimal JSON-RPC client over HTTPS.
//!
//! This client speaks standard Ethereum JSON-RPC. The broadcaster only ever
//! calls [`RpcClient::send_raw_transaction`], but the client exposes the
//! generic [`RpcClient::call`] as the building block for it, matching the
//! shape of MegaETH's extended client in the same position in the stack.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tracing::instrument;

use crate::error::{Result, RpcError};
use crate::types::{JsonRpcRequest, JsonRpcResponse};

/// Default timeout for a single RPC request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// A single JSON-RPC HTTP connection.
///
/// `RpcClient` is `Send + Sync` and safe to share across tasks; the
/// underlying `reqwest::Client` multiplexes connections internally, so one
/// `RpcClient` can comfortably serve many concurrent callers — this is what
/// lets [`crate::ClientPool`] treat a handful of clients as "thousands of
/// in-flight requests" worth of capacity.
#[derive(Debug)]
pub struct RpcClient {
    http: reqwest::Client,
    rpc_url: String,
    request_id: AtomicU64,
}

impl RpcClient {
    /// Create a new client pointed at `rpc_url` with the default timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be constructed.
    pub fn new(rpc_url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(rpc_url, DEFAULT_TIMEOUT)
    }

    /// Create a new client with a custom request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be constructed.
    pub fn with_timeout(rpc_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RpcError::Connection(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, rpc_url: rpc_url.into(), request_id: AtomicU64::new(1) })
    }

    /// The RPC endpoint this client talks to.
    #[must_use]
    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    fn next_id(&self) -> u64 {
        self.request_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Submit a pre-signed raw transaction via `eth_sendRawTransaction`.
    ///
    /// Returns the transaction hash reported by the node. The caller treats
    /// the envelope as opaque bytes; this is the only RPC method the
    /// broadcaster invokes (spec §6).
    ///
    /// # Errors
    ///
    /// Returns an [`RpcError`] on any network, HTTP, or RPC-level failure.
    #[instrument(skip(self, raw_tx), fields(tx_len = raw_tx.len()))]
    pub async fn send_raw_transaction(&self, raw_tx: &[u8]) -> Result<String> {
        let hex_tx = format!("0x{}", hex::encode(raw_tx));
        self.call("eth_sendRawTransaction", [hex_tx]).await
    }

    /// Execute a single JSON-RPC call and decode its result.
    ///
    /// # Errors
    ///
    /// Returns an [`RpcError`] if the request fails at the network layer,
    /// the server responds with a JSON-RPC error, or the result cannot be
    /// decoded into `R`.
    pub async fn call<P, R>(&self, method: &str, params: P) -> Result<R>
    where
        P: serde::Serialize,
        R: serde::de::DeserializeOwned,
    {
        let request = JsonRpcRequest::new(method, params, self.next_id());

        let response = self.http.post(&self.rpc_url).json(&request).send().await?;
        let body: JsonRpcResponse<R> = response.json().await?;

        if let Some(error) = body.error {
            return Err(RpcError::Rpc { code: error.code, message: error.message });
        }

        body.result.ok_or_else(|| RpcError::InvalidResponse(format!("missing result for {method}")))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[tokio::test]
    async fn client_creation() {
        let client = RpcClient::new("https://example.com/rpc").expect("client creation failed");
        assert_eq!(client.rpc_url(), "https://example.com/rpc");
    }

    #[tokio::test]
    async fn send_raw_transaction_returns_hash() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "jsonrpc": "2.0",
                "id": 1,
                "result": "0xabc123"
            })))
            .mount(&mock_server)
            .await;

        let client = RpcClient::new(mock_server.uri()).expect("client creation failed");
        let hash = client.send_raw_transaction(b"\xde\xad\xbe\xef").await.expect("send failed");
        assert_eq!(hash, "0xabc123");
    }

    #[tokio::test]
    async fn rpc_error_response_surfaces_as_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "jsonrpc": "2.0",
                "id": 1,
                "error": {"code": -32000, "message": "nonce too low"}
            })))
            .mount(&mock_server)
            .await;

        let client = RpcClient::new(mock_server.uri()).expect("client creation failed");
        let err = client.send_raw_transaction(b"\x01").await.expect_err("expected error");
        assert!(matches!(err, RpcError::Rpc { code: -32000, .. }));
    }
}
