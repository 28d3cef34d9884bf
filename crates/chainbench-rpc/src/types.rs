//! JSON-RPC request/response envelopes shared by the client and pool.

use serde::{Deserialize, Serialize};

/// A JSON-RPC 2.0 request envelope.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcRequest<'a, P> {
    jsonrpc: &'static str,
    pub(crate) method: &'a str,
    pub(crate) params: P,
    pub(crate) id: u64,
}

impl<'a, P> JsonRpcRequest<'a, P> {
    /// Build a new request with the given method, params, and correlation id.
    pub const fn new(method: &'a str, params: P, id: u64) -> Self {
        Self { jsonrpc: "2.0", method, params, id }
    }
}

/// A JSON-RPC 2.0 response envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcResponse<R> {
    #[allow(dead_code)]
    pub jsonrpc: Option<String>,
    pub result: Option<R>,
    pub error: Option<RpcErrorDetail>,
}

/// Detailed information from a JSON-RPC error response.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcErrorDetail {
    /// JSON-RPC error code.
    pub code: i64,
    /// Human-readable error message.
    pub message: String,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn request_serializes_with_jsonrpc_2() {
        let req = JsonRpcRequest::new("eth_sendRawTransaction", ["0xdead"], 7);
        let json = serde_json::to_value(&req).expect("serialize failed");
        assert_eq!(json["jsonrpc"], "2.0");
        assert_eq!(json["method"], "eth_sendRawTransaction");
        assert_eq!(json["id"], 7);
    }

    #[test]
    fn response_decodes_error_branch() {
        let raw = r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32000,"message":"nonce too low"}}"#;
        let resp: JsonRpcResponse<String> = serde_json::from_str(raw).expect("parse failed");
        assert!(resp.result.is_none());
        let err = resp.error.expect("expected error");
        assert_eq!(err.code, -32000);
    }
}
