//! Provider backed by a node's HTTP JSON-RPC endpoint.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::Provider;
use crate::constants::HTTP_REQUEST_TIMEOUT;
use crate::error::{Result, TelepathError};
use crate::jsonrpc::{IncomingMessage, JsonRpcRequest};

/// Sends each request as a single JSON-RPC POST to a node.
#[derive(Debug)]
pub struct HttpProvider {
    client: reqwest::Client,
    url: String,
    next_id: AtomicU64,
}

impl HttpProvider {
    /// Create a provider for the node at `url`.
    pub fn new(url: &str) -> Self {
        Self::with_timeout(url, HTTP_REQUEST_TIMEOUT)
    }

    /// Create a provider with a custom per-request timeout.
    pub fn with_timeout(url: &str, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                log::warn!("Failed to build node HTTP client ({e}), using defaults");
                reqwest::Client::new()
            });
        Self {
            client,
            url: url.to_string(),
            next_id: AtomicU64::new(1),
        }
    }
}

#[async_trait]
impl Provider for HttpProvider {
    async fn request(&self, method: &str, params: Value) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = JsonRpcRequest::new(id, method, Some(params));

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| TelepathError::Node(format!("failed to reach node: {e}")))?;

        if !response.status().is_success() {
            return Err(TelepathError::Node(format!(
                "{method} failed: {}",
                response.status()
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| TelepathError::Node(format!("invalid {method} response: {e}")))?;

        match IncomingMessage::from_value(body) {
            Ok(IncomingMessage::Response(response)) => response.outcome.map_err(|e| {
                TelepathError::Node(format!("{method} rejected ({}): {}", e.code, e.message))
            }),
            Ok(_) => Err(TelepathError::Node(format!(
                "{method}: node sent a request instead of a response"
            ))),
            Err(e) => Err(TelepathError::Node(format!("{method}: {e}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_returns_result() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({
                "jsonrpc": "2.0",
                "method": "eth_getTransactionCount",
                "params": ["0xabc", "pending"]
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "jsonrpc": "2.0", "id": 1, "result": "0x42" })),
            )
            .mount(&server)
            .await;

        let provider = HttpProvider::new(&server.uri());
        let result = provider
            .request("eth_getTransactionCount", json!(["0xabc", "pending"]))
            .await
            .unwrap();
        assert_eq!(result, json!("0x42"));
    }

    #[tokio::test]
    async fn test_node_error_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                json!({ "jsonrpc": "2.0", "id": 1, "error": { "code": -32000, "message": "nonce too low" } }),
            ))
            .mount(&server)
            .await;

        let provider = HttpProvider::new(&server.uri());
        let err = provider
            .request("eth_sendRawTransaction", json!(["0x01"]))
            .await
            .unwrap_err();
        assert!(matches!(err, TelepathError::Node(msg) if msg.contains("nonce too low")));
    }

    #[tokio::test]
    async fn test_http_failure_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let provider = HttpProvider::new(&server.uri());
        assert!(matches!(
            provider.request("eth_blockNumber", json!([])).await,
            Err(TelepathError::Node(_))
        ));
    }
}
