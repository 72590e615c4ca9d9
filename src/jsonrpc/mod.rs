//! JSON-RPC 2.0 messages exchanged over a Telepath channel.
//!
//! # Modules
//!
//! - [`correlator`] - Matches responses to the requests that caused them

pub mod correlator;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::constants::JSONRPC_VERSION;
use crate::error::{Result, TelepathError};

pub use correlator::RequestCorrelator;

/// A JSON-RPC request with an id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// Always `"2.0"`.
    pub jsonrpc: String,
    /// Correlation id echoed by the response.
    pub id: u64,
    /// Method name.
    pub method: String,
    /// Method parameters, omitted when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    /// Build a request for `method`.
    pub fn new(id: u64, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            method: method.into(),
            params,
        }
    }
}

/// The `error` member of a failed response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcErrorObject {
    /// Error code.
    #[serde(default)]
    pub code: i64,
    /// Error message.
    #[serde(default)]
    pub message: String,
    /// Optional structured data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// A response to a request, either a result or an error.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonRpcResponse {
    /// Id of the request being answered.
    pub id: u64,
    /// Outcome carried by the response.
    pub outcome: std::result::Result<Value, JsonRpcErrorObject>,
}

impl JsonRpcResponse {
    /// Successful response carrying `result`.
    pub fn success(id: u64, result: Value) -> Self {
        Self {
            id,
            outcome: Ok(result),
        }
    }

    /// Error response carrying `code` and `message`.
    pub fn failure(id: u64, code: i64, message: impl Into<String>) -> Self {
        Self {
            id,
            outcome: Err(JsonRpcErrorObject {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }

    /// Convert into the caller-facing result, mapping an error member to
    /// [`TelepathError::Remote`].
    pub fn into_result(self) -> Result<Value> {
        self.outcome.map_err(|e| TelepathError::Remote {
            code: e.code,
            message: e.message,
            data: e.data,
        })
    }

    /// Wire representation of this response.
    pub fn to_value(&self) -> Value {
        let mut object = Map::new();
        object.insert("jsonrpc".into(), Value::from(JSONRPC_VERSION));
        object.insert("id".into(), Value::from(self.id));
        match &self.outcome {
            Ok(result) => {
                object.insert("result".into(), result.clone());
            }
            Err(error) => {
                object.insert(
                    "error".into(),
                    serde_json::to_value(error).unwrap_or(Value::Null),
                );
            }
        }
        Value::Object(object)
    }
}

/// Any JSON-RPC message that can arrive on a channel.
#[derive(Debug, Clone, PartialEq)]
pub enum IncomingMessage {
    /// Answer to one of our requests.
    Response(JsonRpcResponse),
    /// Request initiated by the peer.
    Request(JsonRpcRequest),
    /// Notification (request without id) from the peer.
    Notification {
        /// Method name.
        method: String,
        /// Parameters, if any.
        params: Option<Value>,
    },
}

impl IncomingMessage {
    /// Classify a decrypted JSON value.
    ///
    /// A message carrying `method` is a request (with `id`) or notification
    /// (without). Otherwise it must carry an integer `id` and an `error` or
    /// `result` member. An `error` member wins over `result`.
    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Object(mut object) = value else {
            return Err(TelepathError::Protocol("message is not a JSON object".into()));
        };

        if let Some(method) = object.get("method") {
            let method = method
                .as_str()
                .ok_or_else(|| TelepathError::Protocol("method is not a string".into()))?
                .to_string();
            let params = object.remove("params");
            return match object.get("id").and_then(Value::as_u64) {
                Some(id) => Ok(Self::Request(JsonRpcRequest::new(id, method, params))),
                None => Ok(Self::Notification { method, params }),
            };
        }

        let id = object
            .get("id")
            .and_then(Value::as_u64)
            .ok_or_else(|| TelepathError::Protocol("response without integer id".into()))?;

        if let Some(error) = object.remove("error").filter(|e| !e.is_null()) {
            let error: JsonRpcErrorObject = serde_json::from_value(error)
                .map_err(|e| TelepathError::Protocol(format!("malformed error member: {e}")))?;
            return Ok(Self::Response(JsonRpcResponse {
                id,
                outcome: Err(error),
            }));
        }

        match object.remove("result") {
            Some(result) => Ok(Self::Response(JsonRpcResponse::success(id, result))),
            None => Err(TelepathError::Protocol(format!(
                "response {id} has neither result nor error"
            ))),
        }
    }
}

/// Something that can perform a JSON-RPC call against the paired wallet.
///
/// Implemented by [`RequestCorrelator`]; capability providers depend on
/// this trait so they can share one correlator.
#[async_trait]
pub trait RemoteCaller: Send + Sync {
    /// Call `method` with `params` and wait for its result.
    async fn call(&self, method: &str, params: Option<Value>) -> Result<Value>;
}
