//! Error taxonomy for Telepath operations.
//!
//! Every failure a capability caller can observe is one of these variants.
//! Lower layers (transport, encryption) never retry; the poller decides
//! whether an operation is attempted again.
//!
//! Errors are `Clone` because a single poll cycle may be shared by several
//! callers, and each of them receives the same failure.

use serde_json::Value;

/// Errors that can occur while pairing, relaying or correlating messages.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TelepathError {
    /// Pairing URL is missing its fragment, a required key, or has a malformed value.
    #[error("invalid pairing link: {0}")]
    InvalidPairingLink(String),

    /// Relay unreachable or answered with an unexpected status.
    #[error("transport error: {0}")]
    Transport(String),

    /// Outgoing message could not be serialized or sealed.
    #[error("encryption failed: {0}")]
    Encryption(String),

    /// Incoming payload could not be decoded, authenticated or parsed.
    #[error("decryption failed: {0}")]
    Decryption(String),

    /// Peer answered with an explicit JSON-RPC error.
    #[error("remote error {code}: {message}")]
    Remote {
        /// JSON-RPC error code supplied by the peer.
        code: i64,
        /// Human readable message supplied by the peer.
        message: String,
        /// Optional structured error data.
        data: Option<Value>,
    },

    /// Polling exhausted its retries without a matching response.
    #[error("timed out waiting for response to request {id}")]
    Timeout {
        /// Id of the request that went unanswered.
        id: u64,
    },

    /// External blockchain node failed or returned an error.
    #[error("node error: {0}")]
    Node(String),

    /// Caller supplied parameters that cannot be processed.
    #[error("invalid params: {0}")]
    InvalidParams(String),

    /// Peer sent a message that violates the JSON-RPC protocol.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl TelepathError {
    /// Returns `true` for failures reported by the wallet itself.
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote { .. })
    }

    /// Returns `true` when the call gave up waiting for a response.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, TelepathError>;
