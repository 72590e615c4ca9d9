//! Blockchain provider shim.
//!
//! A [`Provider`] answers JSON-RPC calls the way an Ethereum node does.
//! [`SigningProvider`] wraps one: it forwards ordinary calls untouched and
//! turns transaction sends into Telepath `sign` requests, keeping a local
//! pending-nonce counter per account.
//!
//! # Modules
//!
//! - [`http`] - Provider backed by a node's HTTP JSON-RPC endpoint
//! - [`nonce`] - Per-account pending nonce bookkeeping
//! - [`signing`] - The signing proxy

pub mod http;
pub mod nonce;
pub mod signing;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{Result, TelepathError};

pub use http::HttpProvider;
pub use nonce::{NonceCounter, NonceReservation};
pub use signing::SigningProvider;

/// A JSON-RPC endpoint speaking the Ethereum node API.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Perform `method` with positional `params` and return the result.
    async fn request(&self, method: &str, params: Value) -> Result<Value>;
}

/// Parse a JSON-RPC quantity (`"0x2a"` or a plain number).
pub fn parse_quantity(value: &Value) -> Result<u64> {
    match value {
        Value::String(s) => {
            let digits = s
                .strip_prefix("0x")
                .or_else(|| s.strip_prefix("0X"))
                .ok_or_else(|| TelepathError::InvalidParams(format!("quantity '{s}' lacks 0x")))?;
            u64::from_str_radix(digits, 16)
                .map_err(|e| TelepathError::InvalidParams(format!("bad quantity '{s}': {e}")))
        }
        Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| TelepathError::InvalidParams(format!("bad quantity {n}"))),
        other => Err(TelepathError::InvalidParams(format!(
            "quantity must be a string or number, got {other}"
        ))),
    }
}

/// Encode a JSON-RPC quantity (`42` → `"0x2a"`).
pub fn to_quantity(n: u64) -> String {
    format!("{n:#x}")
}
