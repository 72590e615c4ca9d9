//! Signing proxy.
//!
//! `SigningProvider` sits in front of a node [`Provider`]. Transaction sends
//! are completed locally (default `value`, pending nonce), signed by the
//! wallet over Telepath and submitted to the node as raw transactions.
//! Everything else goes to the node unchanged.
//!
//! # Transaction Flow
//!
//! ```text
//! eth_sendTransaction(tx)
//!   ├── value missing  → "0x0"
//!   ├── nonce missing  → NonceCounter (seeded by eth_getTransactionCount(from, "pending"))
//!   ├── wallet: sign([tx])                → signed
//!   ├── node:   eth_sendRawTransaction([signed]) → hash
//!   └── commit nonce, return hash
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use super::nonce::NonceCounter;
use super::{parse_quantity, to_quantity, Provider};
use crate::error::{Result, TelepathError};
use crate::jsonrpc::RemoteCaller;

/// How a provider method is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderMethod {
    /// Sign through the wallet, then submit as a raw transaction.
    SendTransaction,
    /// Ask the wallet for its accounts.
    Accounts,
    /// Forward to the node untouched.
    PassThrough,
}

/// Methods handled by the proxy instead of the node.
const INTERCEPTED: &[(&str, ProviderMethod)] = &[
    ("eth_sendTransaction", ProviderMethod::SendTransaction),
    ("eth_accounts", ProviderMethod::Accounts),
];

impl ProviderMethod {
    /// Look up the handling for `method`.
    pub fn for_method(method: &str) -> Self {
        INTERCEPTED
            .iter()
            .find(|(name, _)| *name == method)
            .map_or(Self::PassThrough, |(_, kind)| *kind)
    }
}

/// Wallet method that signs a transaction.
const SIGN_METHOD: &str = "sign";

/// Wallet method listing the identity's accounts.
const ACCOUNTS_METHOD: &str = "accounts";

/// Provider shim that signs transactions through a Telepath wallet.
pub struct SigningProvider {
    node: Arc<dyn Provider>,
    wallet: Arc<dyn RemoteCaller>,
    nonces: NonceCounter,
}

impl std::fmt::Debug for SigningProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningProvider")
            .field("nonces", &self.nonces)
            .finish_non_exhaustive()
    }
}

impl SigningProvider {
    /// Wrap `node`, signing through `wallet`.
    pub fn new(node: Arc<dyn Provider>, wallet: Arc<dyn RemoteCaller>) -> Self {
        Self {
            node,
            wallet,
            nonces: NonceCounter::new(),
        }
    }

    /// The pending-nonce bookkeeping of this provider.
    pub fn nonces(&self) -> &NonceCounter {
        &self.nonces
    }

    /// Complete, sign and submit a transaction. Returns the node's result
    /// (the transaction hash).
    pub async fn send_transaction(&self, transaction: Value) -> Result<Value> {
        let Value::Object(mut tx) = transaction else {
            return Err(TelepathError::InvalidParams(
                "transaction must be an object".into(),
            ));
        };

        tx.entry("value").or_insert_with(|| json!("0x0"));

        if tx.get("nonce").is_some_and(|n| !n.is_null()) {
            return self.sign_and_submit(tx).await;
        }

        let from = tx
            .get("from")
            .and_then(Value::as_str)
            .ok_or_else(|| TelepathError::InvalidParams("transaction has no 'from'".into()))?
            .to_string();

        let reservation = self
            .nonces
            .reserve(&from, || self.pending_transaction_count(&from))
            .await?;
        tx.insert("nonce".into(), json!(to_quantity(reservation.nonce())));

        let result = self.sign_and_submit(tx).await?;
        reservation.commit();
        Ok(result)
    }

    async fn sign_and_submit(&self, tx: Map<String, Value>) -> Result<Value> {
        let signed = self
            .wallet
            .call(SIGN_METHOD, Some(json!([Value::Object(tx)])))
            .await?;
        if !signed.is_string() {
            return Err(TelepathError::Protocol(format!(
                "wallet returned a non-string signed transaction: {signed}"
            )));
        }
        log::debug!("Wallet signed transaction");

        self.node
            .request("eth_sendRawTransaction", json!([signed]))
            .await
    }

    async fn pending_transaction_count(&self, from: &str) -> Result<u64> {
        let count = self
            .node
            .request("eth_getTransactionCount", json!([from, "pending"]))
            .await?;
        parse_quantity(&count)
            .map_err(|e| TelepathError::Node(format!("unusable transaction count: {e}")))
    }
}

#[async_trait]
impl Provider for SigningProvider {
    async fn request(&self, method: &str, params: Value) -> Result<Value> {
        match ProviderMethod::for_method(method) {
            ProviderMethod::SendTransaction => {
                let transaction = params
                    .as_array()
                    .and_then(|p| p.first())
                    .cloned()
                    .ok_or_else(|| {
                        TelepathError::InvalidParams(format!("{method} expects [transaction]"))
                    })?;
                self.send_transaction(transaction).await
            }
            ProviderMethod::Accounts => self.wallet.call(ACCOUNTS_METHOD, None).await,
            ProviderMethod::PassThrough => self.node.request(method, params).await,
        }
    }
}
