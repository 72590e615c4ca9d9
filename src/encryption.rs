//! Encryption capability of a Telepath wallet.
//!
//! The wallet holds RSA key pairs identified by a tag. Key creation,
//! public key retrieval and decryption are remote calls; encryption only
//! needs the public key and happens locally.

use std::sync::Arc;

use aes_gcm::aead::OsRng;
use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::pkcs8::DecodePublicKey;
use rsa::{Oaep, RsaPublicKey};
use serde_json::{json, Value};
use sha1::Sha1;

use crate::error::{Result, TelepathError};
use crate::jsonrpc::RemoteCaller;

/// Client for the wallet's encryption key store.
pub struct EncryptionProxy {
    wallet: Arc<dyn RemoteCaller>,
}

impl std::fmt::Debug for EncryptionProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptionProxy").finish_non_exhaustive()
    }
}

impl EncryptionProxy {
    /// Use `wallet` for the remote operations.
    pub fn new(wallet: Arc<dyn RemoteCaller>) -> Self {
        Self { wallet }
    }

    /// Ask the wallet for a new key pair. Returns its tag.
    pub async fn create_new_key_pair(&self) -> Result<String> {
        let tag = self.wallet.call("createEncryptionKeyPair", None).await?;
        expect_string("createEncryptionKeyPair", tag)
    }

    /// PEM-encoded public key of the key pair `tag`.
    pub async fn get_public_key(&self, tag: &str) -> Result<String> {
        let pem = self
            .wallet
            .call("getEncryptionPublicKey", Some(json!([{ "tag": tag }])))
            .await?;
        expect_string("getEncryptionPublicKey", pem)
    }

    /// Have the wallet decrypt `cipher_text` with the private key `tag`.
    pub async fn decrypt(&self, tag: &str, cipher_text: &str) -> Result<String> {
        let plain_text = self
            .wallet
            .call(
                "decrypt",
                Some(json!([{ "tag": tag, "cipherText": cipher_text }])),
            )
            .await?;
        expect_string("decrypt", plain_text)
    }

    /// Encrypt `plain_text` for the key pair `tag` (RSA-OAEP, SHA-1).
    ///
    /// Only the public key is fetched from the wallet.
    pub async fn encrypt(&self, tag: &str, plain_text: &[u8]) -> Result<Vec<u8>> {
        let pem = self.get_public_key(tag).await?;
        encrypt_with_pem(&pem, plain_text)
    }
}

/// RSA-OAEP encrypt `plain_text` under a PEM public key (SPKI or PKCS#1).
pub fn encrypt_with_pem(pem: &str, plain_text: &[u8]) -> Result<Vec<u8>> {
    let key = RsaPublicKey::from_public_key_pem(pem)
        .or_else(|_| RsaPublicKey::from_pkcs1_pem(pem))
        .map_err(|e| TelepathError::Encryption(format!("invalid public key: {e}")))?;
    key.encrypt(&mut OsRng, Oaep::new::<Sha1>(), plain_text)
        .map_err(|e| TelepathError::Encryption(format!("RSA encryption failed: {e}")))
}

fn expect_string(method: &str, value: Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s),
        other => Err(TelepathError::Protocol(format!(
            "{method} returned {other}, expected a string"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rsa::pkcs8::{EncodePublicKey, LineEnding};
    use rsa::RsaPrivateKey;
    use std::sync::Mutex;

    struct FakeWallet {
        outcome: Result<Value>,
        requests: Mutex<Vec<(String, Option<Value>)>>,
    }

    impl FakeWallet {
        fn new(outcome: Result<Value>) -> Arc<Self> {
            Arc::new(Self {
                outcome,
                requests: Mutex::new(Vec::new()),
            })
        }

        fn last_request(&self) -> (String, Option<Value>) {
            self.requests.lock().unwrap().last().cloned().unwrap()
        }
    }

    #[async_trait]
    impl RemoteCaller for FakeWallet {
        async fn call(&self, method: &str, params: Option<Value>) -> Result<Value> {
            self.requests
                .lock()
                .unwrap()
                .push((method.to_string(), params));
            self.outcome.clone()
        }
    }

    fn remote_error() -> TelepathError {
        TelepathError::Remote {
            code: -42,
            message: "some error".into(),
            data: None,
        }
    }

    #[tokio::test]
    async fn test_create_new_key_pair() {
        let wallet = FakeWallet::new(Ok(json!("some tag")));
        let proxy = EncryptionProxy::new(wallet.clone());

        assert_eq!(proxy.create_new_key_pair().await.unwrap(), "some tag");
        assert_eq!(
            wallet.last_request(),
            ("createEncryptionKeyPair".to_string(), None)
        );
    }

    #[tokio::test]
    async fn test_get_public_key() {
        let wallet = FakeWallet::new(Ok(json!("the public key")));
        let proxy = EncryptionProxy::new(wallet.clone());

        assert_eq!(
            proxy.get_public_key("some tag").await.unwrap(),
            "the public key"
        );
        assert_eq!(
            wallet.last_request(),
            (
                "getEncryptionPublicKey".to_string(),
                Some(json!([{ "tag": "some tag" }]))
            )
        );
    }

    #[tokio::test]
    async fn test_decrypt() {
        let wallet = FakeWallet::new(Ok(json!("plain text")));
        let proxy = EncryptionProxy::new(wallet.clone());

        assert_eq!(
            proxy.decrypt("some tag", "cipher text").await.unwrap(),
            "plain text"
        );
        assert_eq!(
            wallet.last_request(),
            (
                "decrypt".to_string(),
                Some(json!([{ "tag": "some tag", "cipherText": "cipher text" }]))
            )
        );
    }

    #[tokio::test]
    async fn test_remote_errors_carry_message() {
        let proxy = EncryptionProxy::new(FakeWallet::new(Err(remote_error())));

        for err in [
            proxy.create_new_key_pair().await.unwrap_err(),
            proxy.get_public_key("tag").await.unwrap_err(),
            proxy.decrypt("tag", "data").await.unwrap_err(),
        ] {
            assert!(err.is_remote());
            assert!(err.to_string().contains("some error"));
        }
    }

    #[tokio::test]
    async fn test_non_string_result_is_protocol_error() {
        let proxy = EncryptionProxy::new(FakeWallet::new(Ok(json!(42))));
        assert!(matches!(
            proxy.create_new_key_pair().await,
            Err(TelepathError::Protocol(_))
        ));
    }

    #[tokio::test]
    async fn test_encrypt_locally_with_wallet_public_key() {
        let private_key = RsaPrivateKey::new(&mut OsRng, 1024).unwrap();
        let pem = private_key
            .to_public_key()
            .to_public_key_pem(LineEnding::LF)
            .unwrap();
        let wallet = FakeWallet::new(Ok(json!(pem)));
        let proxy = EncryptionProxy::new(wallet.clone());

        let cipher_text = proxy.encrypt("some tag", b"secret message").await.unwrap();

        let plain_text = private_key
            .decrypt(Oaep::new::<Sha1>(), &cipher_text)
            .unwrap();
        assert_eq!(plain_text, b"secret message");
        // Only the public key is requested; nothing is decrypted remotely
        assert_eq!(wallet.requests.lock().unwrap().len(), 1);
        assert_eq!(wallet.last_request().0, "getEncryptionPublicKey");
    }

    #[tokio::test]
    async fn test_encrypt_with_invalid_key_fails() {
        let proxy = EncryptionProxy::new(FakeWallet::new(Ok(json!("the public key"))));
        assert!(matches!(
            proxy.encrypt("some tag", b"data").await,
            Err(TelepathError::Encryption(_))
        ));
    }
}
