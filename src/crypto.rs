//! AES-256-GCM sealing for relay payloads.
//!
//! # Wire Format
//!
//! A sealed envelope is the raw byte concatenation
//!
//! ```text
//! nonce (12 bytes) || ciphertext || tag (16 bytes)
//! ```
//!
//! A fresh random nonce is drawn for every message, so the same plaintext
//! never produces the same envelope twice.

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};

use crate::constants::NONCE_SIZE;
use crate::error::{Result, TelepathError};
use crate::pairing::SharedKey;

/// Authentication tag appended by AES-GCM.
const TAG_SIZE: usize = 16;

/// Seal `plaintext` under `key`, returning `nonce || ciphertext`.
pub fn seal(key: &SharedKey, plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| TelepathError::Encryption(format!("invalid key: {e}")))?;
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|e| TelepathError::Encryption(e.to_string()))?;

    let mut envelope = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    envelope.extend_from_slice(&nonce);
    envelope.extend_from_slice(&ciphertext);
    Ok(envelope)
}

/// Open an envelope produced by [`seal`].
pub fn open(key: &SharedKey, envelope: &[u8]) -> Result<Vec<u8>> {
    if envelope.len() < NONCE_SIZE + TAG_SIZE {
        return Err(TelepathError::Decryption(format!(
            "envelope too short ({} bytes)",
            envelope.len()
        )));
    }

    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| TelepathError::Decryption(format!("invalid key: {e}")))?;
    let (nonce_bytes, ciphertext) = envelope.split_at(NONCE_SIZE);

    cipher
        .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
        .map_err(|e| TelepathError::Decryption(e.to_string()))
}
