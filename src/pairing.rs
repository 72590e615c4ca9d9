//! Pairing links.
//!
//! A pairing link is the one-time URL that introduces the wallet to the
//! consumer. Everything secret lives in the URL fragment, which browsers
//! never send to a server:
//!
//! ```text
//! https://example.com/telepath/connect#I=<channel id>&E=<base64url key>
//! ```
//!
//! Both keys are required. A link missing either one, or carrying a value
//! that does not decode, is rejected as a whole.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD as BASE64URL, Engine};
use rand::RngCore;
use reqwest::Url;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::constants::{CHANNEL_ID_BYTES, SHARED_KEY_SIZE};
use crate::error::{Result, TelepathError};

/// Fragment key carrying the channel identifier.
const ID_KEY: &str = "I";

/// Fragment key carrying the encryption key.
const KEY_KEY: &str = "E";

/// Symmetric key shared by both ends of a channel. Zeroed on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SharedKey([u8; SHARED_KEY_SIZE]);

impl SharedKey {
    /// Wrap raw key bytes.
    pub fn from_bytes(bytes: [u8; SHARED_KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; SHARED_KEY_SIZE] {
        &self.0
    }

    fn to_base64url(&self) -> String {
        BASE64URL.encode(self.0)
    }
}

impl std::fmt::Debug for SharedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SharedKey(<redacted>)")
    }
}

/// Channel identifier and shared key extracted from a pairing link.
#[derive(Debug)]
pub struct PairingSecret {
    channel_id: String,
    shared_key: SharedKey,
}

impl PairingSecret {
    /// Build a secret from its parts, validating the channel id.
    pub fn new(channel_id: impl Into<String>, shared_key: SharedKey) -> Result<Self> {
        let channel_id = channel_id.into();
        validate_channel_id(&channel_id)?;
        Ok(Self {
            channel_id,
            shared_key,
        })
    }

    /// Create a fresh random channel id and key.
    pub fn generate() -> Self {
        let mut rng = rand::rng();

        let mut id_bytes = [0u8; CHANNEL_ID_BYTES];
        rng.fill_bytes(&mut id_bytes);

        let mut key_bytes = [0u8; SHARED_KEY_SIZE];
        rng.fill_bytes(&mut key_bytes);
        let shared_key = SharedKey::from_bytes(key_bytes);
        key_bytes.zeroize();

        Self {
            channel_id: BASE64URL.encode(id_bytes),
            shared_key,
        }
    }

    /// Parse a pairing link.
    ///
    /// Fails with [`TelepathError::InvalidPairingLink`] when the URL does not
    /// parse, has no fragment, or lacks a valid `I` or `E` value.
    pub fn parse(link: &str) -> Result<Self> {
        let url = Url::parse(link)
            .map_err(|e| TelepathError::InvalidPairingLink(format!("not a URL: {e}")))?;
        let fragment = url
            .fragment()
            .ok_or_else(|| TelepathError::InvalidPairingLink("missing fragment".into()))?;
        Self::from_fragment(fragment)
    }

    /// Parse the bare fragment part (`I=...&E=...`) of a pairing link.
    pub fn from_fragment(fragment: &str) -> Result<Self> {
        let mut channel_id = None;
        let mut encoded_key = None;

        for pair in fragment.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').ok_or_else(|| {
                TelepathError::InvalidPairingLink(format!("malformed fragment entry '{pair}'"))
            })?;
            match key {
                ID_KEY => channel_id = Some(value),
                KEY_KEY => encoded_key = Some(value),
                _ => {}
            }
        }

        let channel_id = channel_id
            .ok_or_else(|| TelepathError::InvalidPairingLink("missing channel id (I)".into()))?;
        let encoded_key = encoded_key
            .ok_or_else(|| TelepathError::InvalidPairingLink("missing key (E)".into()))?;

        Self::new(channel_id, decode_key(encoded_key)?)
    }

    /// Fragment encoding of this secret, without the leading `#`.
    pub fn fragment(&self) -> String {
        format!(
            "{ID_KEY}={}&{KEY_KEY}={}",
            self.channel_id,
            self.shared_key.to_base64url()
        )
    }

    /// Full pairing link for this secret under `base_url`.
    pub fn connect_url(&self, base_url: &str) -> String {
        format!("{}#{}", base_url.trim_end_matches('#'), self.fragment())
    }

    /// The channel identifier.
    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    /// The shared encryption key.
    pub fn shared_key(&self) -> &SharedKey {
        &self.shared_key
    }
}

fn validate_channel_id(id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(TelepathError::InvalidPairingLink("empty channel id".into()));
    }
    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(TelepathError::InvalidPairingLink(format!(
            "channel id contains invalid characters: '{id}'"
        )));
    }
    Ok(())
}

fn decode_key(encoded: &str) -> Result<SharedKey> {
    // Tolerate padded base64url as produced by some encoders
    let mut bytes = BASE64URL
        .decode(encoded.trim_end_matches('='))
        .map_err(|e| TelepathError::InvalidPairingLink(format!("key is not base64url: {e}")))?;

    let key: [u8; SHARED_KEY_SIZE] = bytes.as_slice().try_into().map_err(|_| {
        TelepathError::InvalidPairingLink(format!(
            "key must be {SHARED_KEY_SIZE} bytes, got {}",
            bytes.len()
        ))
    })?;
    bytes.zeroize();
    Ok(SharedKey::from_bytes(key))
}
