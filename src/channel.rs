//! Encrypted Telepath channel.
//!
//! `EncryptedChannel` seals JSON messages under the pairing secret and moves
//! them through a [`QueuingService`]. The relay only ever sees base64url
//! text of AES-GCM envelopes.
//!
//! # Message Flow
//!
//! ```text
//! send:    JSON ─► UTF-8 ─► seal ─► base64url ─► POST {id}.{outbound}
//! receive: GET {id}.{inbound} ─► base64url ─► open ─► UTF-8 ─► JSON
//! ```
//!
//! Each channel uses two queues so neither side reads back its own
//! messages: the consumer writes `red` and reads `blue`, the wallet the
//! opposite.

use std::sync::Arc;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD as BASE64URL, Engine};
use serde::Serialize;
use serde_json::Value;

use crate::constants::{QUEUE_SUFFIX_BLUE, QUEUE_SUFFIX_RED};
use crate::crypto;
use crate::error::{Result, TelepathError};
use crate::pairing::PairingSecret;
use crate::queuing::{short_id, QueuingService};

/// Which end of the channel this instance represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelSide {
    /// The capability consumer (browser/provider side).
    #[default]
    Consumer,
    /// The identity wallet.
    Wallet,
}

impl ChannelSide {
    fn outbound_suffix(self) -> &'static str {
        match self {
            Self::Consumer => QUEUE_SUFFIX_RED,
            Self::Wallet => QUEUE_SUFFIX_BLUE,
        }
    }

    fn inbound_suffix(self) -> &'static str {
        match self {
            Self::Consumer => QUEUE_SUFFIX_BLUE,
            Self::Wallet => QUEUE_SUFFIX_RED,
        }
    }
}

/// End-to-end encrypted channel over an untrusted relay.
pub struct EncryptedChannel {
    secret: PairingSecret,
    side: ChannelSide,
    queuing: Arc<dyn QueuingService>,
}

impl std::fmt::Debug for EncryptedChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptedChannel")
            .field("channel_id", &short_id(self.secret.channel_id()))
            .field("side", &self.side)
            .finish_non_exhaustive()
    }
}

impl EncryptedChannel {
    /// Create the consumer end of a channel.
    pub fn new(secret: PairingSecret, queuing: Arc<dyn QueuingService>) -> Self {
        Self::with_side(secret, ChannelSide::Consumer, queuing)
    }

    /// Create a channel end for `side`.
    pub fn with_side(
        secret: PairingSecret,
        side: ChannelSide,
        queuing: Arc<dyn QueuingService>,
    ) -> Self {
        log::info!(
            "Opened telepath channel {} as {:?}",
            short_id(secret.channel_id()),
            side
        );
        Self {
            secret,
            side,
            queuing,
        }
    }

    /// Parse `link` and open the consumer end of its channel.
    pub fn from_link(link: &str, queuing: Arc<dyn QueuingService>) -> Result<Self> {
        Ok(Self::new(PairingSecret::parse(link)?, queuing))
    }

    /// Channel identifier.
    pub fn id(&self) -> &str {
        self.secret.channel_id()
    }

    /// Which end this instance represents.
    pub fn side(&self) -> ChannelSide {
        self.side
    }

    /// Pairing link for this channel under `base_url`.
    pub fn connect_url(&self, base_url: &str) -> String {
        self.secret.connect_url(base_url)
    }

    /// Serialize, encrypt and send `message` to the peer.
    pub async fn send<T: Serialize + ?Sized>(&self, message: &T) -> Result<()> {
        let plaintext = serde_json::to_vec(message)
            .map_err(|e| TelepathError::Encryption(format!("cannot serialize message: {e}")))?;
        let envelope = crypto::seal(self.secret.shared_key(), &plaintext)?;
        let body = BASE64URL.encode(envelope);

        self.queuing
            .send(&self.queue_id(self.side.outbound_suffix()), body.as_bytes())
            .await
    }

    /// Receive and decrypt the next message from the peer, if one is waiting.
    ///
    /// A payload that is present but cannot be decoded is a
    /// [`TelepathError::Decryption`], never `None`.
    pub async fn receive(&self) -> Result<Option<Value>> {
        let Some(body) = self
            .queuing
            .receive(&self.queue_id(self.side.inbound_suffix()))
            .await?
        else {
            return Ok(None);
        };

        self.open(&body).map(Some)
    }

    fn open(&self, body: &[u8]) -> Result<Value> {
        let text = std::str::from_utf8(body)
            .map_err(|e| TelepathError::Decryption(format!("payload is not UTF-8: {e}")))?;
        let envelope = BASE64URL
            .decode(text.trim().trim_end_matches('='))
            .map_err(|e| TelepathError::Decryption(format!("payload is not base64url: {e}")))?;
        let plaintext = crypto::open(self.secret.shared_key(), &envelope)?;

        serde_json::from_slice(&plaintext)
            .map_err(|e| TelepathError::Decryption(format!("payload is not JSON: {e}")))
    }

    fn queue_id(&self, suffix: &str) -> String {
        format!("{}.{}", self.secret.channel_id(), suffix)
    }
}
