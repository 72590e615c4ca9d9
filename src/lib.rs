//! Telepath - encrypted relay channel to a mobile identity wallet.
//!
//! A capability consumer (typically a JSON-RPC blockchain provider) asks a
//! wallet it is not directly connected to for signatures, public keys and
//! decryptions. Both ends share a channel id and a symmetric key from a
//! one-time pairing URL; messages travel through an untrusted queuing
//! service that only ever sees ciphertext.
//!
//! # Architecture
//!
//! ```text
//! SigningProvider / EncryptionProxy
//!          │ call(method, params)
//!          ▼
//! RequestCorrelator ── Poller (bounded retries, single in-flight cycle)
//!          │ send / receive
//!          ▼
//! EncryptedChannel (AES-256-GCM, key from PairingSecret)
//!          │ opaque bytes
//!          ▼
//! QueuingService ──HTTP──► relay ◄──HTTP── wallet
//! ```
//!
//! # Modules
//!
//! - [`pairing`] - Pairing URL parsing and secret generation
//! - [`queuing`] - Relay queue transport
//! - [`channel`] - Encrypted channel over the relay
//! - [`poller`] - Bounded-retry polling
//! - [`jsonrpc`] - JSON-RPC messages and request correlation
//! - [`provider`] - Signing proxy for blockchain providers
//! - [`encryption`] - Encryption capability client
//! - [`config`] - Configuration loading/saving

pub mod channel;
pub mod config;
pub mod constants;
pub mod crypto;
pub mod encryption;
pub mod error;
pub mod jsonrpc;
pub mod pairing;
pub mod poller;
pub mod provider;
pub mod qr;
pub mod queuing;

// Re-export commonly used types
pub use channel::{ChannelSide, EncryptedChannel};
pub use config::Config;
pub use encryption::EncryptionProxy;
pub use error::{Result, TelepathError};
pub use jsonrpc::{RemoteCaller, RequestCorrelator};
pub use pairing::{PairingSecret, SharedKey};
pub use poller::{Poller, PollerConfig};
pub use provider::{HttpProvider, Provider, SigningProvider};
pub use queuing::{InMemoryQueue, QueuingService, QueuingServiceClient};
