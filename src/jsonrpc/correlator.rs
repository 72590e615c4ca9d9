//! Request/response correlation over an encrypted channel.
//!
//! # Architecture
//!
//! ```text
//! call("sign") ──► pending[id] = reply_tx ──► channel.send(request)
//!                                                   │
//!       ┌──────────── Poller (single in flight) ◄───┘
//!       │  channel.receive()
//!       ▼
//!  dispatch(response) ──► pending.remove(id) ──► reply_tx.send(outcome)
//! ```
//!
//! Every caller drives the same shared poll cycle. Whichever cycle receives
//! a response hands it to the caller owning that id, so concurrent calls
//! never steal each other's responses.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use async_trait::async_trait;
use rand::Rng;
use serde_json::Value;
use tokio::sync::oneshot;

use super::{IncomingMessage, JsonRpcRequest, RemoteCaller};
use crate::channel::EncryptedChannel;
use crate::error::{Result, TelepathError};
use crate::poller::{Poller, PollerConfig};

/// Upper bound for the randomized starting id (keeps ids within 2^53).
const MAX_INITIAL_ID: u64 = 1 << 52;

/// A request waiting for its response.
struct PendingRequest {
    created_at: Instant,
    method: String,
    reply: oneshot::Sender<Result<Value>>,
}

type PendingMap = Arc<Mutex<HashMap<u64, PendingRequest>>>;

/// Sends JSON-RPC requests over a channel and matches up their responses.
pub struct RequestCorrelator {
    channel: Arc<EncryptedChannel>,
    poller: Poller<u64, TelepathError>,
    next_id: AtomicU64,
    pending: PendingMap,
}

impl std::fmt::Debug for RequestCorrelator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestCorrelator")
            .field("channel", &self.channel)
            .field("pending", &self.pending_count())
            .finish_non_exhaustive()
    }
}

impl RequestCorrelator {
    /// Create a correlator with the default poll budget.
    pub fn new(channel: Arc<EncryptedChannel>) -> Self {
        Self::with_config(channel, PollerConfig::default())
    }

    /// Create a correlator whose response polling uses `config`.
    pub fn with_config(channel: Arc<EncryptedChannel>, config: PollerConfig) -> Self {
        let start = rand::rng().random_range(0..MAX_INITIAL_ID);
        Self::with_initial_id(channel, config, start)
    }

    fn with_initial_id(channel: Arc<EncryptedChannel>, config: PollerConfig, start: u64) -> Self {
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));

        let poll_channel = Arc::clone(&channel);
        let poll_pending = Arc::clone(&pending);
        let poller = Poller::with_config(
            move || {
                let channel = Arc::clone(&poll_channel);
                let pending = Arc::clone(&poll_pending);
                async move { receive_and_dispatch(&channel, &pending).await }
            },
            config,
        );

        Self {
            channel,
            poller,
            next_id: AtomicU64::new(start),
            pending,
        }
    }

    /// The underlying channel.
    pub fn channel(&self) -> &Arc<EncryptedChannel> {
        &self.channel
    }

    /// Number of requests still waiting for a response.
    pub fn pending_count(&self) -> usize {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Send `method` to the wallet and wait for the matching response.
    ///
    /// Fails with [`TelepathError::Remote`] when the wallet answers with an
    /// error, and with [`TelepathError::Timeout`] when the poll budget runs
    /// out first. Transport, decryption and protocol failures are returned
    /// as is.
    ///
    /// Each call waits at least `retries × interval` from its own start,
    /// also when it joined a poll cycle that another call began earlier.
    pub async fn call(&self, method: &str, params: Option<Value>) -> Result<Value> {
        let (id, mut reply) = self.register(method);
        let _pending = PendingGuard {
            pending: &self.pending,
            id,
        };

        let request = JsonRpcRequest::new(id, method, params);
        self.channel.send(&request).await?;
        log::debug!("Sent request {id} ({method})");

        let deadline = Instant::now() + self.poller.interval() * self.poller.retries().max(1);

        loop {
            if let Ok(outcome) = reply.try_recv() {
                return outcome;
            }

            match self.poller.poll().await {
                Ok(Some(_)) => {}
                // Joined a cycle that ran out before this call's own budget did
                Ok(None) if Instant::now() < deadline => {}
                Ok(None) => {
                    return reply.try_recv().unwrap_or_else(|_| {
                        log::warn!("No response to request {id} ({method})");
                        Err(TelepathError::Timeout { id })
                    });
                }
                Err(e) => return reply.try_recv().unwrap_or(Err(e)),
            }
        }
    }

    /// Allocate an id and register its pending entry.
    fn register(&self, method: &str) -> (u64, oneshot::Receiver<Result<Value>>) {
        let (tx, rx) = oneshot::channel();
        let mut pending = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let mut id = self.next_id.fetch_add(1, Ordering::Relaxed);
        while pending.contains_key(&id) {
            id = self.next_id.fetch_add(1, Ordering::Relaxed);
        }

        pending.insert(
            id,
            PendingRequest {
                created_at: Instant::now(),
                method: method.to_string(),
                reply: tx,
            },
        );
        (id, rx)
    }
}

#[async_trait]
impl RemoteCaller for RequestCorrelator {
    async fn call(&self, method: &str, params: Option<Value>) -> Result<Value> {
        RequestCorrelator::call(self, method, params).await
    }
}

/// Removes a pending entry when its call finishes or is abandoned.
struct PendingGuard<'a> {
    pending: &'a PendingMap,
    id: u64,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.id);
    }
}

/// One poll attempt: receive a message and deliver it to its caller.
///
/// Yields the id of the request that was resolved, or `None` if nothing
/// arrived or the message was not for any pending request.
///
/// A message that is not valid JSON-RPC is a [`TelepathError::Protocol`].
/// If its `id` names a pending request, that request fails with it;
/// otherwise the error ends the poll cycle.
async fn receive_and_dispatch(
    channel: &EncryptedChannel,
    pending: &PendingMap,
) -> Result<Option<u64>> {
    let Some(value) = channel.receive().await? else {
        return Ok(None);
    };

    let raw_id = value.get("id").and_then(Value::as_u64);
    let response = match IncomingMessage::from_value(value) {
        Ok(IncomingMessage::Response(response)) => response,
        Ok(IncomingMessage::Request(request)) => {
            log::warn!("Ignoring request '{}' from wallet", request.method);
            return Ok(None);
        }
        Ok(IncomingMessage::Notification { method, .. }) => {
            log::warn!("Ignoring notification '{method}' from wallet");
            return Ok(None);
        }
        Err(e) => {
            let owner = raw_id.and_then(|id| {
                pending
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .remove(&id)
            });
            return match owner {
                Some(entry) => {
                    log::warn!("Malformed response to {}: {e}", entry.method);
                    let _ = entry.reply.send(Err(e));
                    Ok(raw_id)
                }
                None => Err(e),
            };
        }
    };

    let entry = pending
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .remove(&response.id);

    match entry {
        Some(entry) => {
            log::debug!(
                "Response to request {} ({}) after {:?}",
                response.id,
                entry.method,
                entry.created_at.elapsed()
            );
            let id = response.id;
            // Receiver gone means the caller was dropped; nothing to do
            let _ = entry.reply.send(response.into_result());
            Ok(Some(id))
        }
        None => {
            log::warn!("Dropping response for unknown request {}", response.id);
            Ok(None)
        }
    }
}
