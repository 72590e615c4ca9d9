//! Queuing service transport.
//!
//! The relay is an untrusted store-and-forward HTTP queue. It is addressed
//! by queue id and speaks a two-call protocol:
//!
//! ```text
//! POST {base}/{queue_id}   body = payload     → 2xx accepted
//! GET  {base}/{queue_id}                      → 200 + payload | 204 (empty)
//! ```
//!
//! Calls are one-shot. Retrying is the poller's job, never this layer's.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;

use crate::constants::{DEFAULT_QUEUING_URL, HTTP_REQUEST_TIMEOUT};
use crate::error::{Result, TelepathError};

/// Send/receive access to relay queues.
#[async_trait]
pub trait QueuingService: Send + Sync {
    /// Append `payload` to the queue `queue_id`.
    async fn send(&self, queue_id: &str, payload: &[u8]) -> Result<()>;

    /// Take the next waiting payload from `queue_id`, or `None` if the queue is empty.
    async fn receive(&self, queue_id: &str) -> Result<Option<Vec<u8>>>;
}

/// HTTP client for the Telepath queuing service.
#[derive(Debug, Clone)]
pub struct QueuingServiceClient {
    client: reqwest::Client,
    base_url: String,
}

impl Default for QueuingServiceClient {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUING_URL)
    }
}

impl QueuingServiceClient {
    /// Create a client for the relay at `base_url`.
    pub fn new(base_url: &str) -> Self {
        Self::with_timeout(base_url, HTTP_REQUEST_TIMEOUT)
    }

    /// Create a client with a custom per-request timeout.
    pub fn with_timeout(base_url: &str, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                log::warn!("Failed to build relay HTTP client ({e}), using defaults");
                reqwest::Client::new()
            });
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Base URL of the relay.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn queue_url(&self, queue_id: &str) -> String {
        format!("{}/{}", self.base_url, queue_id)
    }
}

#[async_trait]
impl QueuingService for QueuingServiceClient {
    async fn send(&self, queue_id: &str, payload: &[u8]) -> Result<()> {
        let response = self
            .client
            .post(self.queue_url(queue_id))
            .body(payload.to_vec())
            .send()
            .await
            .map_err(|e| TelepathError::Transport(format!("failed to reach relay: {e}")))?;

        if !response.status().is_success() {
            return Err(TelepathError::Transport(format!(
                "relay rejected message: {}",
                response.status()
            )));
        }

        log::debug!("Queued {} bytes on {}", payload.len(), short_id(queue_id));
        Ok(())
    }

    async fn receive(&self, queue_id: &str) -> Result<Option<Vec<u8>>> {
        let response = self
            .client
            .get(self.queue_url(queue_id))
            .send()
            .await
            .map_err(|e| TelepathError::Transport(format!("failed to reach relay: {e}")))?;

        match response.status() {
            StatusCode::NO_CONTENT => Ok(None),
            status if status.is_success() => {
                let body = response.bytes().await.map_err(|e| {
                    TelepathError::Transport(format!("failed to read relay response: {e}"))
                })?;
                log::debug!("Received {} bytes from {}", body.len(), short_id(queue_id));
                Ok(Some(body.to_vec()))
            }
            status => Err(TelepathError::Transport(format!(
                "relay receive failed: {status}"
            ))),
        }
    }
}

/// In-process relay holding one FIFO per queue id.
///
/// Behaves like the HTTP relay (each receive consumes one message) and is
/// used to run both ends of a channel inside one process.
#[derive(Debug, Default)]
pub struct InMemoryQueue {
    queues: Mutex<HashMap<String, VecDeque<Vec<u8>>>>,
}

impl InMemoryQueue {
    /// Create an empty relay.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of messages waiting on `queue_id`.
    pub fn len(&self, queue_id: &str) -> usize {
        self.queues
            .lock()
            .map(|queues| queues.get(queue_id).map_or(0, VecDeque::len))
            .unwrap_or(0)
    }

    /// Returns `true` if no message is waiting on `queue_id`.
    pub fn is_empty(&self, queue_id: &str) -> bool {
        self.len(queue_id) == 0
    }
}

#[async_trait]
impl QueuingService for InMemoryQueue {
    async fn send(&self, queue_id: &str, payload: &[u8]) -> Result<()> {
        let mut queues = self
            .queues
            .lock()
            .map_err(|e| TelepathError::Transport(format!("queue lock poisoned: {e}")))?;
        queues
            .entry(queue_id.to_string())
            .or_default()
            .push_back(payload.to_vec());
        Ok(())
    }

    async fn receive(&self, queue_id: &str) -> Result<Option<Vec<u8>>> {
        let mut queues = self
            .queues
            .lock()
            .map_err(|e| TelepathError::Transport(format!("queue lock poisoned: {e}")))?;
        Ok(queues.get_mut(queue_id).and_then(VecDeque::pop_front))
    }
}

/// Truncate a queue id to its first 8 characters for log lines.
pub(crate) fn short_id(id: &str) -> &str {
    id.char_indices().nth(8).map_or(id, |(end, _)| &id[..end])
}
