//! Application-wide constants for Telepath.
//!
//! # Categories
//!
//! - **Relay**: queuing service location and queue naming
//! - **Pairing**: pairing link defaults
//! - **Polling**: poller defaults
//! - **Crypto**: key and nonce sizes
//! - **JSON-RPC**: protocol constants

use std::time::Duration;

// ============================================================================
// Relay
// ============================================================================

/// Default base URL of the Telepath queuing service.
pub const DEFAULT_QUEUING_URL: &str = "https://telepath.cogito.mobi";

/// HTTP client request timeout for relay and node calls.
pub const HTTP_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Queue suffix carrying consumer → wallet traffic.
pub const QUEUE_SUFFIX_RED: &str = "red";

/// Queue suffix carrying wallet → consumer traffic.
pub const QUEUE_SUFFIX_BLUE: &str = "blue";

// ============================================================================
// Pairing
// ============================================================================

/// Default base of generated pairing links; the wallet app opens these.
pub const DEFAULT_CONNECT_URL: &str = "https://cogito.mobi/applinks/telepath/connect";

// ============================================================================
// Polling
// ============================================================================

/// Default number of attempts per poll cycle.
pub const DEFAULT_POLL_RETRIES: u32 = 10;

/// Default delay between poll attempts.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

// ============================================================================
// Crypto
// ============================================================================

/// Shared key size for AES-256-GCM (256 bits = 32 bytes).
pub const SHARED_KEY_SIZE: usize = 32;

/// Nonce size for AES-GCM (96 bits = 12 bytes).
pub const NONCE_SIZE: usize = 12;

/// Length of generated channel identifiers, in random bytes.
pub const CHANNEL_ID_BYTES: usize = 16;

// ============================================================================
// JSON-RPC
// ============================================================================

/// JSON-RPC protocol version string.
pub const JSONRPC_VERSION: &str = "2.0";
