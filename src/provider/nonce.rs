//! Per-account pending nonce bookkeeping.
//!
//! The counter remembers, per address, the next nonce this provider will
//! assign. An account's entry is seeded lazily from the node's pending
//! transaction count and only ever moves forward.
//!
//! Assigning a nonce is a two-step reservation: [`NonceCounter::reserve`]
//! locks the account and yields the nonce to use, and
//! [`NonceReservation::commit`] advances the counter once the transaction
//! went out. Dropping an uncommitted reservation leaves the counter as it
//! was. The account stays locked while a reservation is alive, so
//! concurrent sends from one address are serialized and observe strictly
//! increasing nonces.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::error::Result;

type AccountSlot = Arc<AsyncMutex<Option<u64>>>;

/// Next nonce to assign, per account address.
#[derive(Debug, Default)]
pub struct NonceCounter {
    accounts: Mutex<HashMap<String, AccountSlot>>,
}

impl NonceCounter {
    /// Create an empty counter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock `address` and reserve its next nonce.
    ///
    /// If the account has no entry yet, `seed` is awaited for the starting
    /// value (normally the node's pending transaction count). A failing
    /// seed leaves the account unseeded.
    pub async fn reserve<F, Fut>(&self, address: &str, seed: F) -> Result<NonceReservation>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<u64>>,
    {
        let guard = self.slot(address).lock_owned().await;
        let nonce = match *guard {
            Some(next) => next,
            None => {
                let seeded = seed().await?;
                log::debug!("Seeded nonce for {address} at {seeded}");
                seeded
            }
        };
        Ok(NonceReservation { guard, nonce })
    }

    /// Next nonce for `address`, if it is known and not currently reserved.
    pub fn peek(&self, address: &str) -> Option<u64> {
        let slot = self
            .accounts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&normalize(address))
            .cloned()?;
        let next = *slot.try_lock().ok()?;
        next
    }

    fn slot(&self, address: &str) -> AccountSlot {
        let mut accounts = self
            .accounts
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(accounts.entry(normalize(address)).or_default())
    }
}

/// A nonce held for one in-progress transaction.
#[derive(Debug)]
pub struct NonceReservation {
    guard: OwnedMutexGuard<Option<u64>>,
    nonce: u64,
}

impl NonceReservation {
    /// The nonce to put in the transaction.
    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    /// Record the nonce as used and release the account.
    pub fn commit(mut self) {
        *self.guard = Some(self.nonce + 1);
    }
}

/// Addresses are case-insensitive hex.
fn normalize(address: &str) -> String {
    address.to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TelepathError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const ADDRESS: &str = "0x1234567890123456789012345678901234567890";

    #[tokio::test]
    async fn test_seeds_once_then_increments() {
        let counter = NonceCounter::new();
        let seed_calls = AtomicUsize::new(0);
        let seeds = &seed_calls;
        let seed = move || async move {
            seeds.fetch_add(1, Ordering::SeqCst);
            Ok::<_, TelepathError>(0x42)
        };

        let first = counter.reserve(ADDRESS, seed).await.unwrap();
        assert_eq!(first.nonce(), 0x42);
        first.commit();

        let second = counter.reserve(ADDRESS, seed).await.unwrap();
        assert_eq!(second.nonce(), 0x43);
        second.commit();

        assert_eq!(seed_calls.load(Ordering::SeqCst), 1);
        assert_eq!(counter.peek(ADDRESS), Some(0x44));
    }

    #[tokio::test]
    async fn test_uncommitted_reservation_does_not_advance() {
        let counter = NonceCounter::new();
        let first = counter.reserve(ADDRESS, || async { Ok(5) }).await.unwrap();
        first.commit();

        let abandoned = counter.reserve(ADDRESS, || async { Ok(0) }).await.unwrap();
        assert_eq!(abandoned.nonce(), 6);
        drop(abandoned);

        assert_eq!(counter.peek(ADDRESS), Some(6));
    }

    #[tokio::test]
    async fn test_failed_seed_leaves_account_unseeded() {
        let counter = NonceCounter::new();
        let result = counter
            .reserve(ADDRESS, || async { Err(TelepathError::Node("down".into())) })
            .await;
        assert!(result.is_err());
        assert_eq!(counter.peek(ADDRESS), None);

        let retry = counter.reserve(ADDRESS, || async { Ok(9) }).await.unwrap();
        assert_eq!(retry.nonce(), 9);
    }

    #[tokio::test]
    async fn test_addresses_are_case_insensitive() {
        let counter = NonceCounter::new();
        counter
            .reserve("0xABCDEF", || async { Ok(1) })
            .await
            .unwrap()
            .commit();
        let next = counter.reserve("0xabcdef", || async { Ok(100) }).await.unwrap();
        assert_eq!(next.nonce(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_reservations_are_strictly_increasing() {
        let counter = Arc::new(NonceCounter::new());
        let mut handles = Vec::new();
        for _ in 0..5 {
            let counter = Arc::clone(&counter);
            handles.push(tokio::spawn(async move {
                let reservation = counter.reserve(ADDRESS, || async { Ok(10) }).await.unwrap();
                let nonce = reservation.nonce();
                tokio::task::yield_now().await;
                reservation.commit();
                nonce
            }));
        }

        let mut nonces = Vec::new();
        for handle in handles {
            nonces.push(handle.await.unwrap());
        }
        nonces.sort_unstable();
        assert_eq!(nonces, vec![10, 11, 12, 13, 14]);
    }

    #[tokio::test]
    async fn test_accounts_are_independent() {
        let counter = NonceCounter::new();
        let held = counter.reserve("0xaaa", || async { Ok(1) }).await.unwrap();
        // A different account is not blocked by the held reservation
        let other = counter.reserve("0xbbb", || async { Ok(7) }).await.unwrap();
        assert_eq!(other.nonce(), 7);
        assert_eq!(held.nonce(), 1);
    }
}
