//! Bounded-retry poller with in-flight deduplication.
//!
//! A `Poller` repeatedly invokes an async operation until it yields a value,
//! waiting `interval` between attempts and giving up after `retries`
//! attempts. Only one poll cycle runs at a time: a `poll()` issued while a
//! cycle is in flight attaches to that cycle and receives its outcome.
//! Once a cycle settles, the next `poll()` starts a fresh one.
//!
//! An error from the operation ends the cycle immediately. It is not
//! retried, and the poller stays usable for later cycles.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt, Shared};

use crate::constants::{DEFAULT_POLL_INTERVAL, DEFAULT_POLL_RETRIES};

/// Retry budget for a poller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerConfig {
    /// Maximum attempts per cycle. Zero is treated as one.
    pub retries: u32,
    /// Delay between attempts.
    pub interval: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            retries: DEFAULT_POLL_RETRIES,
            interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

type PollFn<T, E> = Arc<dyn Fn() -> BoxFuture<'static, Result<Option<T>, E>> + Send + Sync>;
type PollCycle<T, E> = Shared<BoxFuture<'static, Result<Option<T>, E>>>;

/// Polls an async operation with a bounded number of retries.
pub struct Poller<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    poll_fn: PollFn<T, E>,
    config: PollerConfig,
    in_flight: Arc<Mutex<Option<PollCycle<T, E>>>>,
}

impl<T, E> std::fmt::Debug for Poller<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Poller")
            .field("config", &self.config)
            .field("in_flight", &self.is_polling())
            .finish_non_exhaustive()
    }
}

impl<T, E> Poller<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// Create a poller with the default budget (10 retries, 100 ms apart).
    pub fn new<F, Fut>(poll_fn: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<T>, E>> + Send + 'static,
    {
        Self::with_config(poll_fn, PollerConfig::default())
    }

    /// Create a poller with an explicit budget.
    pub fn with_config<F, Fut>(poll_fn: F, config: PollerConfig) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<T>, E>> + Send + 'static,
    {
        Self {
            poll_fn: Arc::new(move || poll_fn().boxed()),
            config,
            in_flight: Arc::new(Mutex::new(None)),
        }
    }

    /// Maximum attempts per cycle.
    pub fn retries(&self) -> u32 {
        self.config.retries
    }

    /// Delay between attempts.
    pub fn interval(&self) -> Duration {
        self.config.interval
    }

    /// Returns `true` while a cycle is in flight.
    pub fn is_polling(&self) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Run a poll cycle, or join the one already in flight.
    ///
    /// Returns the first non-`None` value, `None` once the retries are
    /// exhausted, or the operation's first error.
    pub async fn poll(&self) -> Result<Option<T>, E> {
        let cycle = {
            let mut slot = self
                .in_flight
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            match slot.as_ref() {
                Some(cycle) => cycle.clone(),
                None => {
                    let cycle = self.start_cycle();
                    *slot = Some(cycle.clone());
                    cycle
                }
            }
        };
        cycle.await
    }

    fn start_cycle(&self) -> PollCycle<T, E> {
        let poll_fn = Arc::clone(&self.poll_fn);
        let config = self.config;
        let slot = Arc::clone(&self.in_flight);

        async move {
            let outcome = run_cycle(poll_fn.as_ref(), config).await;
            // Settled: the next poll() must start over
            *slot.lock().unwrap_or_else(PoisonError::into_inner) = None;
            outcome
        }
        .boxed()
        .shared()
    }
}

async fn run_cycle<T, E>(
    poll_fn: &(dyn Fn() -> BoxFuture<'static, Result<Option<T>, E>> + Send + Sync),
    config: PollerConfig,
) -> Result<Option<T>, E> {
    let attempts = config.retries.max(1);
    for attempt in 1..=attempts {
        if let Some(value) = poll_fn().await? {
            return Ok(Some(value));
        }
        if attempt < attempts {
            tokio::time::sleep(config.interval).await;
        }
    }
    log::debug!("Poll cycle exhausted after {attempts} attempts");
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const RETRIES: u32 = 5;

    fn config() -> PollerConfig {
        PollerConfig {
            retries: RETRIES,
            interval: Duration::ZERO,
        }
    }

    /// Poller over a scripted sequence of outcomes; `None` once the script runs out.
    fn scripted(
        script: Vec<Result<Option<i32>, String>>,
    ) -> (Poller<i32, String>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let script = Arc::new(Mutex::new(VecDeque::from(script)));
        let counter = Arc::clone(&calls);
        let poller = Poller::with_config(
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
                let next = script.lock().unwrap().pop_front().unwrap_or(Ok(None));
                async move {
                    // Suspend once so concurrent callers can attach
                    tokio::task::yield_now().await;
                    next
                }
            },
            config(),
        );
        (poller, calls)
    }

    #[tokio::test]
    async fn test_returns_result() {
        let (poller, calls) = scripted(vec![Ok(Some(42))]);
        assert_eq!(poller.poll().await, Ok(Some(42)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_waits_for_result_to_become_non_null() {
        let (poller, calls) = scripted(vec![Ok(None), Ok(None), Ok(Some(33))]);
        assert_eq!(poller.poll().await, Ok(Some(33)));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_returns_none_after_exactly_retries_attempts() {
        let (poller, calls) = scripted(vec![]);
        assert_eq!(poller.poll().await, Ok(None));
        assert_eq!(calls.load(Ordering::SeqCst), RETRIES as usize);
    }

    #[tokio::test]
    async fn test_handles_polls_in_order() {
        let (poller, _) = scripted(vec![Ok(None), Ok(Some(1)), Ok(None), Ok(Some(2))]);
        assert_eq!(poller.poll().await, Ok(Some(1)));
        assert_eq!(poller.poll().await, Ok(Some(2)));
    }

    #[tokio::test]
    async fn test_error_is_returned_without_retry() {
        let (poller, calls) = scripted(vec![Err("an error".into())]);
        assert_eq!(poller.poll().await, Err("an error".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_recovers_after_error() {
        let (poller, _) = scripted(vec![Err("an error".into()), Ok(Some(11))]);
        assert!(poller.poll().await.is_err());
        assert_eq!(poller.poll().await, Ok(Some(11)));
        assert!(!poller.is_polling());
    }

    #[tokio::test]
    async fn test_does_not_invoke_poll_function_concurrently() {
        let running = Arc::new(AtomicUsize::new(0));
        let max_running = Arc::new(AtomicUsize::new(0));
        let (r, m) = (Arc::clone(&running), Arc::clone(&max_running));

        let poller: Poller<(), String> = Poller::with_config(
            move || {
                let (r, m) = (Arc::clone(&r), Arc::clone(&m));
                async move {
                    let now = r.fetch_add(1, Ordering::SeqCst) + 1;
                    m.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(1)).await;
                    r.fetch_sub(1, Ordering::SeqCst);
                    Ok(None)
                }
            },
            config(),
        );

        let (first, second) = tokio::join!(poller.poll(), poller.poll());
        assert_eq!(first, Ok(None));
        assert_eq!(second, Ok(None));
        assert_eq!(max_running.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_cycle() {
        let (poller, calls) = scripted(vec![Ok(None), Ok(Some(7))]);
        let (first, second) = tokio::join!(poller.poll(), poller.poll());
        assert_eq!(first, Ok(Some(7)));
        assert_eq!(second, Ok(Some(7)));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_error() {
        let (poller, _) = scripted(vec![Err("boom".into())]);
        let (first, second) = tokio::join!(poller.poll(), poller.poll());
        assert_eq!(first, Err("boom".to_string()));
        assert_eq!(second, Err("boom".to_string()));
    }

    #[tokio::test]
    async fn test_sequential_polls_do_not_reuse_settled_result() {
        let invocations = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&invocations);
        let poller: Poller<u32, String> = Poller::with_config(
            move || {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(1)).await;
                    Ok(Some(1))
                }
            },
            config(),
        );

        poller.poll().await.unwrap();
        poller.poll().await.unwrap();
        assert_eq!(invocations.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_has_sensible_defaults() {
        let poller: Poller<(), ()> = Poller::new(|| async { Ok(None) });
        assert_eq!(poller.retries(), 10);
        assert_eq!(poller.interval(), Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_zero_retries_still_attempts_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let poller: Poller<(), ()> = Poller::with_config(
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Ok(None) }
            },
            PollerConfig {
                retries: 0,
                interval: Duration::ZERO,
            },
        );
        assert_eq!(poller.poll().await, Ok(None));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
