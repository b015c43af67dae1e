//! Store-call policy: fail fast, or retry behind a circuit breaker.
//!
//! In [`StorePolicy::FailFast`] every store error propagates and ends the
//! scheduler. In [`StorePolicy::Retry`] errors are retried with exponential
//! backoff; a call that still fails is reported as "skipped" (`Ok(None)`)
//! so the pass is abandoned instead. Consecutive failed calls open the
//! circuit, which then short-circuits calls until its cooldown elapses and a
//! single half-open trial succeeds. A stop signal cuts the backoff short.

use std::future::Future;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::core::SchedulerError;

/// Retry and breaker tuning for [`StorePolicy::Retry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per call while the circuit is closed.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub backoff: Duration,
    /// Upper bound for the doubled delay.
    pub max_backoff: Duration,
    /// Failed calls in a row that open the circuit.
    pub failure_threshold: u32,
    /// Time the circuit stays open before a trial call.
    pub cooldown: Duration,
}

/// Behavior on store errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorePolicy {
    /// Propagate the first error.
    FailFast,
    /// Retry, then skip, with a circuit breaker.
    Retry(RetryPolicy),
}

/// Circuit breaker position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Calls go through.
    Closed,
    /// Calls are skipped until the cooldown ends.
    Open,
    /// One trial call decides whether to close again.
    HalfOpen,
}

#[derive(Debug)]
struct Circuit {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
}

/// Applies a [`StorePolicy`] to store calls.
#[derive(Debug)]
pub struct StoreGuard {
    policy: StorePolicy,
    circuit: Mutex<Circuit>,
    stop: Option<watch::Receiver<bool>>,
}

impl StoreGuard {
    /// Guard enforcing `policy`.
    #[must_use]
    pub const fn new(policy: StorePolicy) -> Self {
        Self {
            policy,
            circuit: Mutex::new(Circuit {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                opened_at: None,
            }),
            stop: None,
        }
    }

    /// Abandon retry backoff once `stop` turns `true`.
    #[must_use]
    pub fn with_stop_signal(mut self, stop: watch::Receiver<bool>) -> Self {
        self.stop = Some(stop);
        self
    }

    /// Guard that propagates every error.
    #[must_use]
    pub const fn fail_fast() -> Self {
        Self::new(StorePolicy::FailFast)
    }

    /// Active policy.
    #[must_use]
    pub const fn policy(&self) -> StorePolicy {
        self.policy
    }

    /// Current breaker position.
    pub fn state(&self) -> CircuitState {
        self.circuit.lock().state
    }

    /// Run `op` under the policy.
    ///
    /// Returns `Ok(None)` when the call was skipped (circuit open, or
    /// retries exhausted).
    ///
    /// # Errors
    ///
    /// Under [`StorePolicy::FailFast`], the first error from `op`.
    pub async fn call<T, F, Fut>(&self, op: &'static str, mut f: F) -> Result<Option<T>, SchedulerError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, SchedulerError>>,
    {
        let policy = match self.policy {
            StorePolicy::FailFast => return f().await.map(Some),
            StorePolicy::Retry(policy) => policy,
        };

        let Some(attempts) = self.admit(&policy) else {
            debug!(op, "store circuit open, skipping call");
            return Ok(None);
        };

        let mut backoff = policy.backoff;
        for attempt in 1..=attempts {
            match f().await {
                Ok(value) => {
                    self.on_success();
                    return Ok(Some(value));
                }
                Err(e) => {
                    warn!(op, attempt, attempts, error = %e, "store call failed");
                    if attempt < attempts {
                        if !self.backoff(backoff).await {
                            debug!(op, "stop requested, abandoning store retries");
                            return Ok(None);
                        }
                        backoff = backoff.saturating_mul(2).min(policy.max_backoff);
                    }
                }
            }
        }

        self.on_failure(&policy);
        Ok(None)
    }

    /// Sleep for `delay`. Returns `false` when a stop arrives first.
    async fn backoff(&self, delay: Duration) -> bool {
        let Some(stop) = &self.stop else {
            tokio::time::sleep(delay).await;
            return true;
        };
        let mut stop = stop.clone();
        if *stop.borrow_and_update() {
            return false;
        }
        tokio::select! {
            () = tokio::time::sleep(delay) => true,
            _ = stop.changed() => !*stop.borrow(),
        }
    }

    /// Number of attempts allowed now, or `None` while the circuit is open.
    fn admit(&self, policy: &RetryPolicy) -> Option<u32> {
        let mut circuit = self.circuit.lock();
        match circuit.state {
            CircuitState::Closed => Some(policy.max_attempts.max(1)),
            CircuitState::HalfOpen => Some(1),
            CircuitState::Open => {
                let cooled = circuit
                    .opened_at
                    .is_none_or(|at| at.elapsed() >= policy.cooldown);
                if cooled {
                    circuit.state = CircuitState::HalfOpen;
                    info!("store circuit half-open, trying one call");
                    Some(1)
                } else {
                    None
                }
            }
        }
    }

    fn on_success(&self) {
        let mut circuit = self.circuit.lock();
        if circuit.state != CircuitState::Closed {
            info!("store circuit closed");
        }
        circuit.state = CircuitState::Closed;
        circuit.consecutive_failures = 0;
        circuit.opened_at = None;
    }

    fn on_failure(&self, policy: &RetryPolicy) {
        let mut circuit = self.circuit.lock();
        circuit.consecutive_failures = circuit.consecutive_failures.saturating_add(1);
        let trip = circuit.state == CircuitState::HalfOpen
            || circuit.consecutive_failures >= policy.failure_threshold;
        if trip {
            if circuit.state != CircuitState::Open {
                warn!(
                    failures = circuit.consecutive_failures,
                    cooldown_ms = u64::try_from(policy.cooldown.as_millis()).unwrap_or(u64::MAX),
                    "store circuit opened"
                );
            }
            circuit.state = CircuitState::Open;
            circuit.opened_at = Some(Instant::now());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn retry(max_attempts: u32, failure_threshold: u32, cooldown_ms: u64) -> StoreGuard {
        StoreGuard::new(StorePolicy::Retry(RetryPolicy {
            max_attempts,
            backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(4),
            failure_threshold,
            cooldown: Duration::from_millis(cooldown_ms),
        }))
    }

    fn down() -> SchedulerError {
        SchedulerError::Store("connection refused".into())
    }

    #[tokio::test]
    async fn fail_fast_propagates_first_error() {
        let guard = StoreGuard::fail_fast();
        let calls = AtomicU32::new(0);
        let calls = &calls;
        let result: Result<Option<()>, _> = guard
            .call("probe", || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(down())
            })
            .await;
        assert!(matches!(result, Err(SchedulerError::Store(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retry_recovers_within_attempts() {
        let guard = retry(3, 5, 1_000);
        let calls = AtomicU32::new(0);
        let calls = &calls;
        let result = guard
            .call("probe", || async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(down())
                } else {
                    Ok(7)
                }
            })
            .await
            .unwrap();
        assert_eq!(result, Some(7));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(guard.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn exhausted_retries_skip_and_open_circuit() {
        let guard = retry(2, 2, 60_000);
        let calls = AtomicU32::new(0);
        let calls = &calls;
        for _ in 0..2 {
            let result: Option<()> = guard
                .call("probe", || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(down())
                })
                .await
                .unwrap();
            assert!(result.is_none());
        }
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(guard.state(), CircuitState::Open);

        // open circuit short-circuits without calling the store
        let result: Option<()> = guard
            .call("probe", || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await
            .unwrap();
        assert!(result.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn half_open_trial_closes_on_success() {
        let guard = retry(1, 1, 10);
        let failed: Option<()> = guard.call("probe", || async { Err(down()) }).await.unwrap();
        assert!(failed.is_none());
        assert_eq!(guard.state(), CircuitState::Open);

        tokio::time::sleep(Duration::from_millis(30)).await;
        let value = guard.call("probe", || async { Ok(1) }).await.unwrap();
        assert_eq!(value, Some(1));
        assert_eq!(guard.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn half_open_trial_failure_reopens() {
        let guard = retry(3, 1, 10);
        let _: Option<()> = guard.call("probe", || async { Err(down()) }).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        let calls = AtomicU32::new(0);
        let calls = &calls;
        let result: Option<()> = guard
            .call("probe", || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(down())
            })
            .await
            .unwrap();
        assert!(result.is_none());
        // a half-open trial is a single attempt
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(guard.state(), CircuitState::Open);
    }

    #[tokio::test]
    async fn stop_cuts_backoff_short() {
        let (stop_tx, stop_rx) = watch::channel(false);
        let guard = StoreGuard::new(StorePolicy::Retry(RetryPolicy {
            max_attempts: 5,
            backoff: Duration::from_secs(30),
            max_backoff: Duration::from_secs(60),
            failure_threshold: 1,
            cooldown: Duration::from_secs(60),
        }))
        .with_stop_signal(stop_rx);

        let calls = AtomicU32::new(0);
        let calls = &calls;
        let stopper = async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            stop_tx.send_replace(true);
        };
        let call = guard.call("probe", || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(down())
        });

        let (result, ()) = tokio::time::timeout(Duration::from_secs(5), async { tokio::join!(call, stopper) })
            .await
            .unwrap();
        assert!(result.unwrap().is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        // an interrupted call does not count against the breaker
        assert_eq!(guard.state(), CircuitState::Closed);

        // once stopped, no backoff is taken at all
        let result: Option<()> = tokio::time::timeout(
            Duration::from_secs(5),
            guard.call("probe", || async { Err(down()) }),
        )
        .await
        .unwrap()
        .unwrap();
        assert!(result.is_none());
    }
}
