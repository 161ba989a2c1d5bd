//! Circuit breaker to prevent cascade failures.
//!
//! When calls to a dependency fail repeatedly, the circuit opens and
//! subsequent calls are rejected without touching the dependency until
//! `open_timeout` has elapsed since the last failure.
//!
//! # State Transitions
//! ```text
//! CLOSED    -> OPEN:      failure_count >= failure_threshold after a failure
//! OPEN      -> HALF_OPEN: next call attempt once open_timeout has elapsed
//! HALF_OPEN -> CLOSED:    a probe succeeds (counters zeroed)
//! HALF_OPEN -> OPEN:      a probe fails (threshold still met)
//! any       -> CLOSED:    reset()
//! ```
//!
//! # Concurrency
//! The admission check and every transition are synchronous and never hold a
//! lock across an `.await`. Every call admitted while HALF_OPEN acts as a probe:
//! concurrent callers may each reach the dependency during recovery. Counters
//! are atomics and the open decision uses the value returned by the increment.

use bulwark_core::{BreakerMetrics, BreakerSettings, BreakerState, BreakerStatus};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tokio::time::Instant;

/// Errors crossing the breaker boundary.
#[derive(Error, Debug)]
pub enum BreakerError<E> {
    /// The breaker refused the call; the operation was never invoked
    #[error("Circuit breaker \"{name}\" is OPEN")]
    Open { name: String },

    /// The operation ran and failed; the original error is preserved
    #[error(transparent)]
    Upstream(E),
}

impl<E> BreakerError<E> {
    /// Whether the call was denied without running.
    pub fn is_open(&self) -> bool {
        matches!(self, BreakerError::Open { .. })
    }

    /// The underlying failure, if the operation ran.
    pub fn into_upstream(self) -> Option<E> {
        match self {
            BreakerError::Upstream(e) => Some(e),
            BreakerError::Open { .. } => None,
        }
    }
}

struct BreakerInner {
    state: BreakerState,
    last_failure: Option<Instant>,
    last_failure_time: Option<DateTime<Utc>>,
    state_changed_at: DateTime<Utc>,
}

impl BreakerInner {
    fn closed() -> Self {
        Self {
            state: BreakerState::Closed,
            last_failure: None,
            last_failure_time: None,
            state_changed_at: Utc::now(),
        }
    }

    fn transition(&mut self, state: BreakerState) {
        self.state = state;
        self.state_changed_at = Utc::now();
    }
}

/// Circuit breaker guarding one named dependency.
pub struct CircuitBreaker {
    name: String,
    settings: BreakerSettings,
    success_count: AtomicU64,
    failure_count: AtomicU64,
    inner: RwLock<BreakerInner>,
}

impl CircuitBreaker {
    /// Create a closed breaker.
    pub fn new(name: impl Into<String>, settings: BreakerSettings) -> Self {
        Self {
            name: name.into(),
            settings,
            success_count: AtomicU64::new(0),
            failure_count: AtomicU64::new(0),
            inner: RwLock::new(BreakerInner::closed()),
        }
    }

    /// Name of the guarded dependency.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Tuning this breaker was built with.
    pub fn settings(&self) -> &BreakerSettings {
        &self.settings
    }

    /// Current state.
    pub fn state(&self) -> BreakerState {
        self.inner.read().state
    }

    /// Run `operation` under the breaker.
    ///
    /// Returns [`BreakerError::Open`] without invoking `operation` while the
    /// circuit is open and the cool-down has not elapsed. Operation failures are
    /// recorded and returned as [`BreakerError::Upstream`].
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.try_acquire()?;

        match operation().await {
            Ok(value) => {
                self.on_success();
                Ok(value)
            }
            Err(e) => {
                self.on_failure();
                Err(BreakerError::Upstream(e))
            }
        }
    }

    /// Admission check. Moves OPEN to HALF_OPEN once the cool-down has elapsed.
    fn try_acquire<E>(&self) -> Result<(), BreakerError<E>> {
        {
            let inner = self.inner.read();
            if inner.state != BreakerState::Open {
                return Ok(());
            }
            if !self.cool_down_elapsed(&inner) {
                return Err(self.denied());
            }
        }

        let mut inner = self.inner.write();
        if inner.state == BreakerState::Open {
            // Re-check under the write lock; a failure may have landed in between
            if !self.cool_down_elapsed(&inner) {
                return Err(self.denied());
            }
            inner.transition(BreakerState::HalfOpen);
            tracing::info!(breaker = %self.name, "Circuit transitioning to half-open for recovery test");
        }
        Ok(())
    }

    fn cool_down_elapsed(&self, inner: &BreakerInner) -> bool {
        inner
            .last_failure
            .map_or(true, |at| at.elapsed() >= self.settings.open_timeout)
    }

    fn denied<E>(&self) -> BreakerError<E> {
        tracing::debug!(breaker = %self.name, "Call rejected while circuit is open");
        BreakerError::Open {
            name: self.name.clone(),
        }
    }

    fn on_success(&self) {
        self.success_count.fetch_add(1, Ordering::SeqCst);

        if self.inner.read().state != BreakerState::HalfOpen {
            return;
        }

        let mut inner = self.inner.write();
        if inner.state == BreakerState::HalfOpen {
            self.success_count.store(0, Ordering::SeqCst);
            self.failure_count.store(0, Ordering::SeqCst);
            inner.transition(BreakerState::Closed);
            tracing::info!(breaker = %self.name, "Circuit closed after successful recovery");
        }
    }

    fn on_failure(&self) {
        let now = Instant::now();
        let mut inner = self.inner.write();

        // Stale failures stop counting while closed
        if inner.state == BreakerState::Closed {
            if let Some(previous) = inner.last_failure {
                if now.saturating_duration_since(previous) >= self.settings.reset_timeout {
                    self.failure_count.store(0, Ordering::SeqCst);
                }
            }
        }

        let failures = self.failure_count.fetch_add(1, Ordering::SeqCst) + 1;
        inner.last_failure = Some(now);
        inner.last_failure_time = Some(Utc::now());

        if failures < u64::from(self.settings.failure_threshold) {
            return;
        }

        match inner.state {
            BreakerState::Closed => {
                inner.transition(BreakerState::Open);
                tracing::warn!(
                    breaker = %self.name,
                    failures,
                    "Circuit opened after repeated failures"
                );
            }
            BreakerState::HalfOpen => {
                inner.transition(BreakerState::Open);
                tracing::warn!(breaker = %self.name, "Circuit reopened after failed recovery attempt");
            }
            BreakerState::Open => {}
        }
    }

    /// Read-only snapshot of state and metrics.
    pub fn status(&self) -> BreakerStatus {
        let inner = self.inner.read();
        BreakerStatus {
            name: self.name.clone(),
            state: inner.state,
            metrics: BreakerMetrics {
                success_count: self.success_count.load(Ordering::SeqCst),
                failure_count: self.failure_count.load(Ordering::SeqCst),
                last_failure_time: inner.last_failure_time,
                state_changed_at: inner.state_changed_at,
            },
        }
    }

    /// Force CLOSED with zeroed metrics.
    pub fn reset(&self) {
        let mut inner = self.inner.write();
        self.success_count.store(0, Ordering::SeqCst);
        self.failure_count.store(0, Ordering::SeqCst);
        *inner = BreakerInner::closed();
        tracing::info!(breaker = %self.name, "Circuit manually reset");
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("state", &self.state())
            .field("settings", &self.settings)
            .finish()
    }
}
