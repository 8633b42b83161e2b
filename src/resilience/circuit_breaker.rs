//! Circuit breaker for upstream protection.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: upstream assumed down, calls fail fast
//! - Half-Open: testing if upstream recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: failures within monitor window >= threshold
//! Open → Half-Open: first call attempted after the cool-down
//! Half-Open → Closed: probe call succeeds
//! Half-Open → Open: probe call fails (fresh cool-down)
//! ```
//!
//! # Design Decisions
//! - Per-call-site breaker (not global), injected where it is used
//! - Fail fast in Open state (the operation is never invoked)
//! - Single probe in Half-Open (prevents hammering recovering upstream)
//! - Transitions happen only when a call is attempted, never on a timer
//! - Stale failures are pruned when a new failure is recorded

use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::config::CircuitBreakerConfig;
use crate::observability::metrics;
use crate::resilience::clock::{Clock, MonotonicClock};

/// Longest cool-down used when the configured one does not fit in an `Instant`.
const MAX_COOL_DOWN: Duration = Duration::from_secs(24 * 60 * 60);

/// Externally visible breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

impl BreakerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BreakerState::Closed => "CLOSED",
            BreakerState::Open => "OPEN",
            BreakerState::HalfOpen => "HALF_OPEN",
        }
    }
}

impl fmt::Display for BreakerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a call the breaker did not let succeed.
#[derive(Debug, Error)]
pub enum BreakerError<E> {
    /// The breaker rejected the call; the operation was never invoked.
    #[error("circuit breaker is open (retry in {}ms)", .retry_after.as_millis())]
    Open {
        /// Time left before the breaker admits a probe.
        retry_after: Duration,
    },
    /// The operation ran and failed. The error is passed through untouched.
    #[error(transparent)]
    Upstream(E),
}

impl<E> BreakerError<E> {
    /// True when the call was shed by the breaker rather than attempted.
    pub fn is_open(&self) -> bool {
        matches!(self, BreakerError::Open { .. })
    }

    /// The operation's own error, if it ran.
    pub fn into_upstream(self) -> Option<E> {
        match self {
            BreakerError::Open { .. } => None,
            BreakerError::Upstream(e) => Some(e),
        }
    }
}

/// Point-in-time view of a breaker for health and admin reporting.
#[derive(Debug, Clone, Serialize)]
pub struct BreakerSnapshot {
    pub name: String,
    pub state: BreakerState,
    /// Failures still inside the monitor window.
    pub recent_failures: usize,
    /// Remaining cool-down while open.
    pub retry_after_ms: Option<u64>,
}

#[derive(Debug, Clone, Copy)]
enum Phase {
    Closed,
    Open { next_attempt: Instant },
    HalfOpen { probing: bool },
}

impl Phase {
    fn state(&self) -> BreakerState {
        match self {
            Phase::Closed => BreakerState::Closed,
            Phase::Open { .. } => BreakerState::Open,
            Phase::HalfOpen { .. } => BreakerState::HalfOpen,
        }
    }
}

#[derive(Debug)]
struct Inner {
    phase: Phase,
    /// Failure instants, oldest first.
    failures: VecDeque<Instant>,
}

/// Gates asynchronous operations against one upstream dependency.
///
/// The admission decision and the outcome bookkeeping each run under a
/// short synchronous lock. The lock is never held while the operation runs.
#[derive(Debug)]
pub struct CircuitBreaker<C: Clock = MonotonicClock> {
    name: String,
    config: CircuitBreakerConfig,
    clock: C,
    inner: Mutex<Inner>,
}

impl CircuitBreaker<MonotonicClock> {
    /// Create a closed breaker driven by the real monotonic clock.
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self::with_clock(name, config, MonotonicClock)
    }
}

impl<C: Clock> CircuitBreaker<C> {
    /// Create a closed breaker driven by `clock`.
    pub fn with_clock(name: impl Into<String>, config: CircuitBreakerConfig, clock: C) -> Self {
        let name = name.into();
        metrics::record_breaker_state(&name, BreakerState::Closed);
        Self {
            name,
            config,
            clock,
            inner: Mutex::new(Inner {
                phase: Phase::Closed,
                failures: VecDeque::new(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Current state. An open breaker whose cool-down has elapsed still
    /// reports `Open` until a call attempts the transition.
    pub fn state(&self) -> BreakerState {
        self.lock().phase.state()
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let now = self.clock.now();
        let window = self.config.monitor_window();
        let inner = self.lock();

        let recent_failures = inner
            .failures
            .iter()
            .filter(|at| now.saturating_duration_since(**at) <= window)
            .count();
        let retry_after_ms = match inner.phase {
            Phase::Open { next_attempt } => {
                Some(next_attempt.saturating_duration_since(now).as_millis() as u64)
            }
            _ => None,
        };

        BreakerSnapshot {
            name: self.name.clone(),
            state: inner.phase.state(),
            recent_failures,
            retry_after_ms,
        }
    }

    /// Run `operation` if the breaker admits it.
    ///
    /// Returns `BreakerError::Open` without invoking `operation` while the
    /// breaker is open, or while a half-open probe is already in flight.
    /// Otherwise the operation's result is returned unchanged, with its error
    /// wrapped in `BreakerError::Upstream`.
    pub async fn call<F, Fut, T, E>(&self, operation: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let permit = match self.admit() {
            Ok(permit) => permit,
            Err(retry_after) => return Err(BreakerError::Open { retry_after }),
        };

        match operation().await {
            Ok(value) => {
                permit.succeed();
                Ok(value)
            }
            Err(e) => {
                permit.fail();
                Err(BreakerError::Upstream(e))
            }
        }
    }

    fn admit(&self) -> Result<Permit<'_, C>, Duration> {
        let now = self.clock.now();
        let mut inner = self.lock();

        let phase = inner.phase;
        let retry_after = match phase {
            Phase::Closed => return Ok(Permit::new(self, false)),
            Phase::Open { next_attempt } if now < next_attempt => next_attempt - now,
            Phase::Open { .. } => {
                self.transition(&mut inner, Phase::HalfOpen { probing: true });
                return Ok(Permit::new(self, true));
            }
            Phase::HalfOpen { probing: false } => {
                inner.phase = Phase::HalfOpen { probing: true };
                return Ok(Permit::new(self, true));
            }
            Phase::HalfOpen { probing: true } => Duration::ZERO,
        };
        drop(inner);

        tracing::debug!(
            breaker = %self.name,
            retry_after_ms = retry_after.as_millis() as u64,
            "Call rejected by open circuit breaker"
        );
        metrics::record_breaker_rejection(&self.name);
        Err(retry_after)
    }

    /// Only the probe decides how a half-open breaker leaves that state. Calls
    /// admitted earlier only touch the failure history.
    fn on_success(&self, probe: bool) {
        let mut inner = self.lock();
        inner.failures.clear();
        if probe && matches!(inner.phase, Phase::HalfOpen { .. }) {
            self.transition(&mut inner, Phase::Closed);
        }
    }

    fn on_failure(&self, probe: bool) {
        let now = self.clock.now();
        let window = self.config.monitor_window();
        let mut inner = self.lock();

        inner.failures.push_back(now);
        while let Some(oldest) = inner.failures.front() {
            if now.saturating_duration_since(*oldest) > window {
                inner.failures.pop_front();
            } else {
                break;
            }
        }

        let trip = match inner.phase {
            Phase::HalfOpen { .. } => probe,
            Phase::Closed | Phase::Open { .. } => {
                inner.failures.len() >= self.config.failure_threshold as usize
            }
        };
        if trip {
            let next_attempt = self.cool_down_from(now);
            self.transition(&mut inner, Phase::Open { next_attempt });
        }
    }

    /// End of a cool-down starting at `now`, clamped to what `Instant` can hold.
    fn cool_down_from(&self, now: Instant) -> Instant {
        now.checked_add(self.config.open_timeout())
            .or_else(|| now.checked_add(MAX_COOL_DOWN))
            .unwrap_or(now)
    }

    /// The probe's future was dropped before it finished; let the next call probe.
    fn release_probe(&self) {
        let mut inner = self.lock();
        if let Phase::HalfOpen { probing: true } = inner.phase {
            inner.phase = Phase::HalfOpen { probing: false };
            tracing::debug!(breaker = %self.name, "Half-open probe abandoned");
        }
    }

    fn transition(&self, inner: &mut Inner, next: Phase) {
        let from = inner.phase.state();
        let to = next.state();
        inner.phase = next;
        if from == to {
            return;
        }

        match to {
            BreakerState::Open => tracing::warn!(
                breaker = %self.name,
                from = %from,
                failures = inner.failures.len(),
                cool_down_ms = self.config.open_timeout_ms,
                "Circuit breaker opened"
            ),
            BreakerState::HalfOpen => tracing::info!(
                breaker = %self.name,
                "Circuit breaker half-open, admitting probe"
            ),
            BreakerState::Closed => tracing::info!(
                breaker = %self.name,
                "Circuit breaker closed"
            ),
        }
        metrics::record_breaker_transition(&self.name, to);
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Admission ticket for one call. Reports the outcome back to the breaker.
struct Permit<'a, C: Clock> {
    breaker: &'a CircuitBreaker<C>,
    probe: bool,
    settled: bool,
}

impl<'a, C: Clock> Permit<'a, C> {
    fn new(breaker: &'a CircuitBreaker<C>, probe: bool) -> Self {
        Self {
            breaker,
            probe,
            settled: false,
        }
    }

    fn succeed(mut self) {
        self.settled = true;
        self.breaker.on_success(self.probe);
    }

    fn fail(mut self) {
        self.settled = true;
        self.breaker.on_failure(self.probe);
    }
}

impl<C: Clock> Drop for Permit<'_, C> {
    fn drop(&mut self) {
        if self.probe && !self.settled {
            self.breaker.release_probe();
        }
    }
}
