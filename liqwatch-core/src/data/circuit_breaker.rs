//! Circuit breaker for provider rate limiting and IP bans.
//!
//! Repeated transient failures (429, 5xx, timeouts) or a single 403 open the
//! breaker; while open every request is refused until the cooldown elapses.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// State of the circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    /// Requests are allowed.
    Closed,
    /// Requests are refused until `tripped_at + cooldown`.
    Open { tripped_at: Instant },
}

#[derive(Debug)]
struct Inner {
    state: BreakerState,
    consecutive_failures: u32,
}

/// Shared breaker guarding one provider.
#[derive(Debug)]
pub struct CircuitBreaker {
    inner: Mutex<Inner>,
    cooldown: Duration,
    failure_threshold: u32,
}

impl CircuitBreaker {
    pub fn new(cooldown: Duration, failure_threshold: u32) -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                consecutive_failures: 0,
            }),
            cooldown,
            failure_threshold: failure_threshold.max(1),
        }
    }

    /// 30-minute cooldown, opens after 3 consecutive failures.
    pub fn default_provider() -> Self {
        Self::new(Duration::from_secs(30 * 60), 3)
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Check whether a request may go out. Closes the breaker once the cooldown expired.
    pub fn is_allowed(&self) -> bool {
        let mut inner = self.lock();
        let state = inner.state;
        match state {
            BreakerState::Closed => true,
            BreakerState::Open { tripped_at } if tripped_at.elapsed() >= self.cooldown => {
                tracing::info!("circuit breaker cooldown elapsed, accepting requests again");
                inner.state = BreakerState::Closed;
                inner.consecutive_failures = 0;
                true
            }
            BreakerState::Open { .. } => false,
        }
    }

    pub fn record_success(&self) {
        self.lock().consecutive_failures = 0;
    }

    /// Count a transient failure; opens the breaker at the threshold.
    pub fn record_failure(&self) {
        let mut inner = self.lock();
        inner.consecutive_failures += 1;
        if inner.consecutive_failures >= self.failure_threshold
            && inner.state == BreakerState::Closed
        {
            tracing::warn!(
                failures = inner.consecutive_failures,
                cooldown_secs = self.cooldown.as_secs(),
                "circuit breaker opened after repeated provider failures"
            );
            inner.state = BreakerState::Open {
                tripped_at: Instant::now(),
            };
        }
    }

    /// Open immediately (HTTP 403).
    pub fn trip(&self) {
        tracing::error!(
            cooldown_secs = self.cooldown.as_secs(),
            "circuit breaker tripped: provider blocked requests"
        );
        self.lock().state = BreakerState::Open {
            tripped_at: Instant::now(),
        };
    }

    pub fn state(&self) -> BreakerState {
        self.lock().state
    }

    /// Time left before requests are allowed again (zero when closed).
    pub fn remaining_cooldown(&self) -> Duration {
        match self.lock().state {
            BreakerState::Closed => Duration::ZERO,
            BreakerState::Open { tripped_at } => self.cooldown.saturating_sub(tripped_at.elapsed()),
        }
    }
}
