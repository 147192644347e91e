//! Consecutive-failure circuit breaker.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::clock::{Clock, duration_ms};
use crate::error::UpstreamError;

/// Observable breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    /// Calls flow; consecutive failures are counted.
    Closed {
        /// Consecutive failures so far.
        failures: u32,
    },
    /// Calls are short-circuited until the given time (epoch ms).
    Open {
        /// When a trial call will be admitted.
        until_ms: i64,
    },
    /// A single trial call is in flight.
    HalfOpen,
}

impl BreakerState {
    /// Lowercase label used in health reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Closed { .. } => "closed",
            Self::Open { .. } => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

/// Circuit breaker protecting one upstream.
///
/// Opens after `failure_threshold` consecutive failures. While open every call
/// fails with [`UpstreamError::CircuitOpen`]. Once `cooldown` has elapsed one
/// trial call is admitted: success closes the breaker, failure re-opens it.
#[derive(Debug)]
pub struct CircuitBreaker {
    service: String,
    failure_threshold: u32,
    cooldown: Duration,
    clock: Arc<dyn Clock>,
    state: Mutex<BreakerState>,
}

impl CircuitBreaker {
    /// Creates a closed breaker.
    pub fn new(
        service: impl Into<String>,
        failure_threshold: u32,
        cooldown: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            service: service.into(),
            failure_threshold: failure_threshold.max(1),
            cooldown,
            clock,
            state: Mutex::new(BreakerState::Closed { failures: 0 }),
        }
    }

    /// Returns the current state.
    pub fn state(&self) -> BreakerState {
        *self.state.lock()
    }

    /// Asks permission to issue a call.
    ///
    /// The returned permit must be settled with [`CallPermit::success`] or
    /// [`CallPermit::failure`]. A half-open trial permit dropped unsettled
    /// (the caller was cancelled) counts as a failed trial and re-opens the
    /// breaker.
    ///
    /// # Errors
    ///
    /// Returns `UpstreamError::CircuitOpen` while the breaker is open, or while
    /// a half-open trial call is already in flight.
    pub fn acquire(&self) -> Result<CallPermit<'_>, UpstreamError> {
        let mut state = self.state.lock();
        match *state {
            BreakerState::Closed { .. } => Ok(CallPermit::new(self, false)),
            BreakerState::Open { until_ms } if self.clock.now_ms() >= until_ms => {
                tracing::info!(service = %self.service, "Circuit half-open, admitting trial call");
                *state = BreakerState::HalfOpen;
                Ok(CallPermit::new(self, true))
            }
            BreakerState::Open { .. } | BreakerState::HalfOpen => {
                Err(UpstreamError::CircuitOpen {
                    service: self.service.clone(),
                })
            }
        }
    }

    /// Records a successful call.
    pub fn record_success(&self) {
        let mut state = self.state.lock();
        if *state == BreakerState::HalfOpen {
            tracing::info!(service = %self.service, "Circuit closed");
        }
        *state = BreakerState::Closed { failures: 0 };
    }

    /// Records a failed call.
    pub fn record_failure(&self) {
        let mut state = self.state.lock();
        let failures = match *state {
            BreakerState::Closed { failures } => failures + 1,
            BreakerState::HalfOpen => self.failure_threshold,
            BreakerState::Open { .. } => return,
        };

        if failures >= self.failure_threshold {
            let until_ms = self.clock.now_ms() + duration_ms(self.cooldown);
            tracing::warn!(
                service = %self.service,
                failures,
                cooldown_ms = duration_ms(self.cooldown),
                "Circuit opened"
            );
            *state = BreakerState::Open { until_ms };
        } else {
            *state = BreakerState::Closed { failures };
        }
    }
}

/// Permission to issue one call through a [`CircuitBreaker`].
#[must_use = "a permit must be settled with `success` or `failure`"]
#[derive(Debug)]
pub struct CallPermit<'a> {
    breaker: &'a CircuitBreaker,
    trial: bool,
    settled: bool,
}

impl<'a> CallPermit<'a> {
    fn new(breaker: &'a CircuitBreaker, trial: bool) -> Self {
        Self {
            breaker,
            trial,
            settled: false,
        }
    }

    /// Returns `true` for the single call admitted while half-open.
    pub fn is_trial(&self) -> bool {
        self.trial
    }

    /// Records the call as successful.
    pub fn success(mut self) {
        self.settled = true;
        self.breaker.record_success();
    }

    /// Records the call as failed.
    pub fn failure(mut self) {
        self.settled = true;
        self.breaker.record_failure();
    }
}

impl Drop for CallPermit<'_> {
    fn drop(&mut self) {
        if !self.settled && self.trial {
            tracing::warn!(
                service = %self.breaker.service,
                "Trial call abandoned, circuit re-opened"
            );
            self.breaker.record_failure();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn breaker(clock: Arc<ManualClock>) -> CircuitBreaker {
        CircuitBreaker::new("biometric", 3, Duration::from_secs(30), clock)
    }

    #[test]
    fn test_opens_after_threshold() {
        let clock = Arc::new(ManualClock::new(0));
        let breaker = breaker(clock);

        breaker.record_failure();
        breaker.record_failure();
        assert!(!breaker.acquire().unwrap().is_trial());
        assert_eq!(breaker.state(), BreakerState::Closed { failures: 2 });

        breaker.record_failure();
        assert_eq!(breaker.state(), BreakerState::Open { until_ms: 30_000 });
        assert_eq!(breaker.state().as_str(), "open");
        assert!(matches!(
            breaker.acquire(),
            Err(UpstreamError::CircuitOpen { ref service }) if service == "biometric"
        ));
    }

    #[test]
    fn test_success_resets_failure_count() {
        let clock = Arc::new(ManualClock::new(0));
        let breaker = breaker(clock);

        breaker.record_failure();
        breaker.record_failure();
        breaker.record_success();
        breaker.record_failure();
        assert_eq!(breaker.state(), BreakerState::Closed { failures: 1 });
    }

    #[test]
    fn test_half_open_admits_single_trial() {
        let clock = Arc::new(ManualClock::new(0));
        let breaker = breaker(clock.clone());
        for _ in 0..3 {
            breaker.record_failure();
        }

        clock.advance(Duration::from_secs(30));
        let trial = breaker.acquire().unwrap();
        assert!(trial.is_trial());
        assert_eq!(breaker.state(), BreakerState::HalfOpen);
        assert!(breaker.acquire().is_err());

        assert_eq!(breaker.state().as_str(), "half_open");

        trial.success();
        assert_eq!(breaker.state(), BreakerState::Closed { failures: 0 });
        assert!(breaker.acquire().is_ok());
    }

    #[test]
    fn test_failed_trial_reopens() {
        let clock = Arc::new(ManualClock::new(0));
        let breaker = breaker(clock.clone());
        for _ in 0..3 {
            breaker.record_failure();
        }

        clock.set(31_000);
        breaker.acquire().unwrap().failure();
        assert_eq!(breaker.state(), BreakerState::Open { until_ms: 61_000 });
    }

    #[test]
    fn test_abandoned_trial_reopens() {
        let clock = Arc::new(ManualClock::new(0));
        let breaker = breaker(clock.clone());
        for _ in 0..3 {
            breaker.record_failure();
        }

        clock.set(31_000);
        drop(breaker.acquire().unwrap());
        assert_eq!(breaker.state(), BreakerState::Open { until_ms: 61_000 });

        clock.set(61_000);
        breaker.acquire().unwrap().success();
        assert_eq!(breaker.state(), BreakerState::Closed { failures: 0 });
    }

    #[test]
    fn test_dropped_closed_permit_is_not_a_failure() {
        let clock = Arc::new(ManualClock::new(0));
        let breaker = breaker(clock);

        drop(breaker.acquire().unwrap());
        assert_eq!(breaker.state(), BreakerState::Closed { failures: 0 });
    }
}
