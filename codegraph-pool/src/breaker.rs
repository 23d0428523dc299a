//! Per-worker circuit breaker state machine (spec §4.2).
//!
//! `CLOSED → OPEN → HALF_OPEN → CLOSED`. Opens after `failure_threshold`
//! consecutive failures; stays open for `reset_timeout`; half-open
//! admits exactly one trial call.

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

pub struct Breaker {
    state: CircuitState,
    consecutive_failures: u32,
    failure_threshold: u32,
    reset_timeout: Duration,
    opened_at: Option<Instant>,
    half_open_trial_in_flight: bool,
}

/// What the breaker permits for the next call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allow,
    AllowTrial,
    Reject,
}

impl Breaker {
    pub fn new(failure_threshold: u32, reset_timeout: Duration) -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            failure_threshold,
            reset_timeout,
            opened_at: None,
            half_open_trial_in_flight: false,
        }
    }

    pub fn state(&self) -> CircuitState {
        self.state
    }

    /// Called before dispatching a call; transitions OPEN → HALF_OPEN
    /// once `reset_timeout` has elapsed.
    pub fn admit(&mut self) -> Admission {
        match self.state {
            CircuitState::Closed => Admission::Allow,
            CircuitState::Open => {
                let elapsed = self.opened_at.map(|t| t.elapsed()).unwrap_or(Duration::ZERO);
                if elapsed >= self.reset_timeout {
                    self.state = CircuitState::HalfOpen;
                    self.half_open_trial_in_flight = true;
                    Admission::AllowTrial
                } else {
                    Admission::Reject
                }
            }
            CircuitState::HalfOpen => {
                if self.half_open_trial_in_flight {
                    Admission::Reject
                } else {
                    self.half_open_trial_in_flight = true;
                    Admission::AllowTrial
                }
            }
        }
    }

    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
        self.half_open_trial_in_flight = false;
        self.state = CircuitState::Closed;
        self.opened_at = None;
    }

    pub fn record_failure(&mut self) {
        self.half_open_trial_in_flight = false;
        match self.state {
            CircuitState::HalfOpen => {
                self.state = CircuitState::Open;
                self.opened_at = Some(Instant::now());
            }
            CircuitState::Closed => {
                self.consecutive_failures += 1;
                if self.consecutive_failures >= self.failure_threshold {
                    self.state = CircuitState::Open;
                    self.opened_at = Some(Instant::now());
                }
            }
            CircuitState::Open => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_after_threshold_failures() {
        let mut breaker = Breaker::new(3, Duration::from_millis(50));
        for _ in 0..2 {
            assert_eq!(breaker.admit(), Admission::Allow);
            breaker.record_failure();
        }
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.admit(), Admission::Allow);
        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Open);
        assert_eq!(breaker.admit(), Admission::Reject);
    }

    #[test]
    fn half_opens_after_timeout_and_closes_on_success() {
        let mut breaker = Breaker::new(1, Duration::from_millis(10));
        breaker.admit();
        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Open);
        std::thread::sleep(Duration::from_millis(15));
        assert_eq!(breaker.admit(), Admission::AllowTrial);
        breaker.record_success();
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[test]
    fn half_open_trial_failure_reopens() {
        let mut breaker = Breaker::new(1, Duration::from_millis(10));
        breaker.admit();
        breaker.record_failure();
        std::thread::sleep(Duration::from_millis(15));
        assert_eq!(breaker.admit(), Admission::AllowTrial);
        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Open);
    }
}
