//! Sliding-window circuit breaker for the payment gateway.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

/// Breaker tunables.
#[derive(Debug, Clone, Copy)]
pub struct CircuitBreakerConfig {
    /// Number of most recent call outcomes considered.
    pub window: usize,

    /// Failure rate at or above which the breaker opens.
    pub failure_rate_threshold: f64,

    /// The rate is only evaluated once this many outcomes are recorded.
    pub min_calls: usize,

    /// How long the breaker stays open before probing.
    pub open_cooldown: Duration,

    /// Number of trial calls permitted while half-open.
    pub half_open_trials: usize,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            window: 10,
            failure_rate_threshold: 0.5,
            min_calls: 5,
            open_cooldown: Duration::from_secs(10),
            half_open_trials: 3,
        }
    }
}

/// Observable breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    /// Calls pass through; outcomes feed the sliding window.
    Closed,

    /// Calls fail fast without touching the gateway.
    Open,

    /// A bounded number of trial calls probe the gateway.
    HalfOpen,
}

impl std::fmt::Display for BreakerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BreakerState::Closed => "closed",
            BreakerState::Open => "open",
            BreakerState::HalfOpen => "half-open",
        };
        write!(f, "{s}")
    }
}

struct Inner {
    state: BreakerState,
    window: VecDeque<bool>,
    opened_at: Option<Instant>,
    trials_started: usize,
    trial_outcomes: Vec<bool>,
}

/// Circuit breaker guarding an external dependency.
///
/// `try_acquire` must be called before the protected call and exactly one
/// of `record_success`/`record_failure` after it completes. A denied
/// acquire must not be recorded.
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                window: VecDeque::new(),
                opened_at: None,
                trials_started: 0,
                trial_outcomes: Vec::new(),
            }),
        }
    }

    pub fn config(&self) -> CircuitBreakerConfig {
        self.config
    }

    pub fn state(&self) -> BreakerState {
        self.inner.lock().unwrap().state
    }

    /// Asks permission to make the protected call.
    ///
    /// Returns false when the breaker is open (inside the cooldown) or
    /// when the half-open trial budget is already taken.
    pub fn try_acquire(&self) -> bool {
        let mut inner = self.inner.lock().unwrap();

        match inner.state {
            BreakerState::Closed => true,
            BreakerState::Open => {
                let cooled_down = inner
                    .opened_at
                    .is_some_and(|at| at.elapsed() >= self.config.open_cooldown);
                if !cooled_down {
                    return false;
                }
                Self::transition(&mut inner, BreakerState::HalfOpen);
                inner.trials_started = 1;
                true
            }
            BreakerState::HalfOpen => {
                if inner.trials_started >= self.config.half_open_trials {
                    return false;
                }
                inner.trials_started += 1;
                true
            }
        }
    }

    pub fn record_success(&self) {
        self.record(true);
    }

    pub fn record_failure(&self) {
        self.record(false);
    }

    fn record(&self, success: bool) {
        let mut inner = self.inner.lock().unwrap();

        match inner.state {
            BreakerState::Closed => {
                inner.window.push_back(success);
                while inner.window.len() > self.config.window {
                    inner.window.pop_front();
                }

                if inner.window.len() >= self.config.min_calls {
                    let failures = inner.window.iter().filter(|ok| !**ok).count();
                    let rate = failures as f64 / inner.window.len() as f64;
                    if rate >= self.config.failure_rate_threshold {
                        Self::open(&mut inner);
                    }
                }
            }
            BreakerState::HalfOpen => {
                inner.trial_outcomes.push(success);
                if inner.trial_outcomes.len() >= self.config.half_open_trials {
                    let successes = inner.trial_outcomes.iter().filter(|ok| **ok).count();
                    let rate = successes as f64 / inner.trial_outcomes.len() as f64;
                    if rate >= 0.5 {
                        Self::transition(&mut inner, BreakerState::Closed);
                        inner.window.clear();
                    } else {
                        Self::open(&mut inner);
                    }
                }
            }
            // An outcome arriving while open belongs to a call admitted
            // earlier; it does not move the state.
            BreakerState::Open => {}
        }
    }

    fn open(inner: &mut Inner) {
        Self::transition(inner, BreakerState::Open);
        inner.opened_at = Some(Instant::now());
        inner.window.clear();
    }

    fn transition(inner: &mut Inner, to: BreakerState) {
        let from = inner.state;
        inner.state = to;
        inner.trials_started = 0;
        inner.trial_outcomes.clear();
        tracing::info!(%from, %to, "circuit breaker state change");
        metrics::counter!("breaker_transitions_total", "to" => to.to_string()).increment(1);
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}
