//! Per-path circuit breakers for the request layer.
//!
//! One breaker guards each remote call path. Repeated failures open the
//! circuit; while open, calls fail fast without touching the network, which
//! bounds load on an already-failing dependency. After a cooldown a single
//! half-open probe decides whether to close again.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::Mutex;
use strum::Display;
use tracing::{info, warn};

use crate::error::ApiError;
use crate::metrics;

/// Circuit health states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum CircuitState {
    /// Calls flow normally; failures are counted.
    Closed,
    /// Calls fail fast until the cooldown elapses.
    Open,
    /// One probe is in flight; other calls still fail fast.
    HalfOpen,
}

/// Circuit breaker tuning.
#[derive(Debug, Clone)]
pub struct BreakerConfig {
    /// Consecutive failures before the circuit opens.
    pub max_failures: u32,
    /// Cooldown before an open circuit admits a probe.
    pub reset_timeout: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            max_failures: 5,
            reset_timeout: Duration::from_secs(60),
        }
    }
}

impl BreakerConfig {
    /// Set the failure threshold.
    #[must_use]
    pub fn with_max_failures(mut self, max_failures: u32) -> Self {
        self.max_failures = max_failures;
        self
    }

    /// Set the cooldown duration.
    #[must_use]
    pub fn with_reset_timeout(mut self, reset_timeout: Duration) -> Self {
        self.reset_timeout = reset_timeout;
        self
    }
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    failure_count: u32,
    last_failure_at: Option<Instant>,
}

/// Circuit breaker for a single protected call path.
#[derive(Debug)]
pub struct CircuitBreaker {
    path: String,
    config: BreakerConfig,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    /// Create a closed breaker for `path`.
    pub fn new(path: impl Into<String>, config: BreakerConfig) -> Self {
        Self {
            path: path.into(),
            config,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                failure_count: 0,
                last_failure_at: None,
            }),
        }
    }

    /// Current state.
    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    /// Consecutive failures seen while closed.
    pub fn failure_count(&self) -> u32 {
        self.inner.lock().failure_count
    }

    /// Run `op` under the breaker: fast-fail while open, record the outcome
    /// otherwise.
    pub async fn call<T, F, Fut>(&self, op: F) -> Result<T, ApiError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        self.admit()?;

        match op().await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(err) => {
                self.record_failure();
                Err(err)
            }
        }
    }

    /// Admit the call, or fail fast if the circuit is open. An open circuit
    /// past its cooldown flips to half-open and admits exactly this caller as
    /// the probe.
    fn admit(&self) -> Result<(), ApiError> {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => Ok(()),
            CircuitState::HalfOpen => {
                metrics::inc_circuit_fast_fail(&self.path);
                Err(ApiError::CircuitOpen {
                    path: self.path.clone(),
                })
            }
            CircuitState::Open => {
                let cooled_down = inner
                    .last_failure_at
                    .map(|at| at.elapsed() >= self.config.reset_timeout)
                    .unwrap_or(true);
                if cooled_down {
                    inner.state = CircuitState::HalfOpen;
                    info!(path = %self.path, "Circuit half-open, probing");
                    Ok(())
                } else {
                    metrics::inc_circuit_fast_fail(&self.path);
                    Err(ApiError::CircuitOpen {
                        path: self.path.clone(),
                    })
                }
            }
        }
    }

    fn record_success(&self) {
        let mut inner = self.inner.lock();
        if inner.state != CircuitState::Closed {
            info!(path = %self.path, "Circuit closed after successful probe");
        }
        inner.state = CircuitState::Closed;
        inner.failure_count = 0;
        inner.last_failure_at = None;
    }

    fn record_failure(&self) {
        let mut inner = self.inner.lock();
        inner.last_failure_at = Some(Instant::now());
        match inner.state {
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Open;
                warn!(path = %self.path, "Probe failed, circuit re-opened");
                metrics::inc_circuit_opened(&self.path);
            }
            CircuitState::Closed => {
                inner.failure_count += 1;
                if inner.failure_count >= self.config.max_failures {
                    inner.state = CircuitState::Open;
                    warn!(
                        path = %self.path,
                        failures = inner.failure_count,
                        "Failure threshold crossed, circuit opened"
                    );
                    metrics::inc_circuit_opened(&self.path);
                }
            }
            // Calls are never admitted while Open, so nothing to count.
            CircuitState::Open => {}
        }
    }
}

/// Shared set of breakers, one per call path.
#[derive(Debug)]
pub struct BreakerRegistry {
    config: BreakerConfig,
    breakers: DashMap<String, Arc<CircuitBreaker>>,
}

impl BreakerRegistry {
    /// Create an empty registry applying `config` to every path.
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            breakers: DashMap::new(),
        }
    }

    /// Fetch or create the breaker for a call path.
    pub fn for_path(&self, path: &str) -> Arc<CircuitBreaker> {
        self.breakers
            .entry(path.to_string())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(path, self.config.clone())))
            .clone()
    }

    /// Paths currently tracked with their states.
    pub fn states(&self) -> Vec<(String, CircuitState)> {
        self.breakers
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().state()))
            .collect()
    }
}
