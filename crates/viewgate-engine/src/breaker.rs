//! Per-dependency circuit breaking.
//!
//! A purely local, in-process failure-rate limiter: after `threshold`
//! consecutive failures the breaker opens and calls fail fast without
//! touching the dependency; after the open timeout one probe call is let
//! through (half-open) and its outcome decides between closing and
//! re-opening. State transitions are computed lazily on access, never
//! polled, and no lock is held across an await.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use viewgate_commons::{GatewayError, Result};
use viewgate_configs::BreakerSettings;

/// Name of the analytical-engine dependency in the registry.
pub const ENGINE_DEPENDENCY: &str = "engine";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

struct BreakerInner {
    state: CircuitState,
    failure_count: u32,
    last_failure: Option<Instant>,
}

pub struct CircuitBreaker {
    name: String,
    failure_threshold: u32,
    open_timeout: Duration,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(name: &str, failure_threshold: u32, open_timeout: Duration) -> Self {
        Self {
            name: name.to_string(),
            failure_threshold,
            open_timeout,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                failure_count: 0,
                last_failure: None,
            }),
        }
    }

    /// Run `op` under the breaker. An open circuit fails immediately with
    /// `CircuitOpen` without invoking `op`; otherwise the outcome is
    /// recorded and the original error is rethrown.
    pub async fn execute<T, Fut>(&self, op: impl FnOnce() -> Fut) -> Result<T>
    where
        Fut: Future<Output = Result<T>>,
    {
        self.allow()?;
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

    /// Current state, after applying the lazy Open -> HalfOpen transition.
    pub fn state(&self) -> CircuitState {
        let mut inner = self.inner.lock();
        self.apply_lazy_transition(&mut inner);
        inner.state
    }

    fn allow(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        self.apply_lazy_transition(&mut inner);
        match inner.state {
            CircuitState::Closed | CircuitState::HalfOpen => Ok(()),
            CircuitState::Open => Err(GatewayError::CircuitOpen(self.name.clone())),
        }
    }

    fn apply_lazy_transition(&self, inner: &mut BreakerInner) {
        if inner.state == CircuitState::Open {
            let elapsed = inner
                .last_failure
                .map(|t| t.elapsed())
                .unwrap_or(Duration::ZERO);
            if elapsed >= self.open_timeout {
                inner.state = CircuitState::HalfOpen;
                log::info!("circuit '{}' half-open after {:?}", self.name, elapsed);
            }
        }
    }

    fn record_success(&self) {
        let mut inner = self.inner.lock();
        if inner.state != CircuitState::Closed {
            log::info!("circuit '{}' closed", self.name);
        }
        inner.state = CircuitState::Closed;
        inner.failure_count = 0;
    }

    fn record_failure(&self) {
        let mut inner = self.inner.lock();
        inner.failure_count += 1;
        inner.last_failure = Some(Instant::now());
        if inner.state == CircuitState::HalfOpen || inner.failure_count >= self.failure_threshold {
            if inner.state != CircuitState::Open {
                log::warn!(
                    "circuit '{}' opened after {} failure(s)",
                    self.name,
                    inner.failure_count
                );
            }
            inner.state = CircuitState::Open;
        }
    }
}

/// Fixed map of breakers, one per known downstream dependency.
///
/// Constructed once at startup from the known dependency names; asking for
/// an unknown name is a programming error, so caller-controlled strings can
/// never grow the registry.
pub struct BreakerRegistry {
    breakers: HashMap<String, Arc<CircuitBreaker>>,
}

impl BreakerRegistry {
    pub fn new(names: &[&str], settings: &BreakerSettings) -> Self {
        let open_timeout = Duration::from_secs(settings.open_timeout_seconds);
        let breakers = names
            .iter()
            .map(|name| {
                (
                    name.to_string(),
                    Arc::new(CircuitBreaker::new(
                        name,
                        settings.failure_threshold,
                        open_timeout,
                    )),
                )
            })
            .collect();
        Self { breakers }
    }

    pub fn breaker(&self, name: &str) -> Result<Arc<CircuitBreaker>> {
        self.breakers.get(name).cloned().ok_or_else(|| {
            GatewayError::internal(format!("no circuit breaker registered for '{}'", name))
        })
    }
}
