// Circuit breaker guarding downstream calls, primarily database writes.
// CLOSED passes calls through and counts consecutive failures; OPEN rejects
// immediately until the reset timeout elapses; HALF_OPEN lets trial calls
// through and closes again after enough consecutive successes.
//
// One instance per guarded dependency, constructed by the composition root
// and shared across workers; all state lives behind a single lock so
// concurrent `execute` calls observe consistent transitions.

use std::future::Future;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "CLOSED",
            CircuitState::Open => "OPEN",
            CircuitState::HalfOpen => "HALF_OPEN",
        }
    }
}

/// Rejection is a distinct error from whatever the guarded call produces;
/// an `Open` rejection means the call was never attempted.
#[derive(Error, Debug)]
pub enum BreakerError<E>
where
    E: std::error::Error,
{
    #[error("circuit breaker [{name}] is OPEN")]
    Open { name: String },

    #[error(transparent)]
    Inner(#[from] E),
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerOptions {
    pub name: String,
    pub failure_threshold: u32,
    pub reset_timeout: Duration,
    pub success_threshold: u32,
}

impl CircuitBreakerOptions {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            failure_threshold: 5,
            reset_timeout: Duration::from_millis(30_000),
            success_threshold: 2,
        }
    }
}

/// Metrics snapshot; reading it has no side effects.
#[derive(Debug, Clone, Copy)]
pub struct BreakerMetrics {
    pub state: CircuitState,
    pub failure_count: u32,
    pub success_count: u32,
    pub last_failure_time: Option<Instant>,
    pub total_executions: u64,
    pub total_failures: u64,
}

#[derive(Debug)]
struct BreakerCore {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    last_failure_time: Option<Instant>,
    total_executions: u64,
    total_failures: u64,
}

impl BreakerCore {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            success_count: 0,
            last_failure_time: None,
            total_executions: 0,
            total_failures: 0,
        }
    }
}

pub struct CircuitBreaker {
    name: String,
    failure_threshold: u32,
    reset_timeout: Duration,
    success_threshold: u32,
    core: Mutex<BreakerCore>,
}

impl CircuitBreaker {
    pub fn new(options: CircuitBreakerOptions) -> Self {
        Self {
            name: options.name,
            failure_threshold: options.failure_threshold,
            reset_timeout: options.reset_timeout,
            success_threshold: options.success_threshold,
            core: Mutex::new(BreakerCore::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run `op` under the breaker. The lock is released before the guarded
    /// future is awaited; only the admit/settle decisions are serialized.
    pub async fn execute<T, E, F, Fut>(&self, op: F) -> Result<T, BreakerError<E>>
    where
        E: std::error::Error,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        {
            let mut core = self.core.lock().await;
            core.total_executions += 1;

            if core.state == CircuitState::Open {
                let elapsed = core
                    .last_failure_time
                    .map(|at| at.elapsed())
                    .unwrap_or(self.reset_timeout);
                if elapsed >= self.reset_timeout {
                    self.to_half_open(&mut core);
                } else {
                    return Err(BreakerError::Open {
                        name: self.name.clone(),
                    });
                }
            }
        }

        match op().await {
            Ok(value) => {
                self.on_success().await;
                Ok(value)
            }
            Err(err) => {
                self.on_failure().await;
                Err(BreakerError::Inner(err))
            }
        }
    }

    async fn on_success(&self) {
        let mut core = self.core.lock().await;
        match core.state {
            CircuitState::HalfOpen => {
                core.success_count += 1;
                if core.success_count >= self.success_threshold {
                    self.to_closed(&mut core);
                }
            }
            CircuitState::Closed => {
                // Consecutive failures only; a success clears the streak
                core.failure_count = 0;
            }
            CircuitState::Open => {}
        }
    }

    async fn on_failure(&self) {
        let mut core = self.core.lock().await;
        core.total_failures += 1;
        core.last_failure_time = Some(Instant::now());

        match core.state {
            CircuitState::HalfOpen => self.to_open(&mut core),
            CircuitState::Closed => {
                core.failure_count += 1;
                if core.failure_count >= self.failure_threshold {
                    self.to_open(&mut core);
                }
            }
            CircuitState::Open => {}
        }
    }

    fn to_open(&self, core: &mut BreakerCore) {
        if core.state != CircuitState::Open {
            let previous = core.state;
            core.state = CircuitState::Open;
            core.success_count = 0;
            warn!(
                "Circuit breaker [{}] opened ({} -> OPEN) - failures: {}/{}",
                self.name,
                previous.as_str(),
                core.failure_count,
                self.failure_threshold
            );
        }
    }

    fn to_half_open(&self, core: &mut BreakerCore) {
        if core.state != CircuitState::HalfOpen {
            let previous = core.state;
            core.state = CircuitState::HalfOpen;
            core.success_count = 0;
            info!(
                "Circuit breaker [{}] half-opened ({} -> HALF_OPEN) after {:?} timeout",
                self.name,
                previous.as_str(),
                self.reset_timeout
            );
        }
    }

    fn to_closed(&self, core: &mut BreakerCore) {
        if core.state != CircuitState::Closed {
            let previous = core.state;
            core.state = CircuitState::Closed;
            core.failure_count = 0;
            core.success_count = 0;
            info!(
                "Circuit breaker [{}] closed ({} -> CLOSED) after {} successes",
                self.name,
                previous.as_str(),
                self.success_threshold
            );
        }
    }

    /// Force CLOSED and zero the transient counters. Lifetime totals stay.
    pub async fn reset(&self) {
        let mut core = self.core.lock().await;
        let previous = core.state;
        core.state = CircuitState::Closed;
        core.failure_count = 0;
        core.success_count = 0;
        core.last_failure_time = None;
        info!(
            "Circuit breaker [{}] manually reset ({} -> CLOSED)",
            self.name,
            previous.as_str()
        );
    }

    pub async fn state(&self) -> CircuitState {
        self.core.lock().await.state
    }

    pub async fn metrics(&self) -> BreakerMetrics {
        let core = self.core.lock().await;
        BreakerMetrics {
            state: core.state,
            failure_count: core.failure_count,
            success_count: core.success_count,
            last_failure_time: core.last_failure_time,
            total_executions: core.total_executions,
            total_failures: core.total_failures,
        }
    }

    pub async fn failure_rate(&self) -> f64 {
        let core = self.core.lock().await;
        if core.total_executions == 0 {
            return 0.0;
        }
        (core.total_failures as f64 / core.total_executions as f64) * 100.0
    }
}
