use crate::breaker::{BreakerError, CircuitBreaker, CircuitBreakerOptions, CircuitState};
use crate::db::port::StoreError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

fn options(failure_threshold: u32, reset_ms: u64, success_threshold: u32) -> CircuitBreakerOptions {
    CircuitBreakerOptions {
        name: "database".to_string(),
        failure_threshold,
        reset_timeout: Duration::from_millis(reset_ms),
        success_threshold,
    }
}

async fn fail(breaker: &CircuitBreaker) -> Result<(), BreakerError<StoreError>> {
    breaker
        .execute(|| async { Err::<(), _>(StoreError::Unavailable("down".to_string())) })
        .await
}

async fn succeed(breaker: &CircuitBreaker) -> Result<(), BreakerError<StoreError>> {
    breaker.execute(|| async { Ok::<(), StoreError>(()) }).await
}

#[tokio::test]
async fn trips_open_after_consecutive_failures() {
    let breaker = CircuitBreaker::new(options(3, 60_000, 2));

    for _ in 0..3 {
        let _ = fail(&breaker).await;
    }
    assert_eq!(breaker.state().await, CircuitState::Open);

    // The next call must be rejected without running the guarded closure
    let attempts = AtomicUsize::new(0);
    let result = breaker
        .execute(|| async {
            attempts.fetch_add(1, Ordering::SeqCst);
            Ok::<(), StoreError>(())
        })
        .await;

    assert!(matches!(result, Err(BreakerError::Open { .. })));
    assert_eq!(attempts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn failure_burst_at_default_threshold_sheds_the_next_call() {
    let breaker = CircuitBreaker::new(CircuitBreakerOptions::new("database"));

    for _ in 0..5 {
        let _ = fail(&breaker).await;
    }
    assert_eq!(breaker.state().await, CircuitState::Open);

    // The sixth call fails fast without touching the dependency
    let attempts = AtomicUsize::new(0);
    let result = breaker
        .execute(|| async {
            attempts.fetch_add(1, Ordering::SeqCst);
            Ok::<(), StoreError>(())
        })
        .await;

    assert!(matches!(result, Err(BreakerError::Open { .. })));
    assert_eq!(attempts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn success_clears_failure_streak_while_closed() {
    let breaker = CircuitBreaker::new(options(3, 60_000, 2));

    let _ = fail(&breaker).await;
    let _ = fail(&breaker).await;
    succeed(&breaker).await.unwrap();

    // The streak restarted; two more failures stay under the threshold
    let _ = fail(&breaker).await;
    let _ = fail(&breaker).await;
    assert_eq!(breaker.state().await, CircuitState::Closed);

    let _ = fail(&breaker).await;
    assert_eq!(breaker.state().await, CircuitState::Open);
}

#[tokio::test]
async fn half_open_closes_after_success_threshold() {
    let breaker = CircuitBreaker::new(options(1, 50, 2));

    let _ = fail(&breaker).await;
    assert_eq!(breaker.state().await, CircuitState::Open);

    tokio::time::sleep(Duration::from_millis(60)).await;

    // First trial call is admitted and the breaker goes half-open
    succeed(&breaker).await.unwrap();
    assert_eq!(breaker.state().await, CircuitState::HalfOpen);

    succeed(&breaker).await.unwrap();
    assert_eq!(breaker.state().await, CircuitState::Closed);
}

#[tokio::test]
async fn half_open_failure_reopens_immediately() {
    let breaker = CircuitBreaker::new(options(1, 50, 2));

    let _ = fail(&breaker).await;
    assert_eq!(breaker.state().await, CircuitState::Open);

    tokio::time::sleep(Duration::from_millis(60)).await;

    let _ = fail(&breaker).await;
    assert_eq!(breaker.state().await, CircuitState::Open);
}

#[tokio::test]
async fn inner_error_passes_through_unchanged() {
    let breaker = CircuitBreaker::new(options(5, 60_000, 2));

    let result = fail(&breaker).await;
    match result {
        Err(BreakerError::Inner(StoreError::Unavailable(msg))) => {
            assert_eq!(msg, "down");
        }
        other => panic!("expected the inner store error, got {:?}", other.err()),
    }
}

#[tokio::test]
async fn metrics_accumulate_and_manual_reset_clears_transients() {
    let breaker = CircuitBreaker::new(options(2, 60_000, 2));

    succeed(&breaker).await.unwrap();
    let _ = fail(&breaker).await;
    let _ = fail(&breaker).await;

    let metrics = breaker.metrics().await;
    assert_eq!(metrics.state, CircuitState::Open);
    assert_eq!(metrics.total_executions, 3);
    assert_eq!(metrics.total_failures, 2);
    assert_eq!(metrics.failure_count, 2);
    assert!(metrics.last_failure_time.is_some());
    assert!((breaker.failure_rate().await - 66.6).abs() < 1.0);

    breaker.reset().await;
    let metrics = breaker.metrics().await;
    assert_eq!(metrics.state, CircuitState::Closed);
    assert_eq!(metrics.failure_count, 0);
    assert!(metrics.last_failure_time.is_none());

    // Lifetime counters survive a manual reset
    assert_eq!(metrics.total_executions, 3);
    assert_eq!(metrics.total_failures, 2);
}
