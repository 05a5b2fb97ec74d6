//! Automatic retry specs
//!
//! Default mode retries a retryable failure once; budget mode retries up to
//! `max_retries` times.

use crate::prelude::*;

fn unavailable(calls: &Arc<AtomicU32>) -> impl FnMut() -> futures::future::BoxFuture<'static, Result<(), ServiceError>> + Send + 'static {
    let calls = Arc::clone(calls);
    move || {
        calls.fetch_add(1, Ordering::SeqCst);
        Box::pin(async { Err(ServiceError::status(503, "service unavailable")) })
    }
}

fn retry_config(mode: RetryMode) -> CoordinatorConfig {
    CoordinatorConfig::new()
        .with_max_retries(3)
        .with_retry_delay(Duration::from_secs(1))
        .with_retry_mode(mode)
}

#[tokio::test(start_paused = true)]
async fn single_mode_retries_once_after_delay() {
    let h = Harness::new(retry_config(RetryMode::Single));
    let calls = Arc::new(AtomicU32::new(0));
    let started = tokio::time::Instant::now();

    let result = h
        .coordinator
        .execute_exclusive("lab-1", "enter lab result", unavailable(&calls), ExecuteOptions::new())
        .await;

    match result {
        Err(CoordinatorError::RetryExhausted { key, attempts, source }) => {
            assert_eq!(key, "lab-1");
            assert_eq!(attempts, 2);
            assert_eq!(source, ServiceError::status(503, "service unavailable"));
        }
        other => panic!("expected RetryExhausted, got {:?}", other),
    }
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(started.elapsed() >= Duration::from_secs(1));
    assert!(started.elapsed() < Duration::from_secs(2));
    similar_asserts::assert_eq!(
        h.sink.events().into_iter().find(|e| e.name() == "retry_scheduled"),
        Some(CoordinationEvent::RetryScheduled {
            key: "lab-1".to_string(),
            operation: "enter lab result".to_string(),
            attempt: 1,
            delay: Duration::from_secs(1),
        })
    );
}

#[tokio::test(start_paused = true)]
async fn budget_mode_spends_every_retry() {
    let h = Harness::new(retry_config(RetryMode::Budget));
    let calls = Arc::new(AtomicU32::new(0));

    let result = h
        .coordinator
        .execute_exclusive("lab-1", "enter lab result", unavailable(&calls), ExecuteOptions::new())
        .await;

    assert!(matches!(
        result,
        Err(CoordinatorError::RetryExhausted { attempts: 4, .. })
    ));
    assert_eq!(calls.load(Ordering::SeqCst), 4);
    assert_eq!(h.sink.count("retry_scheduled"), 3);
}

#[tokio::test(start_paused = true)]
async fn non_retryable_failure_is_attempted_once() {
    let h = Harness::new(retry_config(RetryMode::Budget));
    let calls = Arc::new(AtomicU32::new(0));
    let work = {
        let calls = Arc::clone(&calls);
        move || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(ServiceError::status(400, "bad request")) }
        }
    };

    let result = h
        .coordinator
        .execute_exclusive("lab-1", "enter lab result", work, ExecuteOptions::new())
        .await;

    let err = result.unwrap_err();
    assert_eq!(err.to_string(), "service responded 400: bad request");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.sink.count("retry_scheduled"), 0);
}
