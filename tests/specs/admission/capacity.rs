//! Global concurrency ceiling specs
//!
//! The ceiling counts every active record, whatever its key.

use crate::prelude::*;
use std::sync::atomic::AtomicUsize;

fn sleeper(
    millis: u64,
) -> impl FnMut() -> futures::future::BoxFuture<'static, Result<(), ServiceError>> + Send + 'static
{
    move || {
        Box::pin(async move {
            tokio::time::sleep(Duration::from_millis(millis)).await;
            Ok(())
        })
    }
}

#[tokio::test(start_paused = true)]
async fn distinct_keys_are_rejected_at_global_ceiling() {
    let h = Harness::with_capacity(1);
    let c = &h.coordinator;

    let (first, second) = tokio::join!(
        c.execute_exclusive("K1", "refresh", sleeper(50), ExecuteOptions::new()),
        c.execute_exclusive("K2", "refresh", sleeper(50), ExecuteOptions::new()),
    );

    first.unwrap();
    assert!(matches!(
        second,
        Err(CoordinatorError::Rejected(Rejection::CapacityExhausted {
            active: 1,
            max_concurrent: 1
        }))
    ));
}

#[tokio::test(start_paused = true)]
async fn queued_distinct_keys_run_one_after_another() {
    let h = Harness::with_capacity(1);
    let c = &h.coordinator;
    let started = tokio::time::Instant::now();

    let (first, second) = tokio::join!(
        c.execute_exclusive("K1", "refresh", sleeper(50), ExecuteOptions::new().queue_when_full()),
        c.execute_exclusive("K2", "refresh", sleeper(50), ExecuteOptions::new().queue_when_full()),
    );

    first.unwrap();
    second.unwrap();
    assert!(started.elapsed() >= Duration::from_millis(100));
}

#[tokio::test(start_paused = true)]
async fn active_count_never_exceeds_ceiling() {
    let h = Harness::with_capacity(3);
    let running = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..10)
        .map(|i| {
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            h.coordinator.enqueue(
                format!("row-{}", i),
                "refresh row",
                move || {
                    let running = Arc::clone(&running);
                    let peak = Arc::clone(&peak);
                    async move {
                        let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                        running.fetch_sub(1, Ordering::SeqCst);
                        Ok::<_, ServiceError>(())
                    }
                },
                ExecuteOptions::new(),
            )
        })
        .collect();

    for outcome in futures::future::join_all(handles).await {
        outcome.unwrap();
    }
    assert_eq!(peak.load(Ordering::SeqCst), 3);
    assert!(h.coordinator.status().can_accept_new_operations);
}
