//! Wait queue specs

use crate::prelude::*;

#[tokio::test]
async fn waiting_requests_start_in_arrival_order() {
    let h = Harness::with_capacity(1);
    let gate = Gate::new();
    let blocker = h.hold("blocker", &gate);
    settle().await;

    let started = Arc::new(Mutex::new(Vec::new()));
    let handles: Vec<_> = ["patient-4", "patient-1", "patient-3", "patient-2"]
        .into_iter()
        .map(|key| {
            let started = Arc::clone(&started);
            h.coordinator.enqueue(
                key,
                "check in",
                move || {
                    started.lock().unwrap().push(key);
                    async { Ok::<_, ServiceError>(()) }
                },
                ExecuteOptions::new(),
            )
        })
        .collect();
    assert_eq!(h.coordinator.status().queued_count, 4);

    gate.open();
    blocker.await.unwrap().unwrap();
    for handle in handles {
        handle.await.unwrap();
    }

    similar_asserts::assert_eq!(
        *started.lock().unwrap(),
        vec!["patient-4", "patient-1", "patient-3", "patient-2"]
    );
    assert_eq!(h.coordinator.status().queued_count, 0);
}

#[tokio::test]
async fn request_waiting_past_timeout_fails_without_running() {
    let h = Harness::new(
        CoordinatorConfig::new()
            .with_max_concurrent(1)
            .with_operation_timeout(Duration::from_secs(10)),
    );
    let gate = Gate::new();
    let blocker = h.hold("blocker", &gate);
    settle().await;

    let ran = Arc::new(AtomicU32::new(0));
    let late = {
        let ran = Arc::clone(&ran);
        h.coordinator.enqueue(
            "late",
            "check in",
            move || {
                ran.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, ServiceError>(()) }
            },
            ExecuteOptions::new(),
        )
    };
    h.clock.advance(Duration::from_secs(11));

    gate.open();
    blocker.await.unwrap().unwrap();

    let err = late.await.unwrap_err();
    assert!(!err.is_already_in_progress());
    match err {
        CoordinatorError::Rejected(Rejection::QueueTimeout { key, waited }) => {
            assert_eq!(key, "late");
            assert_eq!(waited, Duration::from_secs(11));
        }
        other => panic!("expected QueueTimeout, got {:?}", other),
    }
    assert_eq!(ran.load(Ordering::SeqCst), 0);
    assert_eq!(h.sink.count("queue_timed_out"), 1);
}
