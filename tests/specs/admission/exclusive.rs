//! Per-key mutual exclusion specs

use crate::prelude::*;

#[tokio::test]
async fn second_call_on_same_key_fails_immediately() {
    let h = Harness::with_capacity(5);
    let gate = Gate::new();
    let first = h.hold("X", &gate);
    settle().await;

    let second: Outcome = h
        .coordinator
        .execute_exclusive("X", "book appointment", || async { Ok(()) }, ExecuteOptions::new())
        .await;

    match second {
        Err(CoordinatorError::Rejected(Rejection::DuplicateInFlight { key })) => {
            assert_eq!(key, "X");
        }
        other => panic!("expected DuplicateInFlight, got {:?}", other),
    }

    gate.open();
    first.await.unwrap().unwrap();
}

#[tokio::test]
async fn only_one_of_many_concurrent_calls_is_admitted() {
    let h = Harness::with_capacity(10);
    let gate = Gate::new();
    let calls: Vec<_> = (0..5)
        .map(|_| {
            h.coordinator
                .execute_exclusive("slot-9am", "book appointment", gate.work(), ExecuteOptions::new())
        })
        .collect();

    let opener = {
        let gate = gate.clone();
        tokio::spawn(async move {
            settle().await;
            gate.open();
        })
    };
    let results = futures::future::join_all(calls).await;
    opener.await.unwrap();

    let admitted = results.iter().filter(|r| r.is_ok()).count();
    let duplicates = results
        .iter()
        .filter(|r| matches!(r, Err(e) if e.is_already_in_progress()))
        .count();
    assert_eq!((admitted, duplicates), (1, 4));
    assert!(h.active_keys().is_empty());
}

#[tokio::test]
async fn stale_holder_is_evicted_by_next_admission() {
    let h = Harness::with_capacity(1);
    let gate = Gate::new();
    let hung = h.hold("K", &gate);
    settle().await;

    h.clock.advance(Duration::from_secs(31));
    let value: Outcome<&str> = h
        .coordinator
        .execute_exclusive("K", "register", || async { Ok("fresh") }, ExecuteOptions::new())
        .await;

    similar_asserts::assert_eq!(value.unwrap(), "fresh");
    similar_asserts::assert_eq!(
        h.sink.names(),
        vec!["admitted", "stale_reclaimed", "admitted", "released"]
    );

    gate.open();
    hung.await.unwrap().unwrap();
    assert!(h.active_keys().is_empty());
}

#[tokio::test]
async fn holder_within_timeout_is_not_evicted() {
    let h = Harness::with_capacity(1);
    let gate = Gate::new();
    let holder = h.hold("K", &gate);
    settle().await;

    h.clock.advance(Duration::from_secs(30));
    let second: Outcome = h
        .coordinator
        .execute_exclusive("K", "register", || async { Ok(()) }, ExecuteOptions::new())
        .await;

    assert!(matches!(
        second,
        Err(CoordinatorError::Rejected(Rejection::DuplicateInFlight { .. }))
    ));

    gate.open();
    holder.await.unwrap().unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn admitted_runs_on_one_key_never_overlap() {
    let h = Harness::with_capacity(8);
    let intervals = Arc::new(Mutex::new(Vec::new()));

    let workers: Vec<_> = (0..8)
        .map(|_| {
            let coordinator = h.coordinator.clone();
            let intervals = Arc::clone(&intervals);
            tokio::spawn(async move {
                let mut admitted = 0;
                for _ in 0..25 {
                    let intervals = Arc::clone(&intervals);
                    let result = coordinator
                        .execute_exclusive(
                            "slot-9am",
                            "book appointment",
                            move || {
                                let intervals = Arc::clone(&intervals);
                                async move {
                                    let start = std::time::Instant::now();
                                    tokio::time::sleep(Duration::from_micros(200)).await;
                                    intervals.lock().unwrap().push((start, std::time::Instant::now()));
                                    Ok::<_, ServiceError>(())
                                }
                            },
                            ExecuteOptions::new(),
                        )
                        .await;
                    match result {
                        Ok(()) => admitted += 1,
                        Err(err) => assert!(err.is_already_in_progress()),
                    }
                    tokio::task::yield_now().await;
                }
                admitted
            })
        })
        .collect();

    let mut admitted = 0;
    for worker in workers {
        admitted += worker.await.unwrap();
    }

    let mut intervals = intervals.lock().unwrap().clone();
    assert_eq!(intervals.len(), admitted);
    assert!(admitted > 0);
    intervals.sort_by_key(|(start, _)| *start);
    for pair in intervals.windows(2) {
        let (_, previous_end) = pair[0];
        let (next_start, _) = pair[1];
        assert!(
            next_start >= previous_end,
            "runs overlap: {:?} started before {:?} ended",
            next_start,
            previous_end
        );
    }
    assert!(h.active_keys().is_empty());
}
