//! Shared helpers for coordinator specs

pub use opc_engine::{
    CoordinationEvent, Coordinator, CoordinatorConfig, CoordinatorError, ExecuteOptions,
    FakeClock, RecordingSink, Rejection, RetryMode, SequentialTicketGen, ServiceError,
};
pub use std::sync::atomic::{AtomicU32, Ordering};
pub use std::sync::{Arc, Mutex};
pub use std::time::Duration;

use futures::future::BoxFuture;
use std::sync::Once;
use tokio::sync::Semaphore;

pub type Outcome<T = ()> = Result<T, CoordinatorError<ServiceError>>;

/// A coordinator on a fake clock, recording every event
pub struct Harness {
    pub coordinator: Coordinator<FakeClock>,
    pub clock: FakeClock,
    pub sink: Arc<RecordingSink>,
}

impl Harness {
    pub fn new(config: CoordinatorConfig) -> Self {
        init_tracing();
        let clock = FakeClock::new();
        let sink = Arc::new(RecordingSink::new());
        let coordinator = Coordinator::builder(config)
            .clock(clock.clone())
            .ticket_gen(SequentialTicketGen::new("spec"))
            .event_sink(sink.clone())
            .build()
            .unwrap();
        Self {
            coordinator,
            clock,
            sink,
        }
    }

    pub fn with_capacity(max_concurrent: usize) -> Self {
        Self::new(CoordinatorConfig::new().with_max_concurrent(max_concurrent))
    }

    pub fn active_keys(&self) -> Vec<String> {
        self.coordinator
            .status()
            .active_operations
            .into_iter()
            .map(|op| op.key)
            .collect()
    }

    /// Start `execute_exclusive` on a background task holding `key` until `gate` opens
    pub fn hold(&self, key: &str, gate: &Gate) -> tokio::task::JoinHandle<Outcome> {
        let coordinator = self.coordinator.clone();
        let key = key.to_string();
        let work = gate.work();
        tokio::spawn(async move {
            coordinator
                .execute_exclusive(key, "hold", work, ExecuteOptions::new())
                .await
        })
    }
}

/// Blocks work until opened
#[derive(Clone)]
pub struct Gate(Arc<Semaphore>);

impl Gate {
    pub fn new() -> Self {
        Self(Arc::new(Semaphore::new(0)))
    }

    pub fn open(&self) {
        self.0.close();
    }

    pub fn work(&self) -> impl FnMut() -> BoxFuture<'static, Result<(), ServiceError>> + Send + 'static {
        let gate = Arc::clone(&self.0);
        move || {
            let gate = Arc::clone(&gate);
            Box::pin(async move {
                let _ = gate.acquire().await;
                Ok(())
            })
        }
    }
}

/// Let spawned tasks run up to their next suspension point
pub async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}
