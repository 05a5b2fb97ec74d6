// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Running units of work under the coordinator's guarantees
//!
//! Lifecycle of one call: admitted, running, then succeeded, failed, or
//! released and re-admitted for a retry. Admission rejections are never
//! retried here; the caller decides whether to resubmit.

use crate::coordinator::{Admission, Coordinator, Dispatch};
use crate::error::{CoordinatorError, WorkError};
use futures::future::join_all;
use opc_core::{AdmissionRequest, BackoffPolicy, Clock, CoordinationEvent, Rejection, RetryDecision};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

/// Per-call options
#[derive(Clone, Debug)]
pub struct ExecuteOptions {
    /// Acting user, for `cancel_by_owner`
    pub owner: Option<String>,
    pub allow_retry: bool,
    /// Queue instead of failing with `CapacityExhausted`
    pub queue_when_full: bool,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            owner: None,
            allow_retry: true,
            queue_when_full: false,
        }
    }
}

impl ExecuteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    pub fn without_retry(mut self) -> Self {
        self.allow_retry = false;
        self
    }

    pub fn queue_when_full(mut self) -> Self {
        self.queue_when_full = true;
        self
    }
}

/// One entry of a [`Coordinator::run_batched`] call
pub struct BatchItem<F> {
    pub key: String,
    pub operation: String,
    pub work: F,
    pub options: ExecuteOptions,
}

impl<F> BatchItem<F> {
    pub fn new(key: impl Into<String>, operation: impl Into<String>, work: F) -> Self {
        Self {
            key: key.into(),
            operation: operation.into(),
            work,
            options: ExecuteOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ExecuteOptions) -> Self {
        self.options = options;
        self
    }
}

/// Handle to an enqueued operation; resolves with its result
///
/// Dropping the handle does not withdraw the request: the work still runs
/// when admitted, its result is discarded.
#[must_use = "the queued operation's result is only observable through this handle"]
pub struct QueuedOperation<T, E> {
    key: String,
    rx: oneshot::Receiver<Result<T, CoordinatorError<E>>>,
}

impl<T, E> QueuedOperation<T, E> {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl<T, E> Future for QueuedOperation<T, E> {
    type Output = Result<T, CoordinatorError<E>>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        Pin::new(&mut this.rx).poll(cx).map(|received| {
            received.unwrap_or_else(|_| {
                Err(CoordinatorError::Abandoned {
                    key: this.key.clone(),
                })
            })
        })
    }
}

impl<C: Clock> Coordinator<C> {
    /// Run `work` with exclusive hold of `key`
    ///
    /// Fails immediately with a rejection if `key` is in flight or the global
    /// ceiling is reached (unless `queue_when_full` is set). Retryable
    /// failures are retried after the configured delay while the budget lasts.
    pub async fn execute_exclusive<T, E, F, Fut>(
        &self,
        key: impl Into<String>,
        operation: impl Into<String>,
        work: F,
        options: ExecuteOptions,
    ) -> Result<T, CoordinatorError<E>>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: WorkError,
    {
        let request = AdmissionRequest::new(key, operation).with_owner(options.owner.clone());
        self.submit(request, work, options).await
    }

    /// Like [`execute_exclusive`](Self::execute_exclusive), but also rejects
    /// with `DuplicateOperation` when an operation with the same name started
    /// within the duplicate window, whatever its key
    pub async fn prevent_duplicate<T, E, F, Fut>(
        &self,
        key: impl Into<String>,
        operation: impl Into<String>,
        work: F,
        options: ExecuteOptions,
    ) -> Result<T, CoordinatorError<E>>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: WorkError,
    {
        let window = self.config().duplicate_window;
        let request = AdmissionRequest::new(key, operation)
            .with_owner(options.owner.clone())
            .with_duplicate_window(Some(window));
        self.submit(request, work, options).await
    }

    /// Append `work` to the wait queue and return a handle to its result
    ///
    /// The queue drains immediately, so with free capacity the work is
    /// admitted before this returns. Requests that wait longer than the
    /// operation timeout fail with `QueueTimeout` without running.
    pub fn enqueue<T, E, F, Fut>(
        &self,
        key: impl Into<String>,
        operation: impl Into<String>,
        work: F,
        options: ExecuteOptions,
    ) -> QueuedOperation<T, E>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: WorkError,
    {
        let request = AdmissionRequest::new(key, operation).with_owner(options.owner.clone());
        self.defer(request, work, options)
    }

    /// Run items in sequential chunks of `batch_size`
    ///
    /// Items within a chunk run concurrently; the next chunk starts once the
    /// whole chunk has settled. Results come back in input order. A
    /// `batch_size` of zero is treated as one.
    pub async fn run_batched<T, E, F, Fut>(
        &self,
        items: Vec<BatchItem<F>>,
        batch_size: usize,
    ) -> Vec<Result<T, CoordinatorError<E>>>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: WorkError,
    {
        let batch_size = batch_size.max(1);
        let mut results = Vec::with_capacity(items.len());
        let mut items = items.into_iter().peekable();

        while items.peek().is_some() {
            let chunk = items.by_ref().take(batch_size).map(|item| {
                self.execute_exclusive(item.key, item.operation, item.work, item.options)
            });
            results.extend(join_all(chunk).await);
        }

        results
    }

    async fn submit<T, E, F, Fut>(
        &self,
        request: AdmissionRequest,
        work: F,
        options: ExecuteOptions,
    ) -> Result<T, CoordinatorError<E>>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: WorkError,
    {
        match self.admit(&request) {
            Ok(admission) => self.run_admitted(admission, request, work, options).await,
            Err(Rejection::CapacityExhausted { .. }) if options.queue_when_full => {
                self.defer(request.with_duplicate_window(None), work, options)
                    .await
            }
            Err(rejection) => Err(rejection.into()),
        }
    }

    fn defer<T, E, F, Fut>(
        &self,
        request: AdmissionRequest,
        work: F,
        options: ExecuteOptions,
    ) -> QueuedOperation<T, E>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: WorkError,
    {
        let (tx, rx) = oneshot::channel();
        let key = request.key.clone();
        let coordinator = self.clone();
        let deferred_request = request.clone();

        let dispatch: Dispatch<C> = Box::new(move |admission| match admission {
            Ok(admission) => match tokio::runtime::Handle::try_current() {
                Ok(runtime) => {
                    runtime.spawn(async move {
                        let result = coordinator
                            .run_admitted(admission, deferred_request, work, options)
                            .await;
                        let _ = tx.send(result);
                    });
                    None
                }
                Err(_) => {
                    tracing::warn!(key = %deferred_request.key, "no runtime to run queued operation");
                    let _ = tx.send(Err(CoordinatorError::Abandoned {
                        key: deferred_request.key,
                    }));
                    Some(admission)
                }
            },
            Err(rejection) => {
                let _ = tx.send(Err(rejection.into()));
                None
            }
        });

        self.push_deferred(request, dispatch);
        QueuedOperation { key, rx }
    }

    /// Run admitted work, retrying retryable failures
    ///
    /// The admission is released before every retry delay and before the
    /// final result is returned. A retry that cannot be re-admitted ends with
    /// `RetryExhausted` carrying the last failure, unless `queue_when_full`
    /// lets it wait for a free slot.
    async fn run_admitted<T, E, F, Fut>(
        &self,
        admission: Admission<C>,
        request: AdmissionRequest,
        mut work: F,
        options: ExecuteOptions,
    ) -> Result<T, CoordinatorError<E>>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: WorkError,
    {
        let policy = BackoffPolicy::from_config(&self.config());
        // retries re-enter through plain key admission, as execute_exclusive does
        let request = request.with_duplicate_window(None);
        let mut retries = request.attempt;
        let mut admission = admission;

        loop {
            let outcome = work().await;
            drop(admission);

            let error = match outcome {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            let retryable = error.is_retryable();
            let decision = if options.allow_retry {
                policy.decide(retries, retryable)
            } else if retryable {
                RetryDecision::Exhausted
            } else {
                RetryDecision::Terminal
            };

            match decision {
                RetryDecision::RetryAfter(delay) => {
                    retries += 1;
                    tracing::warn!(key = %request.key, %error, "operation failed, will retry");
                    self.emit(CoordinationEvent::RetryScheduled {
                        key: request.key.clone(),
                        operation: request.operation.clone(),
                        attempt: retries,
                        delay,
                    });
                    tokio::time::sleep(delay).await;
                    admission = match self.readmit(&request, retries, &options).await {
                        Ok(admission) => admission,
                        Err(rejection) => {
                            let reason = rejection.as_ref().map_or("abandoned", Rejection::kind);
                            tracing::warn!(key = %request.key, reason, "retry not admitted");
                            return Err(CoordinatorError::RetryExhausted {
                                key: request.key,
                                attempts: retries,
                                source: error,
                            });
                        }
                    };
                }
                RetryDecision::Exhausted => {
                    return Err(CoordinatorError::RetryExhausted {
                        key: request.key,
                        attempts: retries + 1,
                        source: error,
                    });
                }
                RetryDecision::Terminal => return Err(CoordinatorError::Work(error)),
            }
        }
    }

    /// Admit retry number `retries`, queuing on a full ceiling if allowed
    ///
    /// `Err(None)` means the queued retry was dropped before a drain reached it.
    async fn readmit(
        &self,
        request: &AdmissionRequest,
        retries: u32,
        options: &ExecuteOptions,
    ) -> Result<Admission<C>, Option<Rejection>> {
        let retry = request.clone().with_attempt(retries);
        match self.admit(&retry) {
            Err(Rejection::CapacityExhausted { .. }) if options.queue_when_full => {
                match self.admit_when_free(retry).await {
                    Some(admitted) => admitted.map_err(Some),
                    None => Err(None),
                }
            }
            admitted => admitted.map_err(Some),
        }
    }
}
