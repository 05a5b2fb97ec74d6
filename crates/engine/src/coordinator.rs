// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The operation coordinator
//!
//! Owns the lock table, the wait queue and the live config behind one mutex.
//! Bookkeeping (admit, release, enqueue, drain, cancel) happens entirely
//! inside synchronous critical sections; only units of work and retry delays
//! suspend.

use crate::events::{log_event, EventSink};
use opc_core::{
    AdmissionLimits, AdmissionRequest, Clock, ConfigError, CoordinationEvent, CoordinatorConfig,
    CoordinatorStatistics, CoordinatorStatus, LockTable, Popped, Rejection, SystemClock, Ticket,
    TicketGen, UuidTicketGen, WaitQueue,
};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::oneshot;

/// Runs a queued request once the drain has admitted or rejected it
///
/// An admission the dispatcher cannot use is handed back and released by
/// `deliver`.
pub(crate) type Dispatch<C> =
    Box<dyn FnOnce(Result<Admission<C>, Rejection>) -> Option<Admission<C>> + Send>;

/// Queue payload: what to admit, and who to tell
struct Deferred<C: Clock> {
    request: AdmissionRequest,
    dispatch: Dispatch<C>,
}

/// Drain output, delivered after the state lock is released
type Ready<C> = Vec<(Dispatch<C>, Result<Admission<C>, Rejection>)>;

struct State<C: Clock> {
    table: LockTable,
    queue: WaitQueue<Deferred<C>>,
    config: CoordinatorConfig,
}

struct Shared<C: Clock> {
    state: Mutex<State<C>>,
    clock: C,
    tickets: Box<dyn TicketGen>,
    sink: Option<Arc<dyn EventSink>>,
}

/// Process-wide coordinator handle
///
/// Cheap to clone; all clones share one lock table and wait queue. Construct
/// one per process (or per test) and pass it to every call site.
pub struct Coordinator<C: Clock = SystemClock> {
    shared: Arc<Shared<C>>,
}

impl<C: Clock> Clone for Coordinator<C> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

/// A held admission; dropping it releases the key
///
/// Release runs on every exit path of the work, including the caller
/// dropping the future mid-flight.
pub(crate) struct Admission<C: Clock> {
    coordinator: Coordinator<C>,
    key: String,
    /// `None` once released by `deliver`
    ticket: Option<Ticket>,
}

impl<C: Clock> Drop for Admission<C> {
    fn drop(&mut self) {
        if let Some(ticket) = self.ticket.take() {
            self.coordinator.release(&self.key, &ticket);
        }
    }
}

/// Builder for a [`Coordinator`] with injected collaborators
pub struct CoordinatorBuilder<C: Clock = SystemClock> {
    config: CoordinatorConfig,
    clock: C,
    tickets: Box<dyn TicketGen>,
    sink: Option<Arc<dyn EventSink>>,
}

impl CoordinatorBuilder<SystemClock> {
    pub fn new(config: CoordinatorConfig) -> Self {
        Self {
            config,
            clock: SystemClock,
            tickets: Box::new(UuidTicketGen),
            sink: None,
        }
    }
}

impl<C: Clock> CoordinatorBuilder<C> {
    pub fn clock<C2: Clock>(self, clock: C2) -> CoordinatorBuilder<C2> {
        CoordinatorBuilder {
            config: self.config,
            clock,
            tickets: self.tickets,
            sink: self.sink,
        }
    }

    pub fn ticket_gen(mut self, tickets: impl TicketGen + 'static) -> Self {
        self.tickets = Box::new(tickets);
        self
    }

    pub fn event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn build(self) -> Result<Coordinator<C>, ConfigError> {
        self.config.validate()?;
        Ok(Coordinator {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    table: LockTable::new(),
                    queue: WaitQueue::new(),
                    config: self.config,
                }),
                clock: self.clock,
                tickets: self.tickets,
                sink: self.sink,
            }),
        })
    }
}

impl Coordinator<SystemClock> {
    /// Coordinator on the system clock with UUID tickets
    pub fn new(config: CoordinatorConfig) -> Result<Self, ConfigError> {
        CoordinatorBuilder::new(config).build()
    }

    pub fn builder(config: CoordinatorConfig) -> CoordinatorBuilder<SystemClock> {
        CoordinatorBuilder::new(config)
    }
}

impl<C: Clock> Coordinator<C> {
    fn lock_state(&self) -> MutexGuard<'_, State<C>> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn emit(&self, event: CoordinationEvent) {
        log_event(&event);
        if let Some(sink) = &self.shared.sink {
            sink.record(&event);
        }
    }

    pub(crate) fn emit_all(&self, events: Vec<CoordinationEvent>) {
        for event in events {
            self.emit(event);
        }
    }

    /// Admission check and insert in one critical section
    pub(crate) fn admit(&self, request: &AdmissionRequest) -> Result<Admission<C>, Rejection> {
        let ticket = self.shared.tickets.issue();
        let (result, events) = {
            let mut state = self.lock_state();
            let limits = AdmissionLimits::from(&state.config);
            state
                .table
                .try_admit(request, ticket.clone(), limits, &self.shared.clock)
        };
        self.emit_all(events);

        result.map(|()| Admission {
            coordinator: self.clone(),
            key: request.key.clone(),
            ticket: Some(ticket),
        })
    }

    /// Queue `request` and wait until a drain admits or rejects it
    ///
    /// Resolves to `None` if the request was dropped undelivered.
    pub(crate) async fn admit_when_free(
        &self,
        request: AdmissionRequest,
    ) -> Option<Result<Admission<C>, Rejection>> {
        let (tx, rx) = oneshot::channel();
        let dispatch: Dispatch<C> = Box::new(move |admission| match tx.send(admission) {
            Ok(()) => None,
            Err(unsent) => unsent.ok(),
        });
        self.push_deferred(request, dispatch);
        rx.await.ok()
    }

    /// Append a deferred request to the wait queue and drain
    pub(crate) fn push_deferred(&self, request: AdmissionRequest, dispatch: Dispatch<C>) {
        let (events, ready) = {
            let mut state = self.lock_state();
            let mut events = vec![state.queue.push(
                request.key.clone(),
                request.operation.clone(),
                Deferred { request, dispatch },
                &self.shared.clock,
            )];
            let ready = self.drain_locked(&mut state, &mut events);
            (events, ready)
        };
        self.emit_all(events);
        self.deliver(ready);
    }

    /// Release `key` if `ticket` still holds it, then drain the queue
    fn release(&self, key: &str, ticket: &Ticket) {
        let ready = self.release_and_drain(key, ticket);
        self.deliver(ready);
    }

    fn release_and_drain(&self, key: &str, ticket: &Ticket) -> Ready<C> {
        let (events, ready) = {
            let mut state = self.lock_state();
            let mut events: Vec<CoordinationEvent> = state
                .table
                .release(key, ticket, &self.shared.clock)
                .into_iter()
                .collect();
            let ready = self.drain_locked(&mut state, &mut events);
            (events, ready)
        };
        self.emit_all(events);
        ready
    }

    /// Admit queued requests while capacity remains
    ///
    /// Runs inside the caller's critical section. Expired requests are failed
    /// without consuming capacity; admitted and rejected requests are returned
    /// for delivery once the lock is dropped.
    fn drain_locked(
        &self,
        state: &mut State<C>,
        events: &mut Vec<CoordinationEvent>,
    ) -> Ready<C> {
        let clock = &self.shared.clock;
        let limits = AdmissionLimits::from(&state.config);
        let mut ready = Vec::new();

        while state.table.has_capacity(limits.max_concurrent) {
            let Some(popped) = state.queue.pop(limits.operation_timeout, clock) else {
                break;
            };
            match popped {
                Popped::Expired(queued, event) => {
                    let waited = queued.waited(clock);
                    events.push(event);
                    ready.push((
                        queued.payload.dispatch,
                        Err(Rejection::QueueTimeout {
                            key: queued.key,
                            waited,
                        }),
                    ));
                }
                Popped::Ready(queued) => {
                    let Deferred { request, dispatch } = queued.payload;
                    let ticket = self.shared.tickets.issue();
                    let (result, admit_events) =
                        state.table.try_admit(&request, ticket.clone(), limits, clock);
                    events.extend(admit_events);
                    let admission = result.map(|()| Admission {
                        coordinator: self.clone(),
                        key: request.key,
                        ticket: Some(ticket),
                    });
                    ready.push((dispatch, admission));
                }
            }
        }

        ready
    }

    /// Hand drained requests to their callers, in queue order
    ///
    /// Admissions handed back by a dispatcher are released here, and whatever
    /// that release drains is delivered in the same loop.
    fn deliver(&self, ready: Ready<C>) {
        let mut pending = std::collections::VecDeque::from(ready);
        while let Some((dispatch, admission)) = pending.pop_front() {
            let Some(mut declined) = dispatch(admission) else {
                continue;
            };
            if let Some(ticket) = declined.ticket.take() {
                pending.extend(self.release_and_drain(&declined.key, &ticket));
            }
        }
    }

    /// Drop the lock on `key` without stopping its work
    ///
    /// The running work keeps going; a new attempt on the same key can be
    /// admitted immediately. Returns whether a record was removed.
    pub fn cancel_by_key(&self, key: &str) -> bool {
        let (events, ready) = {
            let mut state = self.lock_state();
            let mut events: Vec<CoordinationEvent> =
                state.table.cancel_key(key).into_iter().collect();
            let ready = self.drain_locked(&mut state, &mut events);
            (events, ready)
        };
        let cancelled = events
            .iter()
            .any(|e| matches!(e, CoordinationEvent::Cancelled { .. }));
        self.emit_all(events);
        self.deliver(ready);
        cancelled
    }

    /// Drop every lock held on behalf of `owner`; returns how many
    pub fn cancel_by_owner(&self, owner: &str) -> usize {
        let (events, ready, cancelled) = {
            let mut state = self.lock_state();
            let mut events = state.table.cancel_owner(owner);
            let cancelled = events.len();
            let ready = self.drain_locked(&mut state, &mut events);
            (events, ready, cancelled)
        };
        self.emit_all(events);
        self.deliver(ready);
        cancelled
    }

    /// Evict every record older than the operation timeout; returns how many
    pub fn reclaim_stale(&self) -> usize {
        let (events, ready, reclaimed) = {
            let mut state = self.lock_state();
            let timeout = state.config.operation_timeout;
            let mut events = state.table.reclaim_stale(timeout, &self.shared.clock);
            let reclaimed = events.len();
            let ready = self.drain_locked(&mut state, &mut events);
            (events, ready, reclaimed)
        };
        self.emit_all(events);
        self.deliver(ready);
        reclaimed
    }

    pub fn status(&self) -> CoordinatorStatus {
        let state = self.lock_state();
        CoordinatorStatus::collect(
            &state.table,
            state.queue.len(),
            state.config.max_concurrent,
            &self.shared.clock,
        )
    }

    pub fn statistics(&self) -> CoordinatorStatistics {
        let state = self.lock_state();
        CoordinatorStatistics::collect(&state.table, state.queue.len(), &self.shared.clock)
    }

    pub fn config(&self) -> CoordinatorConfig {
        self.lock_state().config.clone()
    }

    /// Replace the live config
    ///
    /// Running operations are unaffected. The new limits apply from the next
    /// admission, and a drain runs immediately so a raised ceiling admits
    /// waiting requests.
    pub fn reload_config(&self, config: CoordinatorConfig) -> Result<(), ConfigError> {
        config.validate()?;
        let (events, ready) = {
            let mut state = self.lock_state();
            let mut events = vec![CoordinationEvent::ConfigReloaded {
                max_concurrent: config.max_concurrent,
                operation_timeout: config.operation_timeout,
            }];
            state.config = config;
            let ready = self.drain_locked(&mut state, &mut events);
            (events, ready)
        };
        self.emit_all(events);
        self.deliver(ready);
        Ok(())
    }
}

#[cfg(test)]
#[path = "coordinator_tests.rs"]
mod tests;
