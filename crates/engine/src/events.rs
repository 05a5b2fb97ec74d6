// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event logging and observation
//!
//! Every coordination event is logged through `tracing`. Hosts that need to
//! react to events (dashboards, tests) can additionally register an
//! [`EventSink`].

use opc_core::CoordinationEvent;
use std::sync::Mutex;

/// Receives every coordination event after it is logged
pub trait EventSink: Send + Sync {
    fn record(&self, event: &CoordinationEvent);
}

/// Sink that keeps events in memory
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<CoordinationEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<CoordinationEvent> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(CoordinationEvent::name)
            .collect()
    }

    pub fn count(&self, name: &str) -> usize {
        self.names().into_iter().filter(|n| *n == name).count()
    }
}

impl EventSink for RecordingSink {
    fn record(&self, event: &CoordinationEvent) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event.clone());
    }
}

pub(crate) fn log_event(event: &CoordinationEvent) {
    match event {
        CoordinationEvent::Admitted {
            key,
            operation,
            owner,
            attempt,
        } => tracing::debug!(key = %key, operation = %operation, ?owner, attempt, "operation admitted"),
        CoordinationEvent::Rejected {
            key,
            operation,
            reason,
        } => tracing::debug!(key = %key, operation = %operation, reason = reason.kind(), "operation rejected"),
        CoordinationEvent::Released {
            key,
            operation,
            held_for,
        } => tracing::debug!(key = %key, operation = %operation, ?held_for, "operation released"),
        CoordinationEvent::StaleReclaimed {
            key,
            operation,
            owner,
            age,
        } => tracing::info!(key = %key, operation = %operation, ?owner, ?age, "reclaimed stale operation lock"),
        CoordinationEvent::Cancelled {
            key,
            operation,
            owner,
        } => tracing::info!(key = %key, operation = %operation, ?owner, "operation lock cancelled"),
        CoordinationEvent::Enqueued {
            key,
            operation,
            position,
        } => tracing::debug!(key = %key, operation = %operation, position, "operation queued"),
        CoordinationEvent::QueueTimedOut {
            key,
            operation,
            waited,
        } => tracing::warn!(key = %key, operation = %operation, ?waited, "queued operation timed out"),
        CoordinationEvent::RetryScheduled {
            key,
            operation,
            attempt,
            delay,
        } => tracing::warn!(key = %key, operation = %operation, attempt, ?delay, "retrying operation"),
        CoordinationEvent::ConfigReloaded {
            max_concurrent,
            operation_timeout,
        } => tracing::info!(max_concurrent, ?operation_timeout, "coordinator config reloaded"),
    }
}
