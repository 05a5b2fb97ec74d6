// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Events emitted by the lock table and wait queue

use crate::error::Rejection;
use std::time::Duration;

/// Something observable happened to the coordinator state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoordinationEvent {
    Admitted {
        key: String,
        operation: String,
        owner: Option<String>,
        attempt: u32,
    },
    Rejected {
        key: String,
        operation: String,
        reason: Rejection,
    },
    Released {
        key: String,
        operation: String,
        held_for: Duration,
    },
    /// A record outlived the operation timeout and was evicted
    StaleReclaimed {
        key: String,
        operation: String,
        owner: Option<String>,
        age: Duration,
    },
    Cancelled {
        key: String,
        operation: String,
        owner: Option<String>,
    },
    Enqueued {
        key: String,
        operation: String,
        position: usize,
    },
    QueueTimedOut {
        key: String,
        operation: String,
        waited: Duration,
    },
    RetryScheduled {
        key: String,
        operation: String,
        attempt: u32,
        delay: Duration,
    },
    ConfigReloaded {
        max_concurrent: usize,
        operation_timeout: Duration,
    },
}

impl CoordinationEvent {
    /// Stable event name for log lines and metrics labels
    pub fn name(&self) -> &'static str {
        match self {
            CoordinationEvent::Admitted { .. } => "admitted",
            CoordinationEvent::Rejected { .. } => "rejected",
            CoordinationEvent::Released { .. } => "released",
            CoordinationEvent::StaleReclaimed { .. } => "stale_reclaimed",
            CoordinationEvent::Cancelled { .. } => "cancelled",
            CoordinationEvent::Enqueued { .. } => "enqueued",
            CoordinationEvent::QueueTimedOut { .. } => "queue_timed_out",
            CoordinationEvent::RetryScheduled { .. } => "retry_scheduled",
            CoordinationEvent::ConfigReloaded { .. } => "config_reloaded",
        }
    }

    /// Operation key the event concerns, if any
    pub fn key(&self) -> Option<&str> {
        match self {
            CoordinationEvent::Admitted { key, .. }
            | CoordinationEvent::Rejected { key, .. }
            | CoordinationEvent::Released { key, .. }
            | CoordinationEvent::StaleReclaimed { key, .. }
            | CoordinationEvent::Cancelled { key, .. }
            | CoordinationEvent::Enqueued { key, .. }
            | CoordinationEvent::QueueTimedOut { key, .. }
            | CoordinationEvent::RetryScheduled { key, .. } => Some(key),
            CoordinationEvent::ConfigReloaded { .. } => None,
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
