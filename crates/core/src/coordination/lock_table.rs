// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lock table: active operation records keyed by operation key
//!
//! Admission enforces two independent constraints: at most one record per key,
//! and at most `max_concurrent` records overall. A record older than the
//! operation timeout is stale and gets evicted by the next admission for its
//! key or by an explicit sweep.

use crate::clock::Clock;
use crate::config::CoordinatorConfig;
use crate::error::Rejection;
use crate::event::CoordinationEvent;
use crate::ticket::Ticket;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// An admitted, not yet released operation
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OperationRecord {
    pub key: String,
    /// Human-readable operation name, used for diagnostics and deduplication
    pub operation: String,
    pub owner: Option<String>,
    pub started_at: Instant,
    /// Automatic retries performed before this admission
    pub attempt: u32,
    pub ticket: Ticket,
}

impl OperationRecord {
    pub fn age(&self, clock: &impl Clock) -> Duration {
        clock.age_of(self.started_at)
    }

    pub fn is_stale(&self, timeout: Duration, clock: &impl Clock) -> bool {
        self.age(clock) > timeout
    }
}

/// A request to insert a record
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AdmissionRequest {
    pub key: String,
    pub operation: String,
    pub owner: Option<String>,
    pub attempt: u32,
    /// When set, reject if any active record with the same operation name
    /// started within this window
    pub duplicate_window: Option<Duration>,
}

impl AdmissionRequest {
    pub fn new(key: impl Into<String>, operation: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            operation: operation.into(),
            owner: None,
            attempt: 0,
            duplicate_window: None,
        }
    }

    pub fn with_owner(mut self, owner: Option<String>) -> Self {
        self.owner = owner;
        self
    }

    pub fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt = attempt;
        self
    }

    pub fn with_duplicate_window(mut self, window: Option<Duration>) -> Self {
        self.duplicate_window = window;
        self
    }
}

/// The subset of the config admission depends on
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AdmissionLimits {
    pub max_concurrent: usize,
    pub operation_timeout: Duration,
}

impl From<&CoordinatorConfig> for AdmissionLimits {
    fn from(config: &CoordinatorConfig) -> Self {
        Self {
            max_concurrent: config.max_concurrent,
            operation_timeout: config.operation_timeout,
        }
    }
}

/// Active operation records
#[derive(Clone, Debug, Default)]
pub struct LockTable {
    records: HashMap<String, OperationRecord>,
}

impl LockTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&OperationRecord> {
        self.records.get(key)
    }

    pub fn records(&self) -> impl Iterator<Item = &OperationRecord> {
        self.records.values()
    }

    pub fn has_capacity(&self, max_concurrent: usize) -> bool {
        self.records.len() < max_concurrent
    }

    /// Check-and-insert in one step
    ///
    /// On success the record is inserted with `ticket`, `started_at = now`.
    pub fn try_admit(
        &mut self,
        request: &AdmissionRequest,
        ticket: Ticket,
        limits: AdmissionLimits,
        clock: &impl Clock,
    ) -> (Result<(), Rejection>, Vec<CoordinationEvent>) {
        let mut events = Vec::new();

        match self.check(request, limits, clock, &mut events) {
            Ok(()) => {
                self.records.insert(
                    request.key.clone(),
                    OperationRecord {
                        key: request.key.clone(),
                        operation: request.operation.clone(),
                        owner: request.owner.clone(),
                        started_at: clock.now(),
                        attempt: request.attempt,
                        ticket,
                    },
                );
                events.push(CoordinationEvent::Admitted {
                    key: request.key.clone(),
                    operation: request.operation.clone(),
                    owner: request.owner.clone(),
                    attempt: request.attempt,
                });
                (Ok(()), events)
            }
            Err(reason) => {
                events.push(CoordinationEvent::Rejected {
                    key: request.key.clone(),
                    operation: request.operation.clone(),
                    reason: reason.clone(),
                });
                (Err(reason), events)
            }
        }
    }

    fn check(
        &mut self,
        request: &AdmissionRequest,
        limits: AdmissionLimits,
        clock: &impl Clock,
        events: &mut Vec<CoordinationEvent>,
    ) -> Result<(), Rejection> {
        if let Some(window) = request.duplicate_window {
            let duplicate = self
                .records
                .values()
                .any(|r| r.operation == request.operation && r.age(clock) < window);
            if duplicate {
                return Err(Rejection::DuplicateOperation {
                    operation: request.operation.clone(),
                    window,
                });
            }
        }

        if let Some(existing) = self.records.get(&request.key) {
            if !existing.is_stale(limits.operation_timeout, clock) {
                return Err(Rejection::DuplicateInFlight {
                    key: request.key.clone(),
                });
            }
            if let Some(stale) = self.records.remove(&request.key) {
                events.push(stale_event(&stale, clock));
            }
        }

        if !self.has_capacity(limits.max_concurrent) {
            return Err(Rejection::CapacityExhausted {
                active: self.records.len(),
                max_concurrent: limits.max_concurrent,
            });
        }

        Ok(())
    }

    /// Remove the record for `key` if it still belongs to `ticket`
    ///
    /// A mismatched ticket means the record was cancelled or reclaimed and the
    /// key re-admitted; the newer record is left alone.
    pub fn release(
        &mut self,
        key: &str,
        ticket: &Ticket,
        clock: &impl Clock,
    ) -> Option<CoordinationEvent> {
        let held = self.records.get(key).is_some_and(|r| &r.ticket == ticket);
        if !held {
            return None;
        }
        self.records
            .remove(key)
            .map(|record| CoordinationEvent::Released {
                held_for: record.age(clock),
                key: record.key,
                operation: record.operation,
            })
    }

    /// Drop the record for `key` without touching the running work
    pub fn cancel_key(&mut self, key: &str) -> Option<CoordinationEvent> {
        self.records.remove(key).map(cancel_event)
    }

    /// Drop every record owned by `owner`
    pub fn cancel_owner(&mut self, owner: &str) -> Vec<CoordinationEvent> {
        let keys: Vec<String> = self
            .records
            .values()
            .filter(|r| r.owner.as_deref() == Some(owner))
            .map(|r| r.key.clone())
            .collect();

        keys.iter()
            .filter_map(|key| self.records.remove(key))
            .map(cancel_event)
            .collect()
    }

    /// Evict every record older than `timeout`
    pub fn reclaim_stale(
        &mut self,
        timeout: Duration,
        clock: &impl Clock,
    ) -> Vec<CoordinationEvent> {
        let stale: Vec<String> = self
            .records
            .values()
            .filter(|r| r.is_stale(timeout, clock))
            .map(|r| r.key.clone())
            .collect();

        stale
            .iter()
            .filter_map(|key| self.records.remove(key))
            .map(|record| stale_event(&record, clock))
            .collect()
    }
}

fn stale_event(record: &OperationRecord, clock: &impl Clock) -> CoordinationEvent {
    CoordinationEvent::StaleReclaimed {
        key: record.key.clone(),
        operation: record.operation.clone(),
        owner: record.owner.clone(),
        age: record.age(clock),
    }
}

fn cancel_event(record: OperationRecord) -> CoordinationEvent {
    CoordinationEvent::Cancelled {
        key: record.key,
        operation: record.operation,
        owner: record.owner,
    }
}

#[cfg(test)]
#[path = "lock_table_tests.rs"]
mod tests;
