// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Read-only snapshots of coordinator state for host applications

use super::lock_table::{LockTable, OperationRecord};
use crate::clock::Clock;
use serde::Serialize;
use std::time::Duration;

/// One active operation as seen at snapshot time
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ActiveOperation {
    pub key: String,
    pub operation: String,
    pub owner: Option<String>,
    pub attempt: u32,
    #[serde(with = "humantime_serde")]
    pub age: Duration,
}

impl ActiveOperation {
    fn from_record(record: &OperationRecord, clock: &impl Clock) -> Self {
        Self {
            key: record.key.clone(),
            operation: record.operation.clone(),
            owner: record.owner.clone(),
            attempt: record.attempt,
            age: record.age(clock),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CoordinatorStatus {
    /// Sorted by key
    pub active_operations: Vec<ActiveOperation>,
    pub queued_count: usize,
    pub can_accept_new_operations: bool,
}

impl CoordinatorStatus {
    pub fn collect(
        table: &LockTable,
        queued_count: usize,
        max_concurrent: usize,
        clock: &impl Clock,
    ) -> Self {
        let mut active_operations: Vec<ActiveOperation> = table
            .records()
            .map(|r| ActiveOperation::from_record(r, clock))
            .collect();
        active_operations.sort_by(|a, b| a.key.cmp(&b.key));

        Self {
            active_operations,
            queued_count,
            can_accept_new_operations: table.has_capacity(max_concurrent),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CoordinatorStatistics {
    pub total_active: usize,
    pub total_queued: usize,
    /// Zero when nothing is active
    #[serde(with = "humantime_serde")]
    pub average_operation_age: Duration,
    #[serde(with = "humantime_serde")]
    pub oldest_operation_age: Duration,
}

impl CoordinatorStatistics {
    pub fn collect(table: &LockTable, queued_count: usize, clock: &impl Clock) -> Self {
        let ages: Vec<Duration> = table.records().map(|r| r.age(clock)).collect();
        let total: Duration = ages.iter().sum();
        let average = u32::try_from(ages.len())
            .ok()
            .and_then(|n| total.checked_div(n))
            .unwrap_or_default();

        Self {
            total_active: ages.len(),
            total_queued: queued_count,
            average_operation_age: average,
            oldest_operation_age: ages.iter().max().copied().unwrap_or_default(),
        }
    }
}

#[cfg(test)]
#[path = "stats_tests.rs"]
mod tests;
