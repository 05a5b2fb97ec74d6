// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Coordination state: the lock table, the wait queue and snapshots of both

pub mod lock_table;
pub mod stats;
pub mod wait_queue;

pub use lock_table::{AdmissionLimits, AdmissionRequest, LockTable, OperationRecord};
pub use stats::{ActiveOperation, CoordinatorStatistics, CoordinatorStatus};
pub use wait_queue::{Popped, QueuedRequest, WaitQueue};
