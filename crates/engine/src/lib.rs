// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Operation coordinator runtime
//!
//! Async entry points over the `opc-core` lock table and wait queue:
//! exclusive execution with retry, FIFO queuing, name-based deduplication,
//! batched execution, weak cancellation and stale-lock reclamation.

mod coordinator;
mod error;
mod events;
mod execute;
mod maintenance;

pub use coordinator::{Coordinator, CoordinatorBuilder};
pub use error::{CoordinatorError, WorkError};
pub use events::{EventSink, RecordingSink};
pub use execute::{BatchItem, ExecuteOptions, QueuedOperation};
pub use maintenance::{MaintenanceConfig, MaintenanceHandle};

pub use opc_core::{
    ActiveOperation, Clock, ConfigError, CoordinationEvent, CoordinatorConfig,
    CoordinatorStatistics, CoordinatorStatus, FakeClock, Rejection, RetryMode, Retryable,
    SequentialTicketGen, ServiceError, SystemClock,
};
