// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! opc-core: synchronous building blocks of the operation coordinator
//!
//! This crate provides:
//! - The lock table (per-key exclusion plus a global concurrency ceiling)
//! - The FIFO wait queue
//! - Retry classification and the fixed-delay backoff policy
//! - Configuration, events and status snapshots
//!
//! Nothing here suspends or spawns; every operation takes an injectable clock.

pub mod backoff;
pub mod clock;
pub mod config;
pub mod coordination;
pub mod error;
pub mod event;
pub mod ticket;

pub use backoff::{is_retryable_status, BackoffPolicy, RetryDecision, Retryable};
pub use clock::{Clock, FakeClock, SystemClock};
pub use config::{ConfigError, CoordinatorConfig, RetryMode};
pub use coordination::{
    ActiveOperation, AdmissionLimits, AdmissionRequest, CoordinatorStatistics, CoordinatorStatus,
    LockTable, OperationRecord, Popped, QueuedRequest, WaitQueue,
};
pub use error::{Rejection, ServiceError};
pub use event::CoordinationEvent;
pub use ticket::{SequentialTicketGen, Ticket, TicketGen, UuidTicketGen};
