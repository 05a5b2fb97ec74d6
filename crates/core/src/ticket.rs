// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Admission tickets
//!
//! Every admitted operation carries a ticket. Releasing a key only succeeds
//! for the ticket that admitted it, so work that outlives a cancellation
//! cannot release a newer admission of the same key.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Identity of one admission into the lock table
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ticket(pub String);

impl std::fmt::Display for Ticket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Issues unique tickets
pub trait TicketGen: Send + Sync {
    fn issue(&self) -> Ticket;
}

/// UUID tickets for production use
#[derive(Clone, Debug, Default)]
pub struct UuidTicketGen;

impl TicketGen for UuidTicketGen {
    fn issue(&self) -> Ticket {
        Ticket(uuid::Uuid::new_v4().to_string())
    }
}

/// Predictable tickets for tests
#[derive(Debug)]
pub struct SequentialTicketGen {
    prefix: String,
    counter: AtomicU64,
}

impl SequentialTicketGen {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            counter: AtomicU64::new(1),
        }
    }
}

impl Default for SequentialTicketGen {
    fn default() -> Self {
        Self::new("ticket")
    }
}

impl TicketGen for SequentialTicketGen {
    fn issue(&self) -> Ticket {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        Ticket(format!("{}-{}", self.prefix, n))
    }
}
