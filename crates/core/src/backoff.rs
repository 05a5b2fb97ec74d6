// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Retry classification and backoff decisions
//!
//! Classification is the only extension point: implement [`Retryable`] for
//! the error type a unit of work fails with to change which failures retry.

use crate::config::{CoordinatorConfig, RetryMode};
use crate::error::ServiceError;
use std::io::ErrorKind;
use std::time::Duration;

/// Classifies an error as transient (worth retrying) or terminal
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

/// Connection and timeout failures, 5xx responses and 429 rate limits retry.
/// Everything else, including validation and permission failures, does not.
impl Retryable for ServiceError {
    fn is_retryable(&self) -> bool {
        match self {
            ServiceError::Connection(_) | ServiceError::Timeout => true,
            ServiceError::Status { code, .. } => is_retryable_status(*code),
            ServiceError::Validation(_)
            | ServiceError::NotFound(_)
            | ServiceError::PermissionDenied(_)
            | ServiceError::Other(_) => false,
        }
    }
}

impl Retryable for std::io::Error {
    fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::ConnectionRefused
                | ErrorKind::ConnectionReset
                | ErrorKind::ConnectionAborted
                | ErrorKind::NotConnected
                | ErrorKind::BrokenPipe
                | ErrorKind::TimedOut
        )
    }
}

/// 5xx server errors and 429 Too Many Requests
pub fn is_retryable_status(code: u16) -> bool {
    code == 429 || (500..=599).contains(&code)
}

/// Outcome of a backoff decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Run the work again after the delay
    RetryAfter(Duration),
    /// Retryable, but the retry budget is spent
    Exhausted,
    /// Not retryable; surface the error as is
    Terminal,
}

/// Fixed-delay retry policy derived from the coordinator config
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub retry_delay: Duration,
    pub max_retries: u32,
    pub mode: RetryMode,
}

impl BackoffPolicy {
    pub fn from_config(config: &CoordinatorConfig) -> Self {
        Self {
            retry_delay: config.retry_delay,
            max_retries: config.max_retries,
            mode: config.retry_mode,
        }
    }

    /// Number of automatic retries after the first attempt
    pub fn retry_budget(&self) -> u32 {
        match self.mode {
            RetryMode::Single => self.max_retries.min(1),
            RetryMode::Budget => self.max_retries,
        }
    }

    /// Decide what happens after a failed attempt
    ///
    /// `retries_so_far` counts automatic retries already performed (0 after the
    /// first attempt fails).
    pub fn decide(&self, retries_so_far: u32, retryable: bool) -> RetryDecision {
        if !retryable {
            return RetryDecision::Terminal;
        }
        if retries_so_far < self.retry_budget() {
            RetryDecision::RetryAfter(self.retry_delay)
        } else {
            RetryDecision::Exhausted
        }
    }
}

#[cfg(test)]
#[path = "backoff_tests.rs"]
mod tests;
