// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types shared by the lock table, the wait queue and data-service work

use std::time::Duration;
use thiserror::Error;

/// Why an operation was not admitted
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("operation already in progress for key {key}")]
    DuplicateInFlight { key: String },
    #[error("{operation} is already in progress (started within the last {window:?})")]
    DuplicateOperation { operation: String, window: Duration },
    #[error("too many operations in progress ({active} of {max_concurrent})")]
    CapacityExhausted { active: usize, max_concurrent: usize },
    #[error("queued request for key {key} timed out after {waited:?}")]
    QueueTimeout { key: String, waited: Duration },
}

impl Rejection {
    /// Short machine-readable name, used as a log field
    pub fn kind(&self) -> &'static str {
        match self {
            Rejection::DuplicateInFlight { .. } => "duplicate_in_flight",
            Rejection::DuplicateOperation { .. } => "duplicate_operation",
            Rejection::CapacityExhausted { .. } => "capacity_exhausted",
            Rejection::QueueTimeout { .. } => "queue_timeout",
        }
    }

    /// Rejections that the front desk reports as "this action is already in progress"
    pub fn is_already_in_progress(&self) -> bool {
        !matches!(self, Rejection::QueueTimeout { .. })
    }
}

/// Failure of a call into a remote data service
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("request timed out")]
    Timeout,
    #[error("service responded {code}: {message}")]
    Status { code: u16, message: String },
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("{0}")]
    Other(String),
}

impl ServiceError {
    pub fn status(code: u16, message: impl Into<String>) -> Self {
        ServiceError::Status {
            code,
            message: message.into(),
        }
    }
}
