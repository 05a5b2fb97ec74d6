// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error type returned by coordinator entry points

use opc_core::{Rejection, Retryable};
use std::fmt;
use thiserror::Error;

/// Errors a unit of work may fail with
///
/// Any error that can be classified and displayed qualifies; implement
/// [`Retryable`] to decide which failures get an automatic retry.
pub trait WorkError: Retryable + fmt::Display + Send + 'static {}

impl<E> WorkError for E where E: Retryable + fmt::Display + Send + 'static {}

/// Failure of a coordinated operation
#[derive(Debug, Error)]
pub enum CoordinatorError<E> {
    /// Never admitted; the work did not run
    #[error(transparent)]
    Rejected(#[from] Rejection),
    /// A retryable failure outlasted the retry budget; shows the last failure
    #[error("{source}")]
    RetryExhausted {
        key: String,
        attempts: u32,
        #[source]
        source: E,
    },
    /// The work failed with a non-retryable error
    #[error(transparent)]
    Work(E),
    /// A queued request was dropped before it could report back
    #[error("queued operation for key {key} was abandoned before completing")]
    Abandoned { key: String },
}

impl<E> CoordinatorError<E> {
    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            CoordinatorError::Rejected(rejection) => Some(rejection),
            _ => None,
        }
    }

    /// Duplicate and capacity rejections, shown to users as
    /// "this action is already in progress"
    pub fn is_already_in_progress(&self) -> bool {
        self.rejection()
            .is_some_and(Rejection::is_already_in_progress)
    }

    /// The error produced by the work itself, if it ran and failed
    pub fn into_work_error(self) -> Option<E> {
        match self {
            CoordinatorError::RetryExhausted { source, .. } | CoordinatorError::Work(source) => {
                Some(source)
            }
            CoordinatorError::Rejected(_) | CoordinatorError::Abandoned { .. } => None,
        }
    }
}
