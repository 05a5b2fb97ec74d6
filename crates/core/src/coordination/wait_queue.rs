// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! FIFO wait queue for requests deferred on capacity
//!
//! Requests leave strictly in enqueue order. A request whose wait exceeded
//! the operation timeout when it reaches the head comes out as expired.

use crate::clock::Clock;
use crate::event::CoordinationEvent;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// A deferred request and whatever the caller needs to run it later
#[derive(Debug)]
pub struct QueuedRequest<T> {
    pub key: String,
    pub operation: String,
    pub enqueued_at: Instant,
    pub payload: T,
}

impl<T> QueuedRequest<T> {
    pub fn waited(&self, clock: &impl Clock) -> Duration {
        clock.age_of(self.enqueued_at)
    }
}

/// Result of popping the head of the queue
#[derive(Debug)]
pub enum Popped<T> {
    /// Still within the timeout; admit it
    Ready(QueuedRequest<T>),
    /// Waited longer than the timeout; fail it without running
    Expired(QueuedRequest<T>, CoordinationEvent),
}

#[derive(Debug)]
pub struct WaitQueue<T> {
    items: VecDeque<QueuedRequest<T>>,
}

impl<T> Default for WaitQueue<T> {
    fn default() -> Self {
        Self {
            items: VecDeque::new(),
        }
    }
}

impl<T> WaitQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Keys in queue order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(|r| r.key.as_str())
    }

    /// Append to the tail
    pub fn push(
        &mut self,
        key: impl Into<String>,
        operation: impl Into<String>,
        payload: T,
        clock: &impl Clock,
    ) -> CoordinationEvent {
        let request = QueuedRequest {
            key: key.into(),
            operation: operation.into(),
            enqueued_at: clock.now(),
            payload,
        };
        let event = CoordinationEvent::Enqueued {
            key: request.key.clone(),
            operation: request.operation.clone(),
            position: self.items.len(),
        };
        self.items.push_back(request);
        event
    }

    /// Remove the head, classifying it against `timeout`
    pub fn pop(&mut self, timeout: Duration, clock: &impl Clock) -> Option<Popped<T>> {
        let request = self.items.pop_front()?;
        let waited = request.waited(clock);
        if waited > timeout {
            let event = CoordinationEvent::QueueTimedOut {
                key: request.key.clone(),
                operation: request.operation.clone(),
                waited,
            };
            Some(Popped::Expired(request, event))
        } else {
            Some(Popped::Ready(request))
        }
    }

    /// Wait time of the head request
    pub fn oldest_wait(&self, clock: &impl Clock) -> Option<Duration> {
        self.items.front().map(|r| r.waited(clock))
    }
}

#[cfg(test)]
#[path = "wait_queue_tests.rs"]
mod tests;
