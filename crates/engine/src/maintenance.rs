// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Periodic stale-lock sweep
//!
//! Staleness is otherwise only detected lazily, on the next admission for the
//! same key. A host that wants abandoned locks to free capacity on their own
//! runs this sweep on an interval.

use crate::coordinator::Coordinator;
use opc_core::Clock;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Configuration for the maintenance sweep
#[derive(Clone, Debug)]
pub struct MaintenanceConfig {
    /// How often to sweep
    pub interval: Duration,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
        }
    }
}

impl MaintenanceConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}

/// Cancel handle for a running sweep
///
/// Dropping the handle aborts the sweep; [`stop`](Self::stop) shuts it down
/// and waits for the current pass to finish.
pub struct MaintenanceHandle {
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl MaintenanceHandle {
    pub async fn stop(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(JoinHandle::is_finished)
    }
}

impl Drop for MaintenanceHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl<C: Clock> Coordinator<C> {
    /// Spawn a task that calls [`reclaim_stale`](Self::reclaim_stale) every
    /// `config.interval`, starting one interval from now
    pub fn spawn_maintenance(&self, config: MaintenanceConfig) -> MaintenanceHandle {
        let coordinator = self.clone();
        let (shutdown, mut shutdown_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            let start = tokio::time::Instant::now() + config.interval;
            let mut ticker = tokio::time::interval_at(start, config.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    _ = ticker.tick() => {
                        let reclaimed = coordinator.reclaim_stale();
                        if reclaimed > 0 {
                            tracing::info!(reclaimed, "maintenance sweep reclaimed stale locks");
                        }
                    }
                }
            }
            tracing::debug!("maintenance sweep stopped");
        });

        MaintenanceHandle {
            shutdown: Some(shutdown),
            task: Some(task),
        }
    }
}

#[cfg(test)]
#[path = "maintenance_tests.rs"]
mod tests;
