// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hot-swap rollback window (spec §4.10, C10). After the caller has
//! already compiled the new module, loaded it into the worker, and invoked
//! its in-place code-change hook, the watchdog monitors the worker for
//! `rollback_window`: if it dies within the window the caller must kill it,
//! reload the previous module, and restart under old code; if the window
//! elapses untouched, the swap is final. Reload/restart is the Deployer's
//! concern (kernel-daemon owns the compiler and supervisor); this module
//! owns only the timing and crash detection.

use kernel_compiler::ServiceHandle;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogOutcome {
    /// The window elapsed with the worker still alive.
    Succeeded,
    /// The worker died within the window; caller must roll back.
    CrashedWithinWindow,
}

pub struct HotSwapWatchdog {
    rollback_window: Duration,
    poll_interval: Duration,
}

impl HotSwapWatchdog {
    pub fn new(rollback_window: Duration, poll_interval: Duration) -> Self {
        Self { rollback_window, poll_interval }
    }

    /// Poll `worker` until it dies or `rollback_window` elapses.
    pub async fn watch(&self, worker: &dyn ServiceHandle) -> WatchdogOutcome {
        let deadline = tokio::time::Instant::now() + self.rollback_window;
        let mut interval = tokio::time::interval(self.poll_interval);
        interval.tick().await;
        loop {
            if !worker.is_alive().await {
                return WatchdogOutcome::CrashedWithinWindow;
            }
            if tokio::time::Instant::now() >= deadline {
                return WatchdogOutcome::Succeeded;
            }
            interval.tick().await;
        }
    }
}

#[cfg(test)]
#[path = "watchdog_tests.rs"]
mod tests;
