// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Graceful shutdown (spec §4.12, C12): trap `SIGTERM`, mark
//! shutdown-in-progress, append the durable shutdown boundary events
//! around a brief drain/flush window.
//!
//! Grounded in Design Notes §9's cancellation-token interpretation: the OS
//! signal trap is wrapped behind a single [`CancellationToken`] (the
//! async equivalent of the teacher's synchronous lock-file/socket teardown
//! in `lifecycle/mod.rs::shutdown`) so tests can trigger shutdown by
//! cancelling the token directly, without touching real OS signals.

use kernel_core::{Clock, Event};
use kernel_storage::EventStore;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Install the `SIGTERM` trap driving `token`. Spec §4.12: "If the signal
/// trap cannot be installed, log and continue — crash-recovery will still
/// converge the state" — so failures here are logged, never fatal.
pub fn install_signal_trap(token: CancellationToken) {
    match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::spawn(async move {
                sigterm.recv().await;
                info!("received SIGTERM, shutting down");
                token.cancel();
            });
        }
        Err(e) => {
            warn!(error = %e, "failed to install SIGTERM trap, continuing without it");
        }
    }
}

/// Run the shutdown sequence once `token` is cancelled (spec §4.12):
/// append `system_shutdown_started`, drain briefly, flush the event store,
/// append `system_shutdown_complete`, drain again. `kernel_storage::TokenStore`
/// persists synchronously on every mutation (spec §4.3), so there is no
/// separate token-store buffer to flush here.
pub async fn run<C: Clock>(token: CancellationToken, store: &EventStore<C>, drain: Duration) {
    token.cancelled().await;

    if let Err(e) = store.append(None, None, Event::SystemShutdownStarted) {
        error!(error = %e, "failed to append system_shutdown_started");
    }

    tokio::time::sleep(drain).await;

    if let Err(e) = store.flush() {
        error!(error = %e, "failed to flush event store during shutdown");
    }

    if let Err(e) = store.append(None, None, Event::SystemShutdownComplete) {
        error!(error = %e, "failed to append system_shutdown_complete");
    }

    tokio::time::sleep(drain).await;
}

#[cfg(test)]
#[path = "shutdown_tests.rs"]
mod tests;
