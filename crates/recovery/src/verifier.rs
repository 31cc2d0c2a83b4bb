// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Post-recovery consistency verifier (spec §4.11 "Verifier"): compares
//! the running registry against what the event log says should be
//! running, auto-fixing the one case that's safe to fix automatically.

use crate::sets::{latest_kills, live_identities};
use async_trait::async_trait;
use kernel_core::{Clock, ServiceRef};
use kernel_storage::EventStore;
use std::collections::HashSet;

/// Implemented by `kernel-daemon` over its real `ServiceRegistry`.
pub trait RecoveryRegistryView: Send + Sync {
    fn registered_identities(&self) -> Vec<ServiceRef>;
}

/// Implemented by `kernel-daemon`'s `Deployer` to force-kill an
/// inconsistent survivor.
#[async_trait]
pub trait RecoveryKiller: Send + Sync {
    async fn kill(&self, service_ref: &ServiceRef);
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerifierReport {
    /// Running but no live deploy event (A \ B).
    pub orphaned_services: Vec<ServiceRef>,
    /// Deploy event says it should run, but it isn't registered (B \ A) —
    /// usually a recovery failure.
    pub orphaned_events: Vec<ServiceRef>,
    /// Has a kill event but is still running; auto-fixed by killing it.
    pub alive_killed_services: Vec<ServiceRef>,
    pub auto_fixed: usize,
}

pub async fn verify<C: Clock>(
    store: &EventStore<C>,
    registry: &dyn RecoveryRegistryView,
    killer: &dyn RecoveryKiller,
) -> VerifierReport {
    let registered: HashSet<ServiceRef> = registry.registered_identities().into_iter().collect();
    let live: HashSet<ServiceRef> = live_identities(store).into_keys().collect();
    let kills = latest_kills(store);

    let orphaned_services: Vec<ServiceRef> = registered.difference(&live).cloned().collect();
    let orphaned_events: Vec<ServiceRef> = live.difference(&registered).cloned().collect();

    let alive_killed_services: Vec<ServiceRef> = kills
        .keys()
        .filter(|service_ref| registered.contains(*service_ref) && !live.contains(*service_ref))
        .cloned()
        .collect();

    let mut auto_fixed = 0;
    for service_ref in &alive_killed_services {
        killer.kill(service_ref).await;
        auto_fixed += 1;
    }

    VerifierReport {
        orphaned_services,
        orphaned_events,
        alive_killed_services,
        auto_fixed,
    }
}

#[cfg(test)]
#[path = "verifier_tests.rs"]
mod tests;
