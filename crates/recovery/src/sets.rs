// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared identity-set derivation used by both the recovery engine and the
//! verifier (spec §4.11 steps 1-3).

use kernel_core::{Clock, Event, EventId, ServiceRef};
use kernel_storage::{EventFilter, EventStore};
use std::collections::HashMap;

pub struct DeploySnapshot {
    pub deploy_id: EventId,
    pub source: String,
    pub format: String,
    pub restart_policy: kernel_core::RestartPolicy,
}

/// Every identity's latest `service_deployed` event.
pub fn latest_deploys<C: Clock>(store: &EventStore<C>) -> HashMap<ServiceRef, DeploySnapshot> {
    let filter = EventFilter { event_type: Some("service_deployed"), ..Default::default() };
    let mut latest = HashMap::new();
    for record in store.stream(&filter, 0, 0) {
        if let Event::ServiceDeployed { tenant_id, service_id, source, format, restart_policy } = record.event {
            let service_ref = ServiceRef::new(tenant_id, service_id);
            latest.insert(service_ref, DeploySnapshot { deploy_id: record.id, source, format, restart_policy });
        }
    }
    latest
}

/// Every identity's latest `service_killed` event id.
pub fn latest_kills<C: Clock>(store: &EventStore<C>) -> HashMap<ServiceRef, EventId> {
    let filter = EventFilter { event_type: Some("service_killed"), ..Default::default() };
    let mut latest = HashMap::new();
    for record in store.stream(&filter, 0, 0) {
        if let Event::ServiceKilled { tenant_id, service_id } = record.event {
            latest.insert(ServiceRef::new(tenant_id, service_id), record.id);
        }
    }
    latest
}

/// Identities whose latest deploy has no later kill (spec §4.11 step 3's
/// "B" set, reused by the verifier as its comparison set).
pub fn live_identities<C: Clock>(store: &EventStore<C>) -> HashMap<ServiceRef, DeploySnapshot> {
    let kills = latest_kills(store);
    latest_deploys(store)
        .into_iter()
        .filter(|(service_ref, snapshot)| {
            kills.get(service_ref).map(|kill_id| *kill_id <= snapshot.deploy_id).unwrap_or(true)
        })
        .collect()
}
