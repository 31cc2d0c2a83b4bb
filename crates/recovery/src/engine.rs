// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The recovery engine proper (spec §4.11 steps 1-5): replay `service_deployed`
//! against `service_killed` to find the services that should be running,
//! redeploy each one through [`RecoveryDeployer`], and append
//! `service_recovered`/`service_recovery_failed` with `causation_id` set to
//! the original deploy event.

use crate::sets::{latest_deploys, latest_kills};
use async_trait::async_trait;
use kernel_core::{Clock, Event, RestartPolicy, ServiceId, ServiceRef, TenantId};
use kernel_storage::{EventStore, StoreError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoverySpec {
    pub tenant_id: TenantId,
    pub service_id: ServiceId,
    pub source: String,
    pub format: String,
    pub restart_policy: RestartPolicy,
}

/// Implemented by `kernel-daemon`'s `Deployer` to redeploy a service found
/// live by replay, without this crate depending on the daemon crate.
#[async_trait]
pub trait RecoveryDeployer: Send + Sync {
    async fn deploy(&self, spec: RecoverySpec) -> Result<(), String>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    pub recovered_count: usize,
    pub skipped_count: usize,
    pub failed_count: usize,
    pub identities: Vec<ServiceRef>,
}

/// Runs once on boot (spec §4.11): idempotent — running it twice against an
/// unchanged log and an already-populated registry is a no-op from the
/// deployer's point of view, since `live_identities` is computed fresh
/// from the event log each time.
pub async fn recover<C: Clock>(
    store: &EventStore<C>,
    deployer: &dyn RecoveryDeployer,
) -> Result<RecoveryReport, StoreError> {
    let mut report = RecoveryReport::default();
    let kills = latest_kills(store);

    for (service_ref, snapshot) in latest_deploys(store) {
        if kills.get(&service_ref).map(|kill_id| *kill_id > snapshot.deploy_id).unwrap_or(false) {
            report.skipped_count += 1;
            continue;
        }

        let spec = RecoverySpec {
            tenant_id: service_ref.tenant_id.clone(),
            service_id: service_ref.service_id.clone(),
            source: snapshot.source,
            format: snapshot.format,
            restart_policy: snapshot.restart_policy,
        };
        match deployer.deploy(spec).await {
            Ok(()) => {
                store.append(
                    Some(service_ref.tenant_id.clone()),
                    Some(snapshot.deploy_id),
                    Event::ServiceRecovered {
                        tenant_id: service_ref.tenant_id.clone(),
                        service_id: service_ref.service_id.clone(),
                    },
                )?;
                report.recovered_count += 1;
                report.identities.push(service_ref);
            }
            Err(reason) => {
                store.append(
                    Some(service_ref.tenant_id.clone()),
                    Some(snapshot.deploy_id),
                    Event::ServiceRecoveryFailed {
                        tenant_id: service_ref.tenant_id.clone(),
                        service_id: service_ref.service_id.clone(),
                        reason,
                    },
                )?;
                report.failed_count += 1;
            }
        }
    }

    Ok(report)
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
