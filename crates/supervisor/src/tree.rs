// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The per-tenant hierarchical supervisor tree (spec §4.4, C4): a dynamic
//! tenant root spawns one tenant supervisor per first-seen tenant
//! (`one_for_one` across tenants — killing a tenant supervisor terminates
//! all its services); each tenant supervisor runs `one_for_one` across its
//! services, optionally backed by a finer per-service restart window.
//!
//! Exceeding a service's restart intensity terminates that service and
//! escalates one level: the tenant supervisor itself absorbs a restart
//! against its own window. Exceeding the tenant's intensity terminates the
//! whole tenant supervisor (spec I5: never another tenant's).

use crate::restart_window::RestartWindow;
use crate::strategy::Strategy;
use kernel_core::{Clock, ServiceId, TenantId};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SupervisorError {
    #[error("tenant {0} has no supervisor")]
    UnknownTenant(TenantId),
    #[error("service {1} is not supervised under tenant {0}")]
    UnknownService(TenantId, ServiceId),
    #[error("service {1} is already supervised under tenant {0}")]
    AlreadyRegistered(TenantId, ServiceId),
}

/// Outcome of recording a worker crash against the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestartDecision {
    /// Restart the worker in place; neither bound was exceeded.
    Restart,
    /// The service's own restart intensity was exceeded; it is removed from
    /// the tree and the crash counts against the tenant supervisor.
    ServiceIntensityExceeded,
    /// The tenant supervisor's restart intensity was exceeded; every
    /// service under the tenant is removed (returned so the caller can
    /// kill their workers) and the tenant supervisor itself is gone.
    TenantIntensityExceeded(Vec<ServiceId>),
}

struct TenantState {
    tenant_window: RestartWindow,
    services: HashMap<ServiceId, RestartWindow>,
}

impl TenantState {
    fn new() -> Self {
        Self {
            tenant_window: RestartWindow::new(10, Duration::from_secs(60)),
            services: HashMap::new(),
        }
    }
}

/// Process-wide registry of tenant supervisors (the tenant root, spec
/// §4.4's second layer). One instance is shared across a running kernel.
#[derive(Default)]
pub struct TenantSupervisorTree {
    tenants: RwLock<HashMap<TenantId, TenantState>>,
}

impl TenantSupervisorTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tenants in this tree always run `one_for_one`; `rest_for_one` is
    /// reserved for the system-services supervisor (C13).
    pub fn strategy(&self) -> Strategy {
        Strategy::OneForOne
    }

    /// Resolve the tenant supervisor, spawning one on first reference
    /// (spec §4.4 "dynamic; spawns one tenant supervisor per first-seen
    /// tenant"), then register `service_id` under it with its own restart
    /// window. Duplicate registration fails — a service must be removed
    /// (killed or intensity-exceeded) before it can be re-registered.
    pub fn register_service(
        &self,
        tenant_id: &TenantId,
        service_id: &ServiceId,
        max_restarts: u32,
        window: Duration,
    ) -> Result<(), SupervisorError> {
        let mut tenants = self.tenants.write();
        let tenant = tenants.entry(tenant_id.clone()).or_insert_with(TenantState::new);
        if tenant.services.contains_key(service_id) {
            return Err(SupervisorError::AlreadyRegistered(tenant_id.clone(), service_id.clone()));
        }
        tenant.services.insert(service_id.clone(), RestartWindow::new(max_restarts, window));
        Ok(())
    }

    /// Idempotent: removing an unknown service, or one under an unknown
    /// tenant, is a no-op. Does not remove an empty tenant supervisor —
    /// only intensity escalation or [`Self::kill_tenant`] does that.
    pub fn remove_service(&self, tenant_id: &TenantId, service_id: &ServiceId) {
        if let Some(tenant) = self.tenants.write().get_mut(tenant_id) {
            tenant.services.remove(service_id);
        }
    }

    /// Force-remove a tenant supervisor and every service under it,
    /// mirroring "killing a tenant supervisor terminates all its
    /// services." Returns the identities that were live.
    pub fn kill_tenant(&self, tenant_id: &TenantId) -> Vec<ServiceId> {
        match self.tenants.write().remove(tenant_id) {
            Some(tenant) => tenant.services.into_keys().collect(),
            None => Vec::new(),
        }
    }

    pub fn is_service_registered(&self, tenant_id: &TenantId, service_id: &ServiceId) -> bool {
        self.tenants
            .read()
            .get(tenant_id)
            .map(|t| t.services.contains_key(service_id))
            .unwrap_or(false)
    }

    pub fn is_tenant_registered(&self, tenant_id: &TenantId) -> bool {
        self.tenants.read().contains_key(tenant_id)
    }

    /// Record a worker crash and decide what happens next (spec §4.4, I5:
    /// this never touches another tenant's counters).
    pub fn record_crash<C: Clock>(
        &self,
        tenant_id: &TenantId,
        service_id: &ServiceId,
        clock: &C,
    ) -> Result<RestartDecision, SupervisorError> {
        let mut tenants = self.tenants.write();
        let tenant = tenants
            .get_mut(tenant_id)
            .ok_or_else(|| SupervisorError::UnknownTenant(tenant_id.clone()))?;
        let service_window = tenant
            .services
            .get_mut(service_id)
            .ok_or_else(|| SupervisorError::UnknownService(tenant_id.clone(), service_id.clone()))?;

        if !service_window.record(clock) {
            return Ok(RestartDecision::Restart);
        }

        tenant.services.remove(service_id);
        if tenant.tenant_window.record(clock) {
            let killed = tenant.services.keys().cloned().collect();
            tenants.remove(tenant_id);
            return Ok(RestartDecision::TenantIntensityExceeded(killed));
        }
        Ok(RestartDecision::ServiceIntensityExceeded)
    }
}

#[cfg(test)]
#[path = "tree_tests.rs"]
mod tests;
