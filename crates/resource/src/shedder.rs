// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Gateway-adjacent admission controller (spec §4.9, C9): tracks in-flight
//! requests per tenant and rejects once a tenant is at its concurrency
//! quota. Fairness is bounded, not proportional — a tenant never exceeds
//! its own limit, even when the system is otherwise idle.

use kernel_core::TenantId;
use parking_lot::RwLock;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("tenant {0} is at its concurrency limit")]
pub struct ShedderError(pub TenantId);

pub struct LoadShedder {
    default_limit: u32,
    limits: RwLock<HashMap<TenantId, u32>>,
    in_flight: RwLock<HashMap<TenantId, u32>>,
}

impl LoadShedder {
    pub fn new(default_limit: u32) -> Self {
        Self { default_limit, limits: RwLock::new(HashMap::new()), in_flight: RwLock::new(HashMap::new()) }
    }

    pub fn set_tenant_limit(&self, tenant_id: TenantId, limit: u32) {
        self.limits.write().insert(tenant_id, limit);
    }

    fn limit_for(&self, tenant_id: &TenantId) -> u32 {
        self.limits.read().get(tenant_id).copied().unwrap_or(self.default_limit)
    }

    /// Admit one request for `tenant_id`, or reject with `resource_exhausted`
    /// (spec §4.9) if the tenant is already at its limit.
    pub fn try_admit(&self, tenant_id: &TenantId) -> Result<(), ShedderError> {
        let limit = self.limit_for(tenant_id);
        let mut in_flight = self.in_flight.write();
        let count = in_flight.entry(tenant_id.clone()).or_insert(0);
        if *count >= limit {
            return Err(ShedderError(tenant_id.clone()));
        }
        *count += 1;
        Ok(())
    }

    /// Release one admitted request. Idempotent at zero.
    pub fn release(&self, tenant_id: &TenantId) {
        if let Some(count) = self.in_flight.write().get_mut(tenant_id) {
            *count = count.saturating_sub(1);
        }
    }

    pub fn in_flight(&self, tenant_id: &TenantId) -> u32 {
        self.in_flight.read().get(tenant_id).copied().unwrap_or(0)
    }
}

#[cfg(test)]
#[path = "shedder_tests.rs"]
mod tests;
