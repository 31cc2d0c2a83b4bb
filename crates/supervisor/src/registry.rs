// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory service registry (spec §4.2, C2): `{tenant_id, service_id} →
//! worker_handle`, rebuilt from the Deployer's tracking table (itself
//! rebuilt from events) — this crate persists nothing of its own.

use kernel_compiler::ServiceHandle;
use kernel_core::{ServiceId, ServiceRef, TenantId};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("{0} is already registered")]
    AlreadyRegistered(ServiceRef),
}

/// Concurrent-safe on lookup, serialised on register/unregister (spec §5
/// "Shared-resource policy").
#[derive(Default)]
pub struct ServiceRegistry {
    workers: RwLock<HashMap<ServiceRef, Arc<dyn ServiceHandle>>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a worker handle. Strictly unique (spec I4): a duplicate
    /// register fails with `already_registered`.
    pub fn register(
        &self,
        service_ref: ServiceRef,
        handle: Arc<dyn ServiceHandle>,
    ) -> Result<(), RegistryError> {
        let mut workers = self.workers.write();
        if workers.contains_key(&service_ref) {
            return Err(RegistryError::AlreadyRegistered(service_ref));
        }
        workers.insert(service_ref, handle);
        Ok(())
    }

    /// Idempotent: unregistering an unknown identity is a no-op.
    pub fn unregister(&self, service_ref: &ServiceRef) {
        self.workers.write().remove(service_ref);
    }

    pub fn lookup(&self, service_ref: &ServiceRef) -> Option<Arc<dyn ServiceHandle>> {
        self.workers.read().get(service_ref).cloned()
    }

    pub fn is_registered(&self, service_ref: &ServiceRef) -> bool {
        self.workers.read().contains_key(service_ref)
    }

    /// All services currently registered for `tenant_id` (spec §4.2
    /// "list-by-tenant").
    pub fn list_by_tenant(&self, tenant_id: &TenantId) -> Vec<ServiceId> {
        self.workers
            .read()
            .keys()
            .filter(|r| &r.tenant_id == tenant_id)
            .map(|r| r.service_id.clone())
            .collect()
    }

    pub fn all_identities(&self) -> Vec<ServiceRef> {
        self.workers.read().keys().cloned().collect()
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
