// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-worker resource sampling (spec §4.8): resident memory, inbox depth,
//! and a cumulative work counter, checked against configured per-tenant or
//! per-service limits. Sampling itself (reading a subprocess's RSS, asking
//! a worker its queue depth) is the caller's concern — this module is the
//! pure evaluation of one sample against policy, plus the `resource_violation`
//! event it appends.

use kernel_core::{Clock, Event, EventId, ServiceId, ServiceRef, TenantId};
use kernel_storage::{EventStore, StoreError};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceSample {
    pub memory_bytes: u64,
    pub inbox_depth: u64,
    pub work_delta: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationAction {
    Warn,
    Throttle,
    Kill,
}

impl ViolationAction {
    fn as_str(&self) -> &'static str {
        match self {
            ViolationAction::Warn => "warn",
            ViolationAction::Throttle => "throttle",
            ViolationAction::Kill => "kill",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationKind {
    Memory,
    MemoryWarning,
    Inbox,
}

impl ViolationKind {
    fn as_str(&self) -> &'static str {
        match self {
            ViolationKind::Memory => "memory",
            ViolationKind::MemoryWarning => "memory_warning",
            ViolationKind::Inbox => "inbox",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ResourceLimits {
    pub max_memory_bytes: u64,
    pub memory_warning_percent: u8,
    pub max_inbox_depth: u64,
    pub max_work_delta: u64,
    pub on_memory_exceeded: ViolationAction,
    pub on_inbox_exceeded: ViolationAction,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            max_memory_bytes: 512 * 1024 * 1024,
            memory_warning_percent: 80,
            max_inbox_depth: 1_000,
            max_work_delta: u64::MAX,
            on_memory_exceeded: ViolationAction::Kill,
            on_inbox_exceeded: ViolationAction::Throttle,
        }
    }
}

/// A fired violation: what tripped and the action the caller must take
/// (force-kill the worker, or hand it to the Load Shedder to throttle).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Violation {
    pub kind: ViolationKind,
    pub action: ViolationAction,
}

pub struct ResourceMonitor<C: Clock> {
    store: Arc<EventStore<C>>,
    default_limits: ResourceLimits,
    limits: RwLock<HashMap<ServiceRef, ResourceLimits>>,
    last_samples: RwLock<HashMap<ServiceRef, ResourceSample>>,
}

impl<C: Clock> ResourceMonitor<C> {
    pub fn new(store: Arc<EventStore<C>>, default_limits: ResourceLimits) -> Self {
        Self {
            store,
            default_limits,
            limits: RwLock::new(HashMap::new()),
            last_samples: RwLock::new(HashMap::new()),
        }
    }

    pub fn set_limits(&self, service_ref: ServiceRef, limits: ResourceLimits) {
        self.limits.write().insert(service_ref, limits);
    }

    /// The most recent sample recorded for `service_ref` (spec §6
    /// `Status`'s `{memory_bytes, inbox_len, work_units}`), or a zeroed
    /// sample if none has ever been recorded.
    pub fn last_sample(&self, service_ref: &ServiceRef) -> ResourceSample {
        self.last_samples.read().get(service_ref).copied().unwrap_or_default()
    }

    fn limits_for(&self, service_ref: &ServiceRef) -> ResourceLimits {
        self.limits.read().get(service_ref).copied().unwrap_or(self.default_limits)
    }

    /// Evaluate one sample against policy, appending `resource_violation`
    /// (best-effort) for each limit crossed, in priority order (a kill-level
    /// memory breach is reported instead of the lesser warning threshold).
    pub fn record_sample(
        &self,
        tenant_id: &TenantId,
        service_id: &ServiceId,
        sample: ResourceSample,
    ) -> Result<Vec<Violation>, StoreError> {
        let service_ref = ServiceRef::new(tenant_id.clone(), service_id.clone());
        self.last_samples.write().insert(service_ref.clone(), sample);
        let limits = self.limits_for(&service_ref);
        let mut violations = Vec::new();

        if sample.memory_bytes > limits.max_memory_bytes {
            violations.push(Violation { kind: ViolationKind::Memory, action: limits.on_memory_exceeded });
        } else {
            let warning_threshold = limits.max_memory_bytes * limits.memory_warning_percent as u64 / 100;
            if sample.memory_bytes > warning_threshold {
                violations.push(Violation { kind: ViolationKind::MemoryWarning, action: ViolationAction::Warn });
            }
        }

        if sample.inbox_depth > limits.max_inbox_depth {
            violations.push(Violation { kind: ViolationKind::Inbox, action: limits.on_inbox_exceeded });
        }

        for violation in &violations {
            self.emit(tenant_id, service_id, *violation)?;
        }
        Ok(violations)
    }

    fn emit(&self, tenant_id: &TenantId, service_id: &ServiceId, violation: Violation) -> Result<EventId, StoreError> {
        self.store.append(
            Some(tenant_id.clone()),
            None,
            Event::ResourceViolation {
                tenant_id: tenant_id.clone(),
                service_id: service_id.clone(),
                kind: violation.kind.as_str().to_string(),
                action: violation.action.as_str().to_string(),
            },
        )
    }
}

/// Supplies a [`ResourceSample`] for a running worker; the actual RSS/inbox
/// read is the caller's concern (spec §4.8's header comment) — implemented
/// by `kernel-daemon` over its registry and worker handles.
#[async_trait::async_trait]
pub trait SampleSource: Send + Sync {
    async fn sample(&self, service_ref: &ServiceRef) -> Option<ResourceSample>;

    fn identities(&self) -> Vec<ServiceRef>;
}

impl<C: Clock + Send + Sync + 'static> ResourceMonitor<C> {
    /// Spawn the periodic sampling loop (spec §4.8 `check_interval_ms`),
    /// grounded in the teacher's `UsageMetricsCollector::spawn_collector`
    /// `tokio::spawn` + `tokio::time::interval` shape.
    pub fn spawn(self: Arc<Self>, source: Arc<dyn SampleSource>, interval: std::time::Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                for service_ref in source.identities() {
                    let Some(sample) = source.sample(&service_ref).await else { continue };
                    if let Err(e) = self.record_sample(&service_ref.tenant_id, &service_ref.service_id, sample) {
                        tracing::warn!(error = %e, service = %service_ref, "failed to record resource sample");
                    }
                }
            }
        })
    }
}

#[cfg(test)]
#[path = "monitor_tests.rs"]
mod tests;
