// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The lifecycle state machine (spec §4.6, C6): `Deploy`/`Kill`/`Status`/
//! `List`, plus worker-death handling that feeds crashes back into the
//! tenant supervisor tree and restarts or escalates per its decision.

use kernel_compiler::{CompileError, CompiledModule, CompilerAdapter, ServiceError, ServiceFactory, ServiceHandle};
use kernel_core::{Clock, Event, RestartPolicy, ServiceId, ServiceRef, TenantId};
use kernel_resource::{HotSwapWatchdog, ResourceMonitor, WatchdogOutcome};
use kernel_storage::{EventStore, StoreError};
use kernel_supervisor::{RestartDecision, ServiceRegistry, TenantSupervisorTree};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum DeployError {
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("compile failed: {0}")]
    Compile(#[from] CompileError),
    #[error("{0} is already registered")]
    Conflict(ServiceRef),
    #[error("{0} is not registered")]
    NotFound(ServiceRef),
    #[error("failed to start worker: {0}")]
    Start(ServiceError),
    #[error("hot swap failed: {0}")]
    HotSwap(ServiceError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone)]
pub struct DeploySpec {
    pub tenant_id: TenantId,
    pub service_id: ServiceId,
    pub source: String,
    pub format: String,
    pub restart_policy: Option<RestartPolicy>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StatusInfo {
    pub alive: bool,
    pub memory_bytes: u64,
    pub inbox_len: u64,
    pub work_units: u64,
}

struct Tracked {
    module: CompiledModule,
    attempt: u32,
}

/// Serialises deploy/kill/status/list through a single logical actor per
/// instance (spec §4.6 "Concurrency contract") via the internal `tracking`
/// lock; reads (`status`/`list`) take the same lock but never hold it
/// across an `.await`.
pub struct Deployer<C: Clock> {
    store: Arc<EventStore<C>>,
    registry: Arc<ServiceRegistry>,
    tree: Arc<TenantSupervisorTree>,
    compiler: Arc<dyn CompilerAdapter>,
    factory: Arc<dyn ServiceFactory>,
    monitor: Arc<ResourceMonitor<C>>,
    accepted_format: String,
    clock: C,
    tracking: RwLock<HashMap<ServiceRef, Tracked>>,
}

impl<C: Clock + Clone + Send + Sync + 'static> Deployer<C> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<EventStore<C>>,
        registry: Arc<ServiceRegistry>,
        tree: Arc<TenantSupervisorTree>,
        compiler: Arc<dyn CompilerAdapter>,
        factory: Arc<dyn ServiceFactory>,
        monitor: Arc<ResourceMonitor<C>>,
        accepted_format: impl Into<String>,
        clock: C,
    ) -> Self {
        Self {
            store,
            registry,
            tree,
            compiler,
            factory,
            monitor,
            accepted_format: accepted_format.into(),
            clock,
            tracking: RwLock::new(HashMap::new()),
        }
    }

    /// `Deploy(spec)` (spec §4.6 steps 1-8).
    pub async fn deploy(self: &Arc<Self>, spec: DeploySpec) -> Result<Arc<dyn ServiceHandle>, DeployError> {
        let service_ref = ServiceRef::new(spec.tenant_id.clone(), spec.service_id.clone());

        // 1. Validate format (only format accepted by this deployer).
        if spec.format != self.accepted_format {
            return Err(DeployError::UnsupportedFormat(spec.format));
        }

        // 3. Invoke the compiler adapter.
        let module = match self
            .compiler
            .compile(&spec.tenant_id, &spec.service_id, &spec.format, &spec.source)
            .await
        {
            Ok(module) => module,
            Err(e) => {
                self.append_deployment_failed(&spec.tenant_id, &spec.service_id, e.to_string());
                return Err(DeployError::Compile(e));
            }
        };

        // 4. Reject if already registered.
        if self.registry.is_registered(&service_ref) {
            self.append_deployment_failed(&spec.tenant_id, &spec.service_id, "already registered".to_string());
            return Err(DeployError::Conflict(service_ref));
        }

        let restart_policy = spec.restart_policy.unwrap_or_else(RestartPolicy::per_service_default);

        // 2 & 5. Resolve-or-create the tenant supervisor and register this
        // service under it with its own restart window.
        if self
            .tree
            .register_service(
                &spec.tenant_id,
                &spec.service_id,
                restart_policy.max_restarts,
                Duration::from_secs(restart_policy.window_seconds),
            )
            .is_err()
        {
            self.append_deployment_failed(&spec.tenant_id, &spec.service_id, "already registered".to_string());
            return Err(DeployError::Conflict(service_ref));
        }

        let started = self.factory.start(&module, (spec.tenant_id.clone(), spec.service_id.clone())).await;
        let handle: Arc<dyn ServiceHandle> = match started {
            Ok(handle) => Arc::from(handle),
            Err(e) => {
                self.tree.remove_service(&spec.tenant_id, &spec.service_id);
                self.append_deployment_failed(&spec.tenant_id, &spec.service_id, e.to_string());
                return Err(DeployError::Start(e));
            }
        };

        // 6. Register in the service registry.
        if self.registry.register(service_ref.clone(), Arc::clone(&handle)).is_err() {
            handle.kill().await;
            self.tree.remove_service(&spec.tenant_id, &spec.service_id);
            self.append_deployment_failed(&spec.tenant_id, &spec.service_id, "already registered".to_string());
            return Err(DeployError::Conflict(service_ref));
        }

        // 7. Append `service_deployed` (durable) — the recovery contract.
        let append_result = self.store.append(
            Some(spec.tenant_id.clone()),
            None,
            Event::ServiceDeployed {
                tenant_id: spec.tenant_id.clone(),
                service_id: spec.service_id.clone(),
                source: spec.source.clone(),
                format: spec.format.clone(),
                restart_policy,
            },
        );
        if let Err(e) = append_result {
            // spec §7: caller must treat the deployment as failed and
            // roll back by killing the worker it just started.
            error!(error = %e, service = %service_ref, "failed to durably record deploy, rolling back");
            handle.kill().await;
            self.registry.unregister(&service_ref);
            self.tree.remove_service(&spec.tenant_id, &spec.service_id);
            return Err(DeployError::Store(e));
        }

        self.tracking.write().insert(service_ref.clone(), Tracked { module, attempt: 0 });

        self.spawn_death_watcher(service_ref);

        // 8. Return the worker handle.
        Ok(handle)
    }

    fn append_deployment_failed(&self, tenant_id: &TenantId, service_id: &ServiceId, reason: String) {
        if let Err(e) = self.store.append(
            Some(tenant_id.clone()),
            None,
            Event::ServiceDeploymentFailed {
                tenant_id: tenant_id.clone(),
                service_id: service_id.clone(),
                reason,
            },
        ) {
            warn!(error = %e, "failed to record deployment failure");
        }
    }

    /// `Kill(tenant_id, service_id, {timeout, force})` (spec §4.6).
    pub async fn kill(
        &self,
        tenant_id: &TenantId,
        service_id: &ServiceId,
        timeout: Duration,
        force: bool,
    ) -> Result<(), DeployError> {
        let service_ref = ServiceRef::new(tenant_id.clone(), service_id.clone());
        let handle = self.registry.lookup(&service_ref).ok_or_else(|| DeployError::NotFound(service_ref.clone()))?;

        if force {
            handle.kill().await;
        } else {
            handle.shutdown().await;
            let deadline = tokio::time::Instant::now() + timeout;
            while handle.is_alive().await {
                if tokio::time::Instant::now() >= deadline {
                    handle.kill().await;
                    break;
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        }

        self.registry.unregister(&service_ref);
        self.tree.remove_service(tenant_id, service_id);
        self.tracking.write().remove(&service_ref);

        self.store.append(
            Some(tenant_id.clone()),
            None,
            Event::ServiceKilled { tenant_id: tenant_id.clone(), service_id: service_id.clone() },
        )?;
        Ok(())
    }

    /// `Status(tenant_id, service_id)` (spec §4.6, §6).
    pub async fn status(&self, tenant_id: &TenantId, service_id: &ServiceId) -> Result<StatusInfo, DeployError> {
        let service_ref = ServiceRef::new(tenant_id.clone(), service_id.clone());
        let handle = self.registry.lookup(&service_ref).ok_or_else(|| DeployError::NotFound(service_ref.clone()))?;
        let alive = handle.is_alive().await;
        let sample = self.monitor.last_sample(&service_ref);
        Ok(StatusInfo {
            alive,
            memory_bytes: sample.memory_bytes,
            inbox_len: sample.inbox_depth,
            work_units: sample.work_delta,
        })
    }

    /// `List(tenant_id)` (spec §4.6, §6): reflects the tracking table,
    /// lazily dropping workers that died without being unregistered.
    pub async fn list(&self, tenant_id: &TenantId) -> Vec<(ServiceId, bool)> {
        let service_ids = self.registry.list_by_tenant(tenant_id);
        let mut result = Vec::with_capacity(service_ids.len());
        for service_id in service_ids {
            let service_ref = ServiceRef::new(tenant_id.clone(), service_id.clone());
            let Some(handle) = self.registry.lookup(&service_ref) else { continue };
            if handle.is_alive().await {
                result.push((service_id, true));
            } else {
                self.registry.unregister(&service_ref);
                self.tracking.write().remove(&service_ref);
            }
        }
        result
    }

    /// `HotSwap(tenant_id, service_id, new_source, rollback_window)` (spec
    /// §4.10, C10): compile the new source, load it into the running
    /// worker via its in-place code-change hook, then watch for
    /// `rollback_window` — on a crash within the window, restart the
    /// worker under the previous module; once the window elapses the swap
    /// is final. Workers that don't implement migration (e.g. the script
    /// reference factory, which hosts a bare subprocess) reject the
    /// code-change hook up front, so the swap never starts.
    pub async fn hot_swap(
        self: &Arc<Self>,
        tenant_id: &TenantId,
        service_id: &ServiceId,
        new_source: String,
        rollback_window: Duration,
    ) -> Result<WatchdogOutcome, DeployError> {
        let service_ref = ServiceRef::new(tenant_id.clone(), service_id.clone());
        let handle = self.registry.lookup(&service_ref).ok_or_else(|| DeployError::NotFound(service_ref.clone()))?;

        let new_module = match self
            .compiler
            .compile(tenant_id, service_id, &self.accepted_format, &new_source)
            .await
        {
            Ok(module) => module,
            Err(e) => {
                self.append_hot_swap_failed(tenant_id, service_id, e.to_string());
                return Err(DeployError::Compile(e));
            }
        };

        if let Err(e) = handle.code_change(&new_module).await {
            self.append_hot_swap_failed(tenant_id, service_id, e.to_string());
            return Err(DeployError::HotSwap(e));
        }

        let old_module = {
            let mut tracking = self.tracking.write();
            let Some(tracked) = tracking.get_mut(&service_ref) else {
                return Err(DeployError::NotFound(service_ref));
            };
            std::mem::replace(&mut tracked.module, new_module)
        };

        if let Err(e) =
            self.store.append(Some(tenant_id.clone()), None, Event::HotSwapStarted {
                tenant_id: tenant_id.clone(),
                service_id: service_id.clone(),
            })
        {
            warn!(error = %e, "failed to record hot swap start");
        }

        let watchdog = HotSwapWatchdog::new(rollback_window, Duration::from_millis(50));
        let outcome = watchdog.watch(handle.as_ref()).await;

        match outcome {
            WatchdogOutcome::Succeeded => {
                if let Err(e) =
                    self.store.append(Some(tenant_id.clone()), None, Event::HotSwapSucceeded {
                        tenant_id: tenant_id.clone(),
                        service_id: service_id.clone(),
                    })
                {
                    warn!(error = %e, "failed to record hot swap success");
                }
            }
            WatchdogOutcome::CrashedWithinWindow => {
                handle.kill().await;
                self.registry.unregister(&service_ref);

                match self.factory.start(&old_module, (tenant_id.clone(), service_id.clone())).await {
                    Ok(restarted) => {
                        let restarted: Arc<dyn ServiceHandle> = Arc::from(restarted);
                        if self.registry.register(service_ref.clone(), Arc::clone(&restarted)).is_err() {
                            warn!(service = %service_ref, "rollback raced with a fresh deploy, dropping restarted worker");
                            restarted.kill().await;
                            self.tracking.write().remove(&service_ref);
                            return Ok(outcome);
                        }
                        self.tracking.write().insert(service_ref.clone(), Tracked { module: old_module, attempt: 0 });
                        if let Err(e) =
                            self.store.append(Some(tenant_id.clone()), None, Event::HotSwapRolledBack {
                                tenant_id: tenant_id.clone(),
                                service_id: service_id.clone(),
                                reason: "worker crashed within the rollback window".to_string(),
                            })
                        {
                            warn!(error = %e, "failed to record hot swap rollback");
                        }
                        self.spawn_death_watcher(service_ref);
                    }
                    Err(e) => {
                        self.tracking.write().remove(&service_ref);
                        self.append_hot_swap_failed(
                            tenant_id,
                            service_id,
                            format!("rollback reload failed: {e}"),
                        );
                        return Err(DeployError::HotSwap(e));
                    }
                }
            }
        }

        Ok(outcome)
    }

    fn append_hot_swap_failed(&self, tenant_id: &TenantId, service_id: &ServiceId, reason: String) {
        if let Err(e) =
            self.store.append(Some(tenant_id.clone()), None, Event::HotSwapFailed {
                tenant_id: tenant_id.clone(),
                service_id: service_id.clone(),
                reason,
            })
        {
            warn!(error = %e, "failed to record hot swap failure");
        }
    }

    /// Background task watching a deployed worker for death (spec §4.6
    /// "Worker death handling"): on death, removes the tracking entry and
    /// consults the supervisor tree for a [`RestartDecision`] — restarting
    /// the worker on the same code, letting the service intensity escalate
    /// (`service_crashed`), or letting the tenant intensity escalate
    /// (every sibling worker killed, `service_crashed` on each).
    fn spawn_death_watcher(self: &Arc<Self>, service_ref: ServiceRef) {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_millis(200)).await;
                let Some(handle) = this.registry.lookup(&service_ref) else { return };
                if handle.is_alive().await {
                    continue;
                }
                this.handle_worker_death(service_ref).await;
                return;
            }
        });
    }

    async fn handle_worker_death(self: &Arc<Self>, service_ref: ServiceRef) {
        let tenant_id = &service_ref.tenant_id;
        let service_id = &service_ref.service_id;
        self.registry.unregister(&service_ref);

        let decision = match self.tree.record_crash(tenant_id, service_id, &self.clock) {
            Ok(decision) => decision,
            Err(e) => {
                warn!(error = %e, service = %service_ref, "crash recorded against an untracked service");
                self.tracking.write().remove(&service_ref);
                return;
            }
        };

        match decision {
            RestartDecision::Restart => self.restart_in_place(service_ref).await,
            RestartDecision::ServiceIntensityExceeded => {
                self.tracking.write().remove(&service_ref);
                self.append_crashed(tenant_id, service_id, "service restart intensity exceeded");
            }
            RestartDecision::TenantIntensityExceeded(siblings) => {
                self.tracking.write().remove(&service_ref);
                self.append_crashed(tenant_id, service_id, "service restart intensity exceeded");
                for sibling_id in siblings {
                    let sibling_ref = ServiceRef::new(tenant_id.clone(), sibling_id.clone());
                    if let Some(handle) = self.registry.lookup(&sibling_ref) {
                        handle.kill().await;
                    }
                    self.registry.unregister(&sibling_ref);
                    self.tracking.write().remove(&sibling_ref);
                    self.append_crashed(tenant_id, &sibling_id, "tenant restart intensity exceeded");
                }
            }
        }
    }

    async fn restart_in_place(self: &Arc<Self>, service_ref: ServiceRef) {
        let tenant_id = service_ref.tenant_id.clone();
        let service_id = service_ref.service_id.clone();
        let module = {
            let mut tracking = self.tracking.write();
            let Some(tracked) = tracking.get_mut(&service_ref) else { return };
            tracked.attempt += 1;
            tracked.module.clone()
        };

        match self.factory.start(&module, (tenant_id.clone(), service_id.clone())).await {
            Ok(handle) => {
                let handle: Arc<dyn ServiceHandle> = Arc::from(handle);
                if self.registry.register(service_ref.clone(), Arc::clone(&handle)).is_err() {
                    warn!(service = %service_ref, "restart raced with a fresh deploy, dropping restarted worker");
                    handle.kill().await;
                    return;
                }
                let attempt = self.tracking.read().get(&service_ref).map(|t| t.attempt).unwrap_or(1);
                if let Err(e) = self.store.append(
                    Some(tenant_id.clone()),
                    None,
                    Event::ServiceRestarted { tenant_id, service_id, attempt },
                ) {
                    warn!(error = %e, "failed to record service restart");
                }
                self.spawn_death_watcher(service_ref);
            }
            Err(e) => {
                error!(error = %e, service = %service_ref, "restart failed to start worker");
                self.tracking.write().remove(&service_ref);
                self.append_crashed(&tenant_id, &service_id, e.to_string());
            }
        }
    }

    fn append_crashed(&self, tenant_id: &TenantId, service_id: &ServiceId, reason: impl Into<String>) {
        let result = self.store.append(
            Some(tenant_id.clone()),
            None,
            Event::ServiceCrashed { tenant_id: tenant_id.clone(), service_id: service_id.clone(), reason: reason.into() },
        );
        if let Err(e) = result {
            warn!(error = %e, "failed to record service crash");
        }
        info!(tenant = %tenant_id, service = %service_id, "service removed from supervision after crash");
    }
}

#[cfg(test)]
#[path = "deployer_tests.rs"]
mod tests;
