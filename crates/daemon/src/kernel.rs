// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Kernel Root (spec §4.13, C13): boots every system component in the
//! spec's fixed order, runs the recovery engine once, and owns the
//! background tasks (capability sweep, resource sampling) for the life of
//! the process.

use crate::config::Config;
use crate::deployer::Deployer;
use crate::error::KernelError;
use crate::shutdown;
use async_trait::async_trait;
use kernel_capability::CapabilityManager;
use kernel_compiler::{script, CompilerAdapter, ServiceFactory};
use kernel_core::{Clock, ServiceRef};
use kernel_recovery::engine::{RecoveryDeployer, RecoverySpec};
use kernel_recovery::{RecoveryReport, RecoveryKiller, RecoveryRegistryView};
use kernel_resource::{ResourceMonitor, ResourceSample, SampleSource};
use kernel_storage::{EventStore, TokenStore};
use kernel_supervisor::{ServiceRegistry, TenantSupervisorTree};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Adapts [`Deployer`] to the recovery engine's narrow trait boundary
/// without creating a `kernel-recovery -> kernel-daemon` dependency.
struct DeployerAsRecovery<C: Clock>(Arc<Deployer<C>>);

#[async_trait]
impl<C: Clock + Clone + Send + Sync + 'static> RecoveryDeployer for DeployerAsRecovery<C> {
    async fn deploy(&self, spec: RecoverySpec) -> Result<(), String> {
        let deploy_spec = crate::deployer::DeploySpec {
            tenant_id: spec.tenant_id,
            service_id: spec.service_id,
            source: spec.source,
            format: spec.format,
            restart_policy: Some(spec.restart_policy),
        };
        self.0.deploy(deploy_spec).await.map(|_| ()).map_err(|e| e.to_string())
    }
}

struct RegistryAsRecoveryView(Arc<ServiceRegistry>);

impl RecoveryRegistryView for RegistryAsRecoveryView {
    fn registered_identities(&self) -> Vec<ServiceRef> {
        self.0.all_identities()
    }
}

struct DeployerAsKiller<C: Clock>(Arc<Deployer<C>>);

#[async_trait]
impl<C: Clock + Clone + Send + Sync + 'static> RecoveryKiller for DeployerAsKiller<C> {
    async fn kill(&self, service_ref: &ServiceRef) {
        let _ = self
            .0
            .kill(&service_ref.tenant_id, &service_ref.service_id, Duration::from_secs(5), true)
            .await;
    }
}

/// Samples every currently-registered identity for the resource monitor
/// loop. Script-subprocess workers expose no RSS/inbox introspection hook
/// of their own, so this reports a zero sample for liveness — enough to
/// drive the loop's shape without fabricating OS-level numbers.
struct RegistrySampleSource(Arc<ServiceRegistry>);

#[async_trait]
impl SampleSource for RegistrySampleSource {
    async fn sample(&self, service_ref: &ServiceRef) -> Option<ResourceSample> {
        self.0.lookup(service_ref)?;
        Some(ResourceSample::default())
    }

    fn identities(&self) -> Vec<ServiceRef> {
        self.0.all_identities()
    }
}

/// The fully composed kernel: every system component from spec §4.13's
/// boot order, plus the background tasks they spawned.
pub struct Kernel<C: Clock> {
    pub store: Arc<EventStore<C>>,
    pub registry: Arc<ServiceRegistry>,
    pub tree: Arc<TenantSupervisorTree>,
    pub deployer: Arc<Deployer<C>>,
    pub capability: Arc<CapabilityManager<C>>,
    pub shedder: Arc<LoadShedder>,
    pub monitor: Arc<ResourceMonitor<C>>,
    pub shutdown_token: CancellationToken,
    background_tasks: Vec<JoinHandle<()>>,
}

pub use kernel_resource::LoadShedder;

impl<C: Clock + Clone + Send + Sync + 'static> Kernel<C> {
    /// Boot order (spec §4.13, steps 1-10; step 11 "Gateway" is external
    /// and out of scope).
    pub async fn boot(config: &Config, clock: C) -> Result<(Self, RecoveryReport), KernelError> {
        std::fs::create_dir_all(&config.data_dir).map_err(|e| {
            KernelError::Store(kernel_storage::StoreError::Wal(kernel_storage::WalError::Io(e)))
        })?;

        // 1. Event Store.
        let store = Arc::new(EventStore::open(&config.data_dir.join("events.jsonl"), clock.clone())?);

        // 2. Atom/resource-vocab monitor: no atom table exists in this
        // runtime (that concept is specific to the BEAM VM this spec was
        // distilled from); there is nothing to sample here yet.

        // 3. Service Registry.
        let registry = Arc::new(ServiceRegistry::new());

        // 4. Deployer (and the tenant supervisor tree it drives).
        let tree = Arc::new(TenantSupervisorTree::new());
        let compiler: Arc<dyn CompilerAdapter> = Arc::new(script::ScriptCompilerAdapter);
        let factory: Arc<dyn ServiceFactory> = Arc::new(script::ScriptServiceFactory);
        let monitor = Arc::new(ResourceMonitor::new(Arc::clone(&store), config.default_resource_limits));
        let deployer = Arc::new(Deployer::new(
            Arc::clone(&store),
            Arc::clone(&registry),
            Arc::clone(&tree),
            compiler,
            factory,
            Arc::clone(&monitor),
            script::FORMAT,
            clock.clone(),
        ));

        // 5. Recovery Engine (transient: runs once, then exits).
        let recovery_deployer = DeployerAsRecovery(Arc::clone(&deployer));
        let report = kernel_recovery::engine::recover(&store, &recovery_deployer).await?;
        info!(
            recovered = report.recovered_count,
            skipped = report.skipped_count,
            failed = report.failed_count,
            "recovery engine complete"
        );
        let verifier_report = kernel_recovery::verifier::verify(
            &store,
            &RegistryAsRecoveryView(Arc::clone(&registry)),
            &DeployerAsKiller(Arc::clone(&deployer)),
        )
        .await;
        if !verifier_report.orphaned_services.is_empty() || !verifier_report.orphaned_events.is_empty() {
            tracing::warn!(
                orphaned_services = verifier_report.orphaned_services.len(),
                orphaned_events = verifier_report.orphaned_events.len(),
                "post-recovery verifier found inconsistencies"
            );
        }

        // 6. Capability Manager (restores from the Token Store, step 8's
        // persistence restore happens inside this call).
        let token_store = TokenStore::open(&config.data_dir.join("tokens.jsonl"))?;
        let capability = Arc::new(CapabilityManager::new(token_store, Arc::clone(&store), clock.clone()));

        // 7. Load Shedder.
        let shedder = Arc::new(LoadShedder::new(config.default_tenant_limit));

        // 9. Resource Monitor loop.
        let sample_source: Arc<dyn SampleSource> = Arc::new(RegistrySampleSource(Arc::clone(&registry)));
        let resource_loop = Arc::clone(&monitor).spawn(sample_source, config.resource_check_interval);

        // 10. Tenant root supervisor: `tree`, already constructed above.
        // 11. Gateway: external collaborator, out of scope.

        let shutdown_token = CancellationToken::new();
        shutdown::install_signal_trap(shutdown_token.clone());
        let capability_sweeper = kernel_capability::spawn_sweeper(Arc::clone(&capability));

        let kernel = Kernel {
            store,
            registry,
            tree,
            deployer,
            capability,
            shedder,
            monitor,
            shutdown_token,
            background_tasks: vec![capability_sweeper, resource_loop],
        };
        Ok((kernel, report))
    }

    /// Abort background tasks and run the shutdown sequence (spec §4.12).
    pub async fn shutdown(self, drain: Duration) {
        for task in &self.background_tasks {
            task.abort();
        }
        self.shutdown_token.cancel();
        shutdown::run(self.shutdown_token, &self.store, drain).await;
    }
}

#[cfg(test)]
#[path = "kernel_tests.rs"]
mod tests;
