// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use async_trait::async_trait;
use kernel_core::FakeClock;
use kernel_resource::ResourceLimits;
use kernel_storage::EventFilter;
use parking_lot::Mutex as PMutex;
use std::sync::atomic::{AtomicBool, AtomicU32};
use tempfile::tempdir;

/// Compiles anything except the literal source `"fail"`.
struct FakeCompiler;

#[async_trait]
impl CompilerAdapter for FakeCompiler {
    async fn compile(
        &self,
        tenant_id: &TenantId,
        service_id: &ServiceId,
        _format: &str,
        source: &str,
    ) -> Result<CompiledModule, CompileError> {
        if source == "fail" {
            return Err(CompileError::Failed("synthetic compile failure".to_string()));
        }
        Ok(CompiledModule {
            module_identifier: kernel_compiler::sanitise_identifier(tenant_id, service_id),
            bytecode: source.as_bytes().to_vec(),
        })
    }
}

/// A handle whose liveness the test flips directly, mirroring
/// `FlakyHandle` in `kernel-resource`'s watchdog tests.
struct ControlledHandle {
    alive: AtomicBool,
    kill_calls: AtomicU32,
    supports_code_change: AtomicBool,
}

#[async_trait]
impl ServiceHandle for ControlledHandle {
    async fn send(&self, _message: kernel_compiler::ServiceMessage) -> Result<(), ServiceError> {
        Ok(())
    }

    async fn is_alive(&self) -> bool {
        self.alive.load(std::sync::atomic::Ordering::SeqCst)
    }

    async fn shutdown(&self) {
        // Mirrors a real subprocess: SIGTERM is requested but the worker
        // decides when it actually exits, so liveness does not flip here.
    }

    async fn kill(&self) {
        self.kill_calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.alive.store(false, std::sync::atomic::Ordering::SeqCst);
    }

    async fn code_change(&self, _new_module: &CompiledModule) -> Result<(), ServiceError> {
        if self.supports_code_change.load(std::sync::atomic::Ordering::SeqCst) {
            Ok(())
        } else {
            Err(ServiceError::CodeChangeUnsupported)
        }
    }
}

/// Starts [`ControlledHandle`]s and remembers every one it created so a
/// test can reach back in and flip a worker's liveness to simulate a crash.
#[derive(Default)]
struct FakeFactory {
    started: PMutex<Vec<Arc<ControlledHandle>>>,
}

#[async_trait]
impl ServiceFactory for FakeFactory {
    async fn start(
        &self,
        _module: &CompiledModule,
        _init_arg: (TenantId, ServiceId),
    ) -> Result<Box<dyn ServiceHandle>, ServiceError> {
        let handle = Arc::new(ControlledHandle {
            alive: AtomicBool::new(true),
            kill_calls: AtomicU32::new(0),
            supports_code_change: AtomicBool::new(true),
        });
        self.started.lock().push(Arc::clone(&handle));
        Ok(Box::new(SharedHandle(handle)))
    }
}

/// `ServiceFactory::start` must hand back an owned `Box<dyn ServiceHandle>`,
/// but the test also wants its own `Arc` to reach in and flip liveness —
/// this thin wrapper delegates every call to the shared handle underneath.
struct SharedHandle(Arc<ControlledHandle>);

#[async_trait]
impl ServiceHandle for SharedHandle {
    async fn send(&self, message: kernel_compiler::ServiceMessage) -> Result<(), ServiceError> {
        self.0.send(message).await
    }
    async fn is_alive(&self) -> bool {
        self.0.is_alive().await
    }
    async fn shutdown(&self) {
        self.0.shutdown().await
    }
    async fn kill(&self) {
        self.0.kill().await
    }
    async fn code_change(&self, new_module: &CompiledModule) -> Result<(), ServiceError> {
        self.0.code_change(new_module).await
    }
}

fn spec(tenant: &str, service: &str, source: &str) -> DeploySpec {
    DeploySpec {
        tenant_id: TenantId::new(tenant),
        service_id: ServiceId::new(service),
        source: source.to_string(),
        format: "fake".to_string(),
        restart_policy: None,
    }
}

fn new_deployer(dir: &std::path::Path) -> (Arc<Deployer<FakeClock>>, Arc<FakeFactory>, Arc<EventStore<FakeClock>>) {
    let clock = FakeClock::new();
    let store = Arc::new(EventStore::open(&dir.join("events.jsonl"), clock.clone()).unwrap());
    let registry = Arc::new(ServiceRegistry::new());
    let tree = Arc::new(TenantSupervisorTree::new());
    let compiler: Arc<dyn CompilerAdapter> = Arc::new(FakeCompiler);
    let factory = Arc::new(FakeFactory::default());
    let monitor = Arc::new(ResourceMonitor::new(Arc::clone(&store), ResourceLimits::default()));
    let deployer = Arc::new(Deployer::new(
        Arc::clone(&store),
        registry,
        tree,
        compiler,
        Arc::clone(&factory) as Arc<dyn ServiceFactory>,
        monitor,
        "fake",
        clock,
    ));
    (deployer, factory, store)
}

#[tokio::test]
async fn deploy_starts_a_worker_and_appends_service_deployed() {
    let dir = tempdir().unwrap();
    let (deployer, _factory, store) = new_deployer(dir.path());

    let handle = deployer.deploy(spec("acme", "svc-a", "echo hi")).await.unwrap();
    assert!(handle.is_alive().await);

    let deployed = store.stream(&EventFilter { event_type: Some("service_deployed"), ..Default::default() }, 0, 0);
    assert_eq!(deployed.len(), 1);
}

#[tokio::test]
async fn deploy_rejects_unsupported_format() {
    let dir = tempdir().unwrap();
    let (deployer, _factory, _store) = new_deployer(dir.path());

    let mut s = spec("acme", "svc-a", "echo hi");
    s.format = "other".to_string();
    let err = deployer.deploy(s).await.unwrap_err();
    assert!(matches!(err, DeployError::UnsupportedFormat(_)));
}

#[tokio::test]
async fn compile_failure_records_deployment_failed_and_returns_err() {
    let dir = tempdir().unwrap();
    let (deployer, _factory, store) = new_deployer(dir.path());

    let err = deployer.deploy(spec("acme", "svc-a", "fail")).await.unwrap_err();
    assert!(matches!(err, DeployError::Compile(_)));

    let failed =
        store.stream(&EventFilter { event_type: Some("service_deployment_failed"), ..Default::default() }, 0, 0);
    assert_eq!(failed.len(), 1);
}

#[tokio::test]
async fn deploying_the_same_identity_twice_conflicts() {
    let dir = tempdir().unwrap();
    let (deployer, _factory, _store) = new_deployer(dir.path());

    deployer.deploy(spec("acme", "svc-a", "echo hi")).await.unwrap();
    let err = deployer.deploy(spec("acme", "svc-a", "echo hi")).await.unwrap_err();
    assert!(matches!(err, DeployError::Conflict(_)));
}

#[tokio::test]
async fn kill_force_stops_the_worker_and_appends_service_killed() {
    let dir = tempdir().unwrap();
    let (deployer, factory, store) = new_deployer(dir.path());
    deployer.deploy(spec("acme", "svc-a", "echo hi")).await.unwrap();

    deployer
        .kill(&TenantId::new("acme"), &ServiceId::new("svc-a"), Duration::from_secs(1), true)
        .await
        .unwrap();

    let worker = Arc::clone(&factory.started.lock()[0]);
    assert!(!worker.is_alive().await);
    let killed = store.stream(&EventFilter { event_type: Some("service_killed"), ..Default::default() }, 0, 0);
    assert_eq!(killed.len(), 1);

    let err = deployer.status(&TenantId::new("acme"), &ServiceId::new("svc-a")).await.unwrap_err();
    assert!(matches!(err, DeployError::NotFound(_)));
}

#[tokio::test(start_paused = true)]
async fn kill_graceful_polls_until_the_worker_exits() {
    let dir = tempdir().unwrap();
    let (deployer, factory, _store) = new_deployer(dir.path());
    deployer.deploy(spec("acme", "svc-a", "echo hi")).await.unwrap();
    let worker = Arc::clone(&factory.started.lock()[0]);

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        worker.alive.store(false, std::sync::atomic::Ordering::SeqCst);
    });

    deployer
        .kill(&TenantId::new("acme"), &ServiceId::new("svc-a"), Duration::from_secs(5), false)
        .await
        .unwrap();

    assert_eq!(factory.started.lock()[0].kill_calls.load(std::sync::atomic::Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn kill_graceful_force_kills_after_timeout() {
    let dir = tempdir().unwrap();
    let (deployer, factory, _store) = new_deployer(dir.path());
    deployer.deploy(spec("acme", "svc-a", "echo hi")).await.unwrap();

    deployer
        .kill(&TenantId::new("acme"), &ServiceId::new("svc-a"), Duration::from_millis(50), false)
        .await
        .unwrap();

    assert_eq!(factory.started.lock()[0].kill_calls.load(std::sync::atomic::Ordering::SeqCst), 1);
}

#[tokio::test]
async fn kill_unknown_service_returns_not_found() {
    let dir = tempdir().unwrap();
    let (deployer, _factory, _store) = new_deployer(dir.path());
    let err = deployer
        .kill(&TenantId::new("acme"), &ServiceId::new("missing"), Duration::from_secs(1), true)
        .await
        .unwrap_err();
    assert!(matches!(err, DeployError::NotFound(_)));
}

#[tokio::test]
async fn status_reports_liveness_and_the_last_resource_sample() {
    let dir = tempdir().unwrap();
    let (deployer, _factory, _store) = new_deployer(dir.path());
    deployer.deploy(spec("acme", "svc-a", "echo hi")).await.unwrap();

    let status = deployer.status(&TenantId::new("acme"), &ServiceId::new("svc-a")).await.unwrap();
    assert!(status.alive);
    assert_eq!(status.memory_bytes, 0);
}

#[tokio::test]
async fn list_lazily_drops_a_worker_that_died_without_notice() {
    let dir = tempdir().unwrap();
    let (deployer, factory, _store) = new_deployer(dir.path());
    deployer.deploy(spec("acme", "svc-a", "echo hi")).await.unwrap();
    deployer.deploy(spec("acme", "svc-b", "echo hi")).await.unwrap();

    factory.started.lock()[0].alive.store(false, std::sync::atomic::Ordering::SeqCst);

    let listed = deployer.list(&TenantId::new("acme")).await;
    assert_eq!(listed, vec![(ServiceId::new("svc-b"), true)]);
}

#[tokio::test(start_paused = true)]
async fn worker_death_restarts_in_place_and_appends_service_restarted() {
    let dir = tempdir().unwrap();
    let (deployer, factory, store) = new_deployer(dir.path());
    deployer.deploy(spec("acme", "svc-a", "echo hi")).await.unwrap();
    factory.started.lock()[0].alive.store(false, std::sync::atomic::Ordering::SeqCst);

    // The death watcher polls every 200ms; paused time auto-advances to the
    // next pending timer once every other task is idle.
    tokio::time::sleep(Duration::from_millis(250)).await;

    assert_eq!(factory.started.lock().len(), 2);
    let restarted_worker = Arc::clone(&factory.started.lock()[1]);
    assert!(restarted_worker.is_alive().await);
    let restarted = store.stream(&EventFilter { event_type: Some("service_restarted"), ..Default::default() }, 0, 0);
    assert_eq!(restarted.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn repeated_crashes_exceed_service_intensity_and_stop_restarting() {
    let dir = tempdir().unwrap();
    let (deployer, factory, store) = new_deployer(dir.path());
    let mut s = spec("acme", "svc-a", "echo hi");
    s.restart_policy =
        Some(RestartPolicy { max_restarts: 1, window_seconds: 30, ..RestartPolicy::per_service_default() });
    deployer.deploy(s).await.unwrap();

    // First crash: within intensity, restarts in place.
    factory.started.lock()[0].alive.store(false, std::sync::atomic::Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(250)).await;
    assert_eq!(factory.started.lock().len(), 2);

    // Second crash: intensity exceeded, no further restart.
    factory.started.lock()[1].alive.store(false, std::sync::atomic::Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(250)).await;

    assert_eq!(factory.started.lock().len(), 2);
    let crashed = store.stream(&EventFilter { event_type: Some("service_crashed"), ..Default::default() }, 0, 0);
    assert_eq!(crashed.len(), 1);

    let err = deployer.status(&TenantId::new("acme"), &ServiceId::new("svc-a")).await.unwrap_err();
    assert!(matches!(err, DeployError::NotFound(_)));
}

#[tokio::test(start_paused = true)]
async fn hot_swap_succeeds_once_the_rollback_window_elapses() {
    let dir = tempdir().unwrap();
    let (deployer, factory, store) = new_deployer(dir.path());
    deployer.deploy(spec("acme", "svc-a", "echo hi")).await.unwrap();

    let outcome = deployer
        .hot_swap(&TenantId::new("acme"), &ServiceId::new("svc-a"), "echo new".to_string(), Duration::from_millis(100))
        .await
        .unwrap();
    assert_eq!(outcome, WatchdogOutcome::Succeeded);
    assert_eq!(factory.started.lock().len(), 1, "swap is in-place, no new worker started");

    let started = store.stream(&EventFilter { event_type: Some("hot_swap_started"), ..Default::default() }, 0, 0);
    let succeeded = store.stream(&EventFilter { event_type: Some("hot_swap_succeeded"), ..Default::default() }, 0, 0);
    assert_eq!(started.len(), 1);
    assert_eq!(succeeded.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn hot_swap_rolls_back_when_the_worker_crashes_within_the_window() {
    let dir = tempdir().unwrap();
    let (deployer, factory, store) = new_deployer(dir.path());
    deployer.deploy(spec("acme", "svc-a", "echo hi")).await.unwrap();
    let original = Arc::clone(&factory.started.lock()[0]);

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        original.alive.store(false, std::sync::atomic::Ordering::SeqCst);
    });

    let outcome = deployer
        .hot_swap(&TenantId::new("acme"), &ServiceId::new("svc-a"), "echo new".to_string(), Duration::from_millis(200))
        .await
        .unwrap();
    assert_eq!(outcome, WatchdogOutcome::CrashedWithinWindow);
    assert_eq!(factory.started.lock().len(), 2, "rollback restarts under the old module");

    let status = deployer.status(&TenantId::new("acme"), &ServiceId::new("svc-a")).await.unwrap();
    assert!(status.alive);

    let rolled_back =
        store.stream(&EventFilter { event_type: Some("hot_swap_rolled_back"), ..Default::default() }, 0, 0);
    assert_eq!(rolled_back.len(), 1);
}

#[tokio::test]
async fn hot_swap_fails_when_the_worker_rejects_code_change() {
    let dir = tempdir().unwrap();
    let (deployer, factory, store) = new_deployer(dir.path());
    deployer.deploy(spec("acme", "svc-a", "echo hi")).await.unwrap();
    factory.started.lock()[0].supports_code_change.store(false, std::sync::atomic::Ordering::SeqCst);

    let err = deployer
        .hot_swap(&TenantId::new("acme"), &ServiceId::new("svc-a"), "echo new".to_string(), Duration::from_millis(100))
        .await
        .unwrap_err();
    assert!(matches!(err, DeployError::HotSwap(_)));

    let failed = store.stream(&EventFilter { event_type: Some("hot_swap_failed"), ..Default::default() }, 0, 0);
    assert_eq!(failed.len(), 1);
}

#[tokio::test]
async fn hot_swap_unknown_service_returns_not_found() {
    let dir = tempdir().unwrap();
    let (deployer, _factory, _store) = new_deployer(dir.path());
    let err = deployer
        .hot_swap(
            &TenantId::new("acme"),
            &ServiceId::new("missing"),
            "echo new".to_string(),
            Duration::from_millis(100),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, DeployError::NotFound(_)));
}
