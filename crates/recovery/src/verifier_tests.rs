// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use kernel_core::{Event, FakeClock, RestartPolicy, ServiceId, TenantId};
use parking_lot::Mutex;
use tempfile::tempdir;

struct FixedRegistry(Vec<ServiceRef>);

impl RecoveryRegistryView for FixedRegistry {
    fn registered_identities(&self) -> Vec<ServiceRef> {
        self.0.clone()
    }
}

#[derive(Default)]
struct RecordingKiller {
    killed: Mutex<Vec<ServiceRef>>,
}

#[async_trait]
impl RecoveryKiller for RecordingKiller {
    async fn kill(&self, service_ref: &ServiceRef) {
        self.killed.lock().push(service_ref.clone());
    }
}

fn store(dir: &std::path::Path) -> EventStore<FakeClock> {
    EventStore::open(&dir.join("events.jsonl"), FakeClock::new()).unwrap()
}

fn deploy(store: &EventStore<FakeClock>, tenant: &str, service: &str) {
    store
        .append(
            Some(TenantId::new(tenant)),
            None,
            Event::ServiceDeployed {
                tenant_id: TenantId::new(tenant),
                service_id: ServiceId::new(service),
                source: "print('hi')".to_string(),
                format: "script".to_string(),
                restart_policy: RestartPolicy::default(),
            },
        )
        .unwrap();
}

fn kill(store: &EventStore<FakeClock>, tenant: &str, service: &str) {
    store
        .append(
            Some(TenantId::new(tenant)),
            None,
            Event::ServiceKilled { tenant_id: TenantId::new(tenant), service_id: ServiceId::new(service) },
        )
        .unwrap();
}

#[tokio::test]
async fn consistent_state_reports_nothing() {
    let dir = tempdir().unwrap();
    let store = store(dir.path());
    deploy(&store, "t1", "s1");

    let registry = FixedRegistry(vec![ServiceRef::new("t1", "s1")]);
    let killer = RecordingKiller::default();
    let report = verify(&store, &registry, &killer).await;

    assert!(report.orphaned_services.is_empty());
    assert!(report.orphaned_events.is_empty());
    assert!(report.alive_killed_services.is_empty());
    assert_eq!(report.auto_fixed, 0);
}

#[tokio::test]
async fn deploy_event_without_a_running_service_is_orphaned_events() {
    let dir = tempdir().unwrap();
    let store = store(dir.path());
    deploy(&store, "t1", "s1");

    let registry = FixedRegistry(vec![]);
    let killer = RecordingKiller::default();
    let report = verify(&store, &registry, &killer).await;

    assert_eq!(report.orphaned_events, vec![ServiceRef::new("t1", "s1")]);
}

#[tokio::test]
async fn running_service_with_no_deploy_event_is_orphaned_services() {
    let dir = tempdir().unwrap();
    let store = store(dir.path());

    let registry = FixedRegistry(vec![ServiceRef::new("t1", "ghost")]);
    let killer = RecordingKiller::default();
    let report = verify(&store, &registry, &killer).await;

    assert_eq!(report.orphaned_services, vec![ServiceRef::new("t1", "ghost")]);
}

#[tokio::test]
async fn killed_but_still_registered_is_auto_fixed() {
    let dir = tempdir().unwrap();
    let store = store(dir.path());
    deploy(&store, "t1", "s1");
    kill(&store, "t1", "s1");

    let registry = FixedRegistry(vec![ServiceRef::new("t1", "s1")]);
    let killer = RecordingKiller::default();
    let report = verify(&store, &registry, &killer).await;

    assert_eq!(report.alive_killed_services, vec![ServiceRef::new("t1", "s1")]);
    assert_eq!(report.auto_fixed, 1);
    assert_eq!(*killer.killed.lock(), vec![ServiceRef::new("t1", "s1")]);
}
