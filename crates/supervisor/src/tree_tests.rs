// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use kernel_core::FakeClock;

fn tenant(s: &str) -> TenantId {
    TenantId::new(s)
}

fn service(s: &str) -> ServiceId {
    ServiceId::new(s)
}

#[test]
fn register_spawns_tenant_on_first_reference() {
    let tree = TenantSupervisorTree::new();
    assert!(!tree.is_tenant_registered(&tenant("t1")));

    tree.register_service(&tenant("t1"), &service("s1"), 3, Duration::from_secs(30)).unwrap();
    assert!(tree.is_tenant_registered(&tenant("t1")));
    assert!(tree.is_service_registered(&tenant("t1"), &service("s1")));
}

#[test]
fn duplicate_register_fails() {
    let tree = TenantSupervisorTree::new();
    tree.register_service(&tenant("t1"), &service("s1"), 3, Duration::from_secs(30)).unwrap();

    assert_eq!(
        tree.register_service(&tenant("t1"), &service("s1"), 3, Duration::from_secs(30)),
        Err(SupervisorError::AlreadyRegistered(tenant("t1"), service("s1")))
    );
}

#[test]
fn crash_under_intensity_restarts_in_place() {
    let tree = TenantSupervisorTree::new();
    let clock = FakeClock::new();
    tree.register_service(&tenant("t1"), &service("s1"), 3, Duration::from_secs(30)).unwrap();

    assert_eq!(
        tree.record_crash(&tenant("t1"), &service("s1"), &clock),
        Ok(RestartDecision::Restart)
    );
    assert!(tree.is_service_registered(&tenant("t1"), &service("s1")));
}

#[test]
fn crash_unknown_service_is_an_error() {
    let tree = TenantSupervisorTree::new();
    let clock = FakeClock::new();

    assert_eq!(
        tree.record_crash(&tenant("t1"), &service("s1"), &clock),
        Err(SupervisorError::UnknownTenant(tenant("t1")))
    );

    tree.register_service(&tenant("t1"), &service("s1"), 3, Duration::from_secs(30)).unwrap();
    assert_eq!(
        tree.record_crash(&tenant("t1"), &service("other"), &clock),
        Err(SupervisorError::UnknownService(tenant("t1"), service("other")))
    );
}

#[test]
fn exceeding_service_intensity_escalates_without_killing_tenant() {
    let tree = TenantSupervisorTree::new();
    let clock = FakeClock::new();
    tree.register_service(&tenant("t1"), &service("s1"), 1, Duration::from_secs(30)).unwrap();

    assert_eq!(
        tree.record_crash(&tenant("t1"), &service("s1"), &clock),
        Ok(RestartDecision::Restart)
    );
    assert_eq!(
        tree.record_crash(&tenant("t1"), &service("s1"), &clock),
        Ok(RestartDecision::ServiceIntensityExceeded)
    );
    assert!(!tree.is_service_registered(&tenant("t1"), &service("s1")));
    assert!(tree.is_tenant_registered(&tenant("t1")));
}

#[test]
fn exceeding_tenant_intensity_kills_every_service_under_it() {
    let tree = TenantSupervisorTree::new();
    let clock = FakeClock::new();

    for i in 0..11 {
        let id = format!("s{i}");
        tree.register_service(&tenant("t1"), &service(&id), 1, Duration::from_secs(30)).unwrap();
        let first = tree.record_crash(&tenant("t1"), &service(&id), &clock).unwrap();
        assert_eq!(first, RestartDecision::Restart);
        let second = tree.record_crash(&tenant("t1"), &service(&id), &clock).unwrap();
        if i < 10 {
            assert_eq!(second, RestartDecision::ServiceIntensityExceeded);
        } else {
            assert!(matches!(second, RestartDecision::TenantIntensityExceeded(_)));
        }
    }

    assert!(!tree.is_tenant_registered(&tenant("t1")));
}

#[test]
fn kill_tenant_removes_every_service() {
    let tree = TenantSupervisorTree::new();
    tree.register_service(&tenant("t1"), &service("a"), 3, Duration::from_secs(30)).unwrap();
    tree.register_service(&tenant("t1"), &service("b"), 3, Duration::from_secs(30)).unwrap();

    let mut killed = tree.kill_tenant(&tenant("t1"));
    killed.sort();
    assert_eq!(killed, vec![service("a"), service("b")]);
    assert!(!tree.is_tenant_registered(&tenant("t1")));
}

#[test]
fn cross_tenant_crash_never_touches_another_tenants_counters() {
    let tree = TenantSupervisorTree::new();
    let clock = FakeClock::new();
    tree.register_service(&tenant("t1"), &service("s"), 1, Duration::from_secs(30)).unwrap();
    tree.register_service(&tenant("t2"), &service("s"), 1, Duration::from_secs(30)).unwrap();

    tree.record_crash(&tenant("t1"), &service("s"), &clock).unwrap();
    tree.record_crash(&tenant("t1"), &service("s"), &clock).unwrap();

    assert!(!tree.is_service_registered(&tenant("t1"), &service("s")));
    assert!(tree.is_tenant_registered(&tenant("t1")));
    assert!(tree.is_service_registered(&tenant("t2"), &service("s")));
}
