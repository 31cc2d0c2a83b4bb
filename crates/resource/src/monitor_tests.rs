// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use kernel_core::FakeClock;
use kernel_storage::EventFilter;
use tempfile::tempdir;

fn monitor(dir: &std::path::Path, limits: ResourceLimits) -> ResourceMonitor<FakeClock> {
    let store = EventStore::open(&dir.join("events.jsonl"), FakeClock::new()).unwrap();
    ResourceMonitor::new(Arc::new(store), limits)
}

#[test]
fn sample_under_all_limits_fires_nothing() {
    let dir = tempdir().unwrap();
    let monitor = monitor(dir.path(), ResourceLimits::default());

    let violations = monitor
        .record_sample(&TenantId::new("t1"), &ServiceId::new("s1"), ResourceSample { memory_bytes: 10, inbox_depth: 1, work_delta: 0 })
        .unwrap();

    assert!(violations.is_empty());
}

#[test]
fn memory_over_warning_threshold_warns() {
    let dir = tempdir().unwrap();
    let limits = ResourceLimits { max_memory_bytes: 100, memory_warning_percent: 80, ..Default::default() };
    let monitor = monitor(dir.path(), limits);

    let violations = monitor
        .record_sample(&TenantId::new("t1"), &ServiceId::new("s1"), ResourceSample { memory_bytes: 90, inbox_depth: 0, work_delta: 0 })
        .unwrap();

    assert_eq!(violations, vec![Violation { kind: ViolationKind::MemoryWarning, action: ViolationAction::Warn }]);
}

#[test]
fn memory_over_max_fires_configured_action_and_not_the_warning() {
    let dir = tempdir().unwrap();
    let limits = ResourceLimits { max_memory_bytes: 100, on_memory_exceeded: ViolationAction::Kill, ..Default::default() };
    let monitor = monitor(dir.path(), limits);

    let violations = monitor
        .record_sample(&TenantId::new("t1"), &ServiceId::new("s1"), ResourceSample { memory_bytes: 200, inbox_depth: 0, work_delta: 0 })
        .unwrap();

    assert_eq!(violations, vec![Violation { kind: ViolationKind::Memory, action: ViolationAction::Kill }]);
}

#[test]
fn inbox_over_max_fires_configured_action() {
    let dir = tempdir().unwrap();
    let limits = ResourceLimits { max_inbox_depth: 5, on_inbox_exceeded: ViolationAction::Throttle, ..Default::default() };
    let monitor = monitor(dir.path(), limits);

    let violations = monitor
        .record_sample(&TenantId::new("t1"), &ServiceId::new("s1"), ResourceSample { memory_bytes: 0, inbox_depth: 6, work_delta: 0 })
        .unwrap();

    assert_eq!(violations, vec![Violation { kind: ViolationKind::Inbox, action: ViolationAction::Throttle }]);
}

#[test]
fn violation_appends_resource_violation_event() {
    let dir = tempdir().unwrap();
    let limits = ResourceLimits { max_inbox_depth: 5, ..Default::default() };
    let store = EventStore::open(&dir.path().join("events.jsonl"), FakeClock::new()).unwrap();
    let store = Arc::new(store);
    let monitor = ResourceMonitor::new(store.clone(), limits);

    monitor
        .record_sample(&TenantId::new("t1"), &ServiceId::new("s1"), ResourceSample { memory_bytes: 0, inbox_depth: 6, work_delta: 0 })
        .unwrap();

    let events = store.stream(&EventFilter { event_type: Some("resource_violation"), ..Default::default() }, 0, 0);
    assert_eq!(events.len(), 1);
}

#[test]
fn per_service_limits_override_the_default() {
    let dir = tempdir().unwrap();
    let monitor = monitor(dir.path(), ResourceLimits::default());
    let service_ref = ServiceRef::new("t1", "s1");
    monitor.set_limits(service_ref, ResourceLimits { max_inbox_depth: 1, ..Default::default() });

    let violations = monitor
        .record_sample(&TenantId::new("t1"), &ServiceId::new("s1"), ResourceSample { memory_bytes: 0, inbox_depth: 2, work_delta: 0 })
        .unwrap();

    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].kind, ViolationKind::Inbox);
}
