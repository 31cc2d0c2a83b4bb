// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::service::RestartPolicy;

#[test]
fn service_deployed_round_trips_through_json() {
    let ev = Event::ServiceDeployed {
        tenant_id: TenantId::new("t1"),
        service_id: ServiceId::new("hello"),
        source: "module Hello{}".to_string(),
        format: "elixir_source".to_string(),
        restart_policy: RestartPolicy::default(),
    };
    let json = serde_json::to_string(&ev).unwrap();
    assert!(json.contains("\"type\":\"service:deployed\""));
    let back: Event = serde_json::from_str(&json).unwrap();
    assert_eq!(back, ev);
    assert_eq!(back.event_type(), "service_deployed");
}

#[test]
fn unknown_type_tag_deserializes_to_custom() {
    let json = r#"{"type":"something:unseen","foo":"bar"}"#;
    let ev: Event = serde_json::from_str(json).unwrap();
    assert_eq!(ev, Event::Custom);
}

#[test]
fn capability_verified_and_resource_violation_are_best_effort() {
    assert_eq!(
        Event::CapabilityVerified {
            tenant_id: TenantId::new("t1"),
            token_hash: crate::ids::TokenHash::from_bytes([0; 32]),
            resource_ref: "fs".into(),
        }
        .durability(),
        Durability::BestEffort
    );
}

#[test]
fn service_deployed_is_durable() {
    let ev = Event::ServiceKilled { tenant_id: TenantId::new("t1"), service_id: ServiceId::new("s") };
    assert_eq!(ev.durability(), Durability::Durable);
}

#[test]
fn subject_extracts_tenant_and_service() {
    let ev = Event::ServiceCrashed {
        tenant_id: TenantId::new("t1"),
        service_id: ServiceId::new("s"),
        reason: "oom".into(),
    };
    let (t, s) = ev.subject().unwrap();
    assert_eq!(t.as_str(), "t1");
    assert_eq!(s.as_str(), "s");
}
