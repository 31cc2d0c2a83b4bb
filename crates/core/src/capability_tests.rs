// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::ids::TokenHash;

fn sample() -> Capability {
    Capability {
        token_hash: TokenHash::from_bytes([1u8; 32]),
        tenant_id: TenantId::new("t1"),
        resource_ref: "fs".to_string(),
        permissions: ["read", "stat"].into_iter().map(String::from).collect(),
        expires_at_epoch_ms: 60_000,
        revoked: false,
        granted_at_epoch_ms: 0,
        metadata: HashMap::new(),
    }
}

#[yare::parameterized(
    ok = { 0, "t1", "fs", "read", Ok(()) },
    wrong_tenant = { 0, "t2", "fs", "read", Err(CapabilityDenialReason::TenantMismatch) },
    wrong_resource = { 0, "t1", "net", "read", Err(CapabilityDenialReason::ResourceMismatch) },
    wrong_permission = { 0, "t1", "fs", "write", Err(CapabilityDenialReason::PermissionDenied) },
    expired = { 60_000, "t1", "fs", "read", Err(CapabilityDenialReason::Expired) },
)]
fn verify_cases(
    now_ms: u64,
    tenant: &str,
    resource: &str,
    permission: &str,
    expected: Result<(), CapabilityDenialReason>,
) {
    let cap = sample();
    assert_eq!(cap.verify(now_ms, &TenantId::new(tenant), resource, permission), expected);
}

#[test]
fn revoked_capability_always_fails_verification() {
    let mut cap = sample();
    cap.revoked = true;
    assert_eq!(
        cap.verify(0, &TenantId::new("t1"), "fs", "read"),
        Err(CapabilityDenialReason::Revoked)
    );
}

#[test]
fn ttl_zero_is_immediately_expired() {
    let mut cap = sample();
    cap.expires_at_epoch_ms = 0;
    assert!(cap.is_expired(0));
}
