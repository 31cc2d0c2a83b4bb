// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use kernel_core::TenantId;
use std::collections::HashMap;
use tempfile::tempdir;

fn cap(hash: u8, tenant: &str, expires_at_epoch_ms: u64) -> Capability {
    Capability {
        token_hash: TokenHash::from_bytes([hash; 32]),
        tenant_id: TenantId::new(tenant),
        resource_ref: "fs".to_string(),
        permissions: ["read"].into_iter().map(String::from).collect(),
        expires_at_epoch_ms,
        revoked: false,
        granted_at_epoch_ms: 0,
        metadata: HashMap::new(),
    }
}

#[test]
fn store_then_get_round_trips() {
    let dir = tempdir().unwrap();
    let mut store = TokenStore::open(&dir.path().join("tokens.jsonl")).unwrap();

    store.store(cap(1, "t1", 10_000)).unwrap();
    assert_eq!(store.get(&TokenHash::from_bytes([1; 32])).unwrap().tenant_id, TenantId::new("t1"));
}

#[test]
fn delete_is_idempotent() {
    let dir = tempdir().unwrap();
    let mut store = TokenStore::open(&dir.path().join("tokens.jsonl")).unwrap();

    store.delete(&TokenHash::from_bytes([9; 32])).unwrap();
    store.store(cap(1, "t1", 10_000)).unwrap();
    store.delete(&TokenHash::from_bytes([1; 32])).unwrap();
    store.delete(&TokenHash::from_bytes([1; 32])).unwrap();

    assert!(store.get(&TokenHash::from_bytes([1; 32])).is_none());
}

#[test]
fn restore_all_filters_expired() {
    let dir = tempdir().unwrap();
    let mut store = TokenStore::open(&dir.path().join("tokens.jsonl")).unwrap();

    store.store(cap(1, "t1", 10_000)).unwrap();
    store.store(cap(2, "t1", 0)).unwrap();

    let restored = store.restore_all(5_000);
    assert_eq!(restored.len(), 1);
    assert_eq!(restored[0].token_hash, TokenHash::from_bytes([1; 32]));
}

#[test]
fn cleanup_expired_removes_and_persists() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("tokens.jsonl");
    let mut store = TokenStore::open(&path).unwrap();

    store.store(cap(1, "t1", 10_000)).unwrap();
    store.store(cap(2, "t1", 0)).unwrap();

    let removed = store.cleanup_expired(5_000).unwrap();
    assert_eq!(removed, 1);

    let reopened = TokenStore::open(&path).unwrap();
    assert!(reopened.get(&TokenHash::from_bytes([2; 32])).is_none());
    assert!(reopened.get(&TokenHash::from_bytes([1; 32])).is_some());
}

#[test]
fn tokens_for_tenant_tracks_secondary_index() {
    let dir = tempdir().unwrap();
    let mut store = TokenStore::open(&dir.path().join("tokens.jsonl")).unwrap();

    store.store(cap(1, "t1", 10_000)).unwrap();
    store.store(cap(2, "t1", 10_000)).unwrap();
    store.store(cap(3, "t2", 10_000)).unwrap();

    let mut hashes = store.tokens_for_tenant(&TenantId::new("t1"));
    hashes.sort();
    let mut expected = vec![TokenHash::from_bytes([1; 32]), TokenHash::from_bytes([2; 32])];
    expected.sort();
    assert_eq!(hashes, expected);
}

#[test]
fn reopen_loads_persisted_records() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("tokens.jsonl");
    {
        let mut store = TokenStore::open(&path).unwrap();
        store.store(cap(1, "t1", 10_000)).unwrap();
    }

    let reopened = TokenStore::open(&path).unwrap();
    assert!(reopened.get(&TokenHash::from_bytes([1; 32])).is_some());
}
