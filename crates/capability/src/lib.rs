// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! kernel-capability: Grant/Verify/Revoke over an in-memory index backed by
//! [`kernel_storage::TokenStore`] (spec §4.7, C7).

use kernel_core::{
    Capability, CapabilityDenialReason, Clock, Event, Permission, ResourceRef, TenantId, TokenHash,
};
use kernel_storage::{EventStore, TokenStore};
use parking_lot::Mutex;
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// How often the sweep removes expired records (spec §4.7 "Periodic sweep").
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum CapabilityError {
    #[error(transparent)]
    Store(#[from] kernel_storage::StoreError),
    #[error(transparent)]
    TokenStore(#[from] kernel_storage::TokenStoreError),
}

/// Grant/verify/revoke over capability tokens (spec §4.7).
///
/// Holds the authoritative in-memory index (`token_hash → Capability`);
/// [`kernel_storage::TokenStore`] is its persistence, best-effort on grant,
/// required on revoke.
pub struct CapabilityManager<C: Clock> {
    index: Mutex<HashMap<TokenHash, Capability>>,
    token_store: Mutex<TokenStore>,
    events: Arc<EventStore<C>>,
    clock: C,
}

impl<C: Clock> CapabilityManager<C> {
    /// Build the manager, restoring non-expired records from `token_store`
    /// into the in-memory index (spec §4.3 `RestoreAll`).
    pub fn new(token_store: TokenStore, events: Arc<EventStore<C>>, clock: C) -> Self {
        let now = clock.epoch_ms();
        let restored = token_store.restore_all(now);
        let mut index = HashMap::new();
        for cap in restored {
            index.insert(cap.token_hash, cap);
        }
        Self { index: Mutex::new(index), token_store: Mutex::new(token_store), events, clock }
    }

    /// Generate a fresh 32-byte token, hash it, persist the record, and
    /// return the plaintext token — the only time it is ever revealed
    /// (spec §4.7 `Grant`).
    pub fn grant(
        &self,
        tenant_id: TenantId,
        resource_ref: ResourceRef,
        permissions: HashSet<Permission>,
        ttl_seconds: u64,
        metadata: HashMap<String, String>,
    ) -> Result<String, CapabilityError> {
        let mut token_bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut token_bytes);
        let token_hash = TokenHash::from_bytes(Sha256::digest(token_bytes).into());

        let now = self.clock.epoch_ms();
        let cap = Capability {
            token_hash,
            tenant_id: tenant_id.clone(),
            resource_ref: resource_ref.clone(),
            permissions: permissions.clone(),
            expires_at_epoch_ms: now + ttl_seconds.saturating_mul(1000),
            revoked: false,
            granted_at_epoch_ms: now,
            metadata,
        };

        self.index.lock().insert(token_hash, cap.clone());

        // Persistence is best-effort for grant (spec §4.3): log a warning,
        // don't fail the grant.
        if let Err(e) = self.token_store.lock().store(cap) {
            tracing::warn!(error = %e, "failed to persist granted capability");
        }

        self.events.append(
            Some(tenant_id.clone()),
            None,
            Event::CapabilityGranted {
                tenant_id,
                token_hash,
                resource_ref,
                permissions: permissions.into_iter().collect(),
                ttl_seconds,
            },
        )?;

        Ok(hex_encode(&token_bytes))
    }

    /// Verify a presented token (spec §4.7 `Verify`, spec I3).
    pub fn verify(
        &self,
        presented_tenant_id: &TenantId,
        token_hex: &str,
        resource_ref: &str,
        required_permission: &str,
    ) -> Result<(), CapabilityDenialReason> {
        let token_hash = hash_token_hex(token_hex);
        let result = {
            let index = self.index.lock();
            match index.get(&token_hash) {
                Some(cap) => {
                    cap.verify(self.clock.epoch_ms(), presented_tenant_id, resource_ref, required_permission)
                }
                None => Err(CapabilityDenialReason::NotFound),
            }
        };

        let event = match &result {
            Ok(()) => Event::CapabilityVerified {
                tenant_id: presented_tenant_id.clone(),
                token_hash,
                resource_ref: resource_ref.to_string(),
            },
            Err(reason) => Event::CapabilityDenied {
                tenant_id: presented_tenant_id.clone(),
                token_hash: Some(token_hash),
                resource_ref: resource_ref.to_string(),
                reason: *reason,
            },
        };
        let _ = self.events.append(Some(presented_tenant_id.clone()), None, event);

        result
    }

    /// Revoke a token. Persistence must succeed before this returns; an
    /// unknown hash is a no-op (spec §4.7 `Revoke`).
    pub fn revoke(&self, token_hash: TokenHash) -> Result<(), CapabilityError> {
        let existed = {
            let mut index = self.index.lock();
            if let Some(cap) = index.get_mut(&token_hash) {
                cap.revoked = true;
                true
            } else {
                false
            }
        };

        if !existed {
            tracing::info!(token_hash = %token_hash, "revoke on unknown token hash, no-op");
            return Ok(());
        }

        self.token_store.lock().delete(&token_hash)?;
        self.events.append(None, None, Event::CapabilityRevoked { token_hash })?;
        Ok(())
    }

    /// Remove expired records from the in-memory index and persistence
    /// (spec §4.7 "Periodic sweep"). Intended to be called every
    /// [`SWEEP_INTERVAL`].
    pub fn sweep_expired(&self) -> Result<usize, CapabilityError> {
        let now = self.clock.epoch_ms();
        let expired: Vec<TokenHash> = {
            let index = self.index.lock();
            index.values().filter(|c| c.is_expired(now)).map(|c| c.token_hash).collect()
        };
        {
            let mut index = self.index.lock();
            for hash in &expired {
                index.remove(hash);
            }
        }
        self.token_store.lock().cleanup_expired(now)?;
        Ok(expired.len())
    }

    pub fn find(&self, token_hash: &TokenHash) -> Option<Capability> {
        self.index.lock().get(token_hash).cloned()
    }
}

fn hash_token_hex(token_hex: &str) -> TokenHash {
    let mut bytes = [0u8; 32];
    for (i, b) in bytes.iter_mut().enumerate() {
        if let Some(hex_pair) = token_hex.get(i * 2..i * 2 + 2) {
            *b = u8::from_str_radix(hex_pair, 16).unwrap_or(0);
        }
    }
    TokenHash::from_bytes(Sha256::digest(bytes).into())
}

fn hex_encode(bytes: &[u8; 32]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Spawn the periodic expiry sweep (spec §4.7). Returns the task handle so
/// callers (graceful shutdown) can abort it.
pub fn spawn_sweeper<C: Clock + 'static>(manager: Arc<CapabilityManager<C>>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            if let Err(e) = manager.sweep_expired() {
                tracing::warn!(error = %e, "capability sweep failed");
            }
        }
    })
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
