// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Capability (token) record types (spec §3 "Capability", §4.7).

use crate::ids::{TenantId, TokenHash};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

pub type ResourceRef = String;
pub type Permission = String;

/// Persistent capability record. The plaintext token is never stored —
/// only its hash (spec §4.7 "Security properties").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capability {
    pub token_hash: TokenHash,
    pub tenant_id: TenantId,
    pub resource_ref: ResourceRef,
    pub permissions: HashSet<Permission>,
    pub expires_at_epoch_ms: u64,
    pub revoked: bool,
    pub granted_at_epoch_ms: u64,
    pub metadata: HashMap<String, String>,
}

impl Capability {
    pub fn is_expired(&self, now_epoch_ms: u64) -> bool {
        now_epoch_ms >= self.expires_at_epoch_ms
    }

    /// spec I3: accepted iff not revoked AND not expired AND resource/permission
    /// match AND tenant matches.
    pub fn verify(
        &self,
        now_epoch_ms: u64,
        presented_tenant_id: &TenantId,
        resource_ref: &str,
        required_permission: &str,
    ) -> Result<(), CapabilityDenialReason> {
        if self.revoked {
            return Err(CapabilityDenialReason::Revoked);
        }
        if self.is_expired(now_epoch_ms) {
            return Err(CapabilityDenialReason::Expired);
        }
        if &self.tenant_id != presented_tenant_id {
            return Err(CapabilityDenialReason::TenantMismatch);
        }
        if self.resource_ref != resource_ref {
            return Err(CapabilityDenialReason::ResourceMismatch);
        }
        if !self.permissions.contains(required_permission) {
            return Err(CapabilityDenialReason::PermissionDenied);
        }
        Ok(())
    }
}

/// Reasons `Verify` can deny a capability (spec §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityDenialReason {
    NotFound,
    Revoked,
    Expired,
    ResourceMismatch,
    PermissionDenied,
    TenantMismatch,
}

crate::simple_display! {
    CapabilityDenialReason {
        NotFound => "not_found",
        Revoked => "revoked",
        Expired => "expired",
        ResourceMismatch => "resource_mismatch",
        PermissionDenied => "permission_denied",
        TenantMismatch => "tenant_mismatch",
    }
}

#[cfg(test)]
#[path = "capability_tests.rs"]
mod tests;
