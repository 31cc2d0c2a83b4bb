// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Request shapes for the nine external operations (spec §6).

use kernel_core::{EventId, RestartPolicy, ServiceId, TenantId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployRequest {
    pub tenant_id: TenantId,
    pub service_id: ServiceId,
    pub source: String,
    pub format: String,
    #[serde(default)]
    pub restart_policy: Option<RestartPolicy>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KillRequest {
    pub tenant_id: TenantId,
    pub service_id: ServiceId,
    pub timeout_ms: u64,
    pub force: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRequest {
    pub tenant_id: TenantId,
    pub service_id: ServiceId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListRequest {
    pub tenant_id: TenantId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchRequest {
    pub tenant_id: TenantId,
    #[serde(default)]
    pub service_id: Option<ServiceId>,
    /// Resume point for a restartable stream (spec §4.1 "Stream").
    #[serde(default)]
    pub since_id: EventId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantCapabilityRequest {
    pub tenant_id: TenantId,
    pub resource_ref: String,
    pub permissions: Vec<String>,
    pub ttl_seconds: u64,
    #[serde(default)]
    pub metadata: std::collections::HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyCapabilityRequest {
    pub tenant_id: TenantId,
    pub token: String,
    pub resource_ref: String,
    pub permission: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevokeCapabilityRequest {
    pub token_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HotSwapRequest {
    pub tenant_id: TenantId,
    pub service_id: ServiceId,
    pub new_source: String,
    pub rollback_window_ms: u64,
}

#[cfg(test)]
#[path = "requests_tests.rs"]
mod tests;
