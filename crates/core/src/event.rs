// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event types for the kernel event store (spec §3, §4.1).

use crate::ids::{ServiceId, TenantId, TokenHash};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Monotonic, gap-free event id assigned on append (spec I1).
pub type EventId = u64;

/// Id of the event that caused this one, when known.
pub type CausationId = Option<EventId>;

/// Whether an event class must be durable before the caller is acknowledged
/// (spec §4.1, §9 "Async event emission"). A single flag per event type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Durability {
    Durable,
    BestEffort,
}

/// Events that trigger state transitions in the system (spec §3's full
/// vocabulary). Serializes with `{"type": "event:name", ...fields}`.
/// Unknown type tags deserialize to `Custom` for forward compatibility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    #[serde(rename = "service:deployed")]
    ServiceDeployed {
        tenant_id: TenantId,
        service_id: ServiceId,
        source: String,
        format: String,
        restart_policy: crate::service::RestartPolicy,
    },

    #[serde(rename = "service:deployment_failed")]
    ServiceDeploymentFailed { tenant_id: TenantId, service_id: ServiceId, reason: String },

    #[serde(rename = "service:killed")]
    ServiceKilled { tenant_id: TenantId, service_id: ServiceId },

    #[serde(rename = "service:crashed")]
    ServiceCrashed { tenant_id: TenantId, service_id: ServiceId, reason: String },

    #[serde(rename = "service:restarted")]
    ServiceRestarted { tenant_id: TenantId, service_id: ServiceId, attempt: u32 },

    #[serde(rename = "service:recovered")]
    ServiceRecovered { tenant_id: TenantId, service_id: ServiceId },

    #[serde(rename = "service:recovery_failed")]
    ServiceRecoveryFailed { tenant_id: TenantId, service_id: ServiceId, reason: String },

    #[serde(rename = "capability:granted")]
    CapabilityGranted {
        tenant_id: TenantId,
        token_hash: TokenHash,
        resource_ref: String,
        #[serde(default)]
        permissions: Vec<String>,
        ttl_seconds: u64,
    },

    #[serde(rename = "capability:verified")]
    CapabilityVerified { tenant_id: TenantId, token_hash: TokenHash, resource_ref: String },

    #[serde(rename = "capability:denied")]
    CapabilityDenied {
        tenant_id: TenantId,
        token_hash: Option<TokenHash>,
        resource_ref: String,
        reason: crate::capability::CapabilityDenialReason,
    },

    #[serde(rename = "capability:revoked")]
    CapabilityRevoked { token_hash: TokenHash },

    #[serde(rename = "resource:violation")]
    ResourceViolation {
        tenant_id: TenantId,
        service_id: ServiceId,
        kind: String,
        action: String,
    },

    #[serde(rename = "circuit_breaker:opened")]
    CircuitBreakerOpened { tenant_id: TenantId, service_id: ServiceId },

    #[serde(rename = "circuit_breaker:closed")]
    CircuitBreakerClosed { tenant_id: TenantId, service_id: ServiceId },

    #[serde(rename = "hot_swap:started")]
    HotSwapStarted { tenant_id: TenantId, service_id: ServiceId },

    #[serde(rename = "hot_swap:succeeded")]
    HotSwapSucceeded { tenant_id: TenantId, service_id: ServiceId },

    #[serde(rename = "hot_swap:rolled_back")]
    HotSwapRolledBack { tenant_id: TenantId, service_id: ServiceId, reason: String },

    #[serde(rename = "hot_swap:failed")]
    HotSwapFailed { tenant_id: TenantId, service_id: ServiceId, reason: String },

    #[serde(rename = "secret:stored")]
    SecretStored { tenant_id: TenantId, name: String },

    #[serde(rename = "secret:accessed")]
    SecretAccessed { tenant_id: TenantId, name: String },

    #[serde(rename = "secret:access_denied")]
    SecretAccessDenied { tenant_id: TenantId, name: String, reason: String },

    #[serde(rename = "secret:revoked")]
    SecretRevoked { tenant_id: TenantId, name: String },

    #[serde(rename = "atom:usage_high")]
    AtomUsageHigh { count: u64, limit: u64 },

    #[serde(rename = "system:shutdown_started")]
    SystemShutdownStarted,

    #[serde(rename = "system:shutdown_complete")]
    SystemShutdownComplete,

    /// Catch-all for unknown event types (extensibility).
    #[serde(other, skip_serializing)]
    Custom,
}

impl Event {
    /// The event type tag, as it appears on the wire (spec §3 vocabulary).
    pub fn event_type(&self) -> &'static str {
        match self {
            Event::ServiceDeployed { .. } => "service_deployed",
            Event::ServiceDeploymentFailed { .. } => "service_deployment_failed",
            Event::ServiceKilled { .. } => "service_killed",
            Event::ServiceCrashed { .. } => "service_crashed",
            Event::ServiceRestarted { .. } => "service_restarted",
            Event::ServiceRecovered { .. } => "service_recovered",
            Event::ServiceRecoveryFailed { .. } => "service_recovery_failed",
            Event::CapabilityGranted { .. } => "capability_granted",
            Event::CapabilityVerified { .. } => "capability_verified",
            Event::CapabilityDenied { .. } => "capability_denied",
            Event::CapabilityRevoked { .. } => "capability_revoked",
            Event::ResourceViolation { .. } => "resource_violation",
            Event::CircuitBreakerOpened { .. } => "circuit_breaker_opened",
            Event::CircuitBreakerClosed { .. } => "circuit_breaker_closed",
            Event::HotSwapStarted { .. } => "hot_swap_started",
            Event::HotSwapSucceeded { .. } => "hot_swap_succeeded",
            Event::HotSwapRolledBack { .. } => "hot_swap_rolled_back",
            Event::HotSwapFailed { .. } => "hot_swap_failed",
            Event::SecretStored { .. } => "secret_stored",
            Event::SecretAccessed { .. } => "secret_accessed",
            Event::SecretAccessDenied { .. } => "secret_access_denied",
            Event::SecretRevoked { .. } => "secret_revoked",
            Event::AtomUsageHigh { .. } => "atom_usage_high",
            Event::SystemShutdownStarted => "system_shutdown_started",
            Event::SystemShutdownComplete => "system_shutdown_complete",
            Event::Custom => "custom",
        }
    }

    /// Durability class for this event (spec §4.1, §9): lifecycle and
    /// shutdown-boundary events are durable, high-frequency telemetry-shaped
    /// events are best-effort.
    pub fn durability(&self) -> Durability {
        match self {
            Event::CapabilityVerified { .. } | Event::ResourceViolation { .. } => {
                Durability::BestEffort
            }
            _ => Durability::Durable,
        }
    }

    /// `{tenant_id, service_id}` subject, when this event has one (spec §3).
    pub fn subject(&self) -> Option<(&TenantId, &ServiceId)> {
        match self {
            Event::ServiceDeployed { tenant_id, service_id, .. }
            | Event::ServiceDeploymentFailed { tenant_id, service_id, .. }
            | Event::ServiceKilled { tenant_id, service_id }
            | Event::ServiceCrashed { tenant_id, service_id, .. }
            | Event::ServiceRestarted { tenant_id, service_id, .. }
            | Event::ServiceRecovered { tenant_id, service_id }
            | Event::ServiceRecoveryFailed { tenant_id, service_id, .. }
            | Event::ResourceViolation { tenant_id, service_id, .. }
            | Event::CircuitBreakerOpened { tenant_id, service_id }
            | Event::CircuitBreakerClosed { tenant_id, service_id }
            | Event::HotSwapStarted { tenant_id, service_id }
            | Event::HotSwapSucceeded { tenant_id, service_id }
            | Event::HotSwapRolledBack { tenant_id, service_id, .. }
            | Event::HotSwapFailed { tenant_id, service_id, .. } => Some((tenant_id, service_id)),
            _ => None,
        }
    }

    /// The tenant this event belongs to, when known (spec §3 `tenant_id`).
    pub fn tenant_id(&self) -> Option<&TenantId> {
        if let Some((tenant_id, _)) = self.subject() {
            return Some(tenant_id);
        }
        match self {
            Event::CapabilityGranted { tenant_id, .. }
            | Event::CapabilityVerified { tenant_id, .. }
            | Event::CapabilityDenied { tenant_id, .. }
            | Event::SecretStored { tenant_id, .. }
            | Event::SecretAccessed { tenant_id, .. }
            | Event::SecretAccessDenied { tenant_id, .. }
            | Event::SecretRevoked { tenant_id, .. } => Some(tenant_id),
            _ => None,
        }
    }
}

/// An immutable event as stored in the log: an `Event` plus the envelope
/// fields the store itself assigns (spec §3 "Event").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: EventId,
    pub wall_clock_epoch_ms: u64,
    /// Monotonic nanoseconds since the store opened (spec §3 `monotonic_ts`);
    /// used to order events appended within the same wall-clock millisecond.
    pub monotonic_ts: u64,
    pub tenant_id: Option<TenantId>,
    pub causation_id: CausationId,
    pub event: Event,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub extra: HashMap<String, serde_json::Value>,
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
