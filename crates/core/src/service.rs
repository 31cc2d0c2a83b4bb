// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Service metadata record (spec §3 "Service").

use crate::event::EventId;
use crate::ids::ServiceRef;
use serde::{Deserialize, Serialize};

/// Bounded restart behaviour for a service's worker (spec §4.4, §5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestartPolicy {
    pub max_restarts: u32,
    pub window_seconds: u64,
    pub startup_timeout_ms: u64,
    pub shutdown_timeout_ms: u64,
}

impl Default for RestartPolicy {
    /// Tenant-level default from spec §4.4: `max_restarts=10` per 60s.
    fn default() -> Self {
        Self {
            max_restarts: 10,
            window_seconds: 60,
            startup_timeout_ms: 5_000,
            shutdown_timeout_ms: 5_000,
        }
    }
}

impl RestartPolicy {
    /// Per-service default from spec §4.4: `max_restarts=3` per 30s.
    pub fn per_service_default() -> Self {
        Self {
            max_restarts: 3,
            window_seconds: 30,
            startup_timeout_ms: 5_000,
            shutdown_timeout_ms: 5_000,
        }
    }
}

/// A deployed service's metadata record, owned by the Deployer (spec §3).
///
/// Identity is `{tenant_id, service_id}`; the worker it currently owns may
/// be restarted repeatedly without changing this record's identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub id: ServiceRef,
    pub deployed_from_event_id: EventId,
    pub restart_policy: RestartPolicy,
    pub code_fingerprint: String,
}

#[cfg(test)]
#[path = "service_tests.rs"]
mod tests;
