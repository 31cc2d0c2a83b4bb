// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Response shapes for the nine external operations (spec §6). `Kill`,
//! `RevokeCapability`, and `HotSwap` return a bare `ok` on success — plain
//! `Result<(), WireError>` models that without a dedicated type.

use kernel_core::{EventId, EventRecord, ServiceId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployResponse {
    pub worker_handle: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub alive: bool,
    pub memory_bytes: u64,
    pub inbox_len: u64,
    pub work_units: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListEntry {
    pub service_id: ServiceId,
    pub alive: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListResponse {
    pub services: Vec<ListEntry>,
}

/// One item of a `Watch` stream; `next_since_id` lets the caller resume
/// after a disconnect (spec §4.1 "restartable stream").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchEvent {
    pub record: EventRecord,
    pub next_since_id: EventId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantCapabilityResponse {
    pub token: String,
}

#[cfg(test)]
#[path = "responses_tests.rs"]
mod tests;
