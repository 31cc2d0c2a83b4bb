// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! kernel-supervisor: service registry (spec §4.2, C2) and the per-tenant
//! hierarchical supervisor tree with bounded restart intensity (spec §4.4,
//! C4).

pub mod registry;
pub mod restart_window;
pub mod strategy;
pub mod tree;

pub use registry::{RegistryError, ServiceRegistry};
pub use restart_window::RestartWindow;
pub use strategy::Strategy;
pub use tree::{RestartDecision, SupervisorError, TenantSupervisorTree};
