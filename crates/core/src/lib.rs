// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! kernel-core: shared domain types for the multi-tenant service-hosting kernel

pub mod macros;

pub mod capability;
pub mod clock;
pub mod event;
pub mod ids;
pub mod service;

pub use capability::{Capability, CapabilityDenialReason, Permission, ResourceRef};
pub use clock::{Clock, FakeClock, SystemClock};
pub use event::{CausationId, Durability, Event, EventId, EventRecord};
pub use ids::{ServiceId, ServiceRef, TenantId, TokenHash};
pub use service::{RestartPolicy, Service};
