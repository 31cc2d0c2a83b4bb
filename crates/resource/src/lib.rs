// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! kernel-resource: per-worker resource monitor and circuit breaker (spec
//! §4.8, C8), the gateway-adjacent load shedder (spec §4.9, C9), and the
//! hot-swap watchdog (spec §4.10, C10).

pub mod breaker;
pub mod monitor;
pub mod shedder;
pub mod watchdog;

pub use breaker::{BreakerConfig, BreakerState, CircuitBreaker};
pub use monitor::{ResourceLimits, ResourceMonitor, ResourceSample, SampleSource, Violation, ViolationAction, ViolationKind};
pub use shedder::{LoadShedder, ShedderError};
pub use watchdog::{HotSwapWatchdog, WatchdogOutcome};
