// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! kernel-recovery: replay-driven recovery engine and post-recovery
//! consistency verifier (spec §4.11, C11).
//!
//! Neither component drives a live `Deployer`/registry directly — that
//! would make this crate depend on `kernel-daemon`, which depends on this
//! crate. Instead the boundary is two small traits
//! ([`RecoveryDeployer`], [`RecoveryRegistryView`] + [`RecoveryKiller`])
//! that `kernel-daemon` implements over its real `Deployer` and service
//! registry.

mod sets;
pub mod engine;
pub mod verifier;

pub use engine::{RecoveryDeployer, RecoveryReport, RecoverySpec};
pub use verifier::{RecoveryKiller, RecoveryRegistryView, VerifierReport};
