// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! kernel-daemon: the Deployer (spec §4.6, C6), graceful shutdown (spec
//! §4.12, C12), and the Kernel Root boot sequence (spec §4.13, C13) that
//! composes every other crate into a running kernel.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod config;
pub mod deployer;
pub mod error;
pub mod kernel;
pub mod shutdown;

pub use config::Config;
pub use deployer::{DeployError, DeploySpec, Deployer, StatusInfo};
pub use error::KernelError;
pub use kernel::Kernel;
