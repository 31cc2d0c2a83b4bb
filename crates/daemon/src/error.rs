// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Top-level error composing every crate boundary's own error type (spec
//! §7 "Error Handling Design"), mirroring `LifecycleError` in the
//! teacher's `daemon/src/lifecycle/mod.rs`.

use crate::config::ConfigError;
use crate::deployer::DeployError;
use kernel_capability::CapabilityError;
use kernel_storage::{StoreError, TokenStoreError};
use kernel_supervisor::SupervisorError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum KernelError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    TokenStore(#[from] TokenStoreError),
    #[error(transparent)]
    Capability(#[from] CapabilityError),
    #[error(transparent)]
    Supervisor(#[from] SupervisorError),
    #[error(transparent)]
    Deploy(#[from] DeployError),
    #[error("failed to install signal handler: {0}")]
    SignalHandler(std::io::Error),
}
