// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! kernel-compiler: the compiler adapter port (spec §4.5, C5) and the
//! pluggable worker abstraction the tenant supervisor drives (spec §4.4,
//! §5 "actor-per-service").
//!
//! This crate is deliberately narrow: any foreign compiler can be plugged
//! in by implementing [`CompilerAdapter`], and any runtime unit can be
//! hosted by implementing [`ServiceFactory`]/[`ServiceHandle`]. The
//! `script` module is one reference implementation over a subprocess.

pub mod script;

use async_trait::async_trait;
use kernel_core::{ServiceId, TenantId};
use std::fmt;
use thiserror::Error;

/// A loadable unit produced by compilation (spec §4.5).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledModule {
    pub module_identifier: String,
    pub bytecode: Vec<u8>,
}

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("compile failed: {0}")]
    Failed(String),
}

/// Source → loadable module (spec §4.5 "Compiler Adapter").
#[async_trait]
pub trait CompilerAdapter: Send + Sync {
    async fn compile(
        &self,
        tenant_id: &TenantId,
        service_id: &ServiceId,
        format: &str,
        source: &str,
    ) -> Result<CompiledModule, CompileError>;
}

/// Namespace a module identifier so concurrent tenants cannot collide
/// (spec §4.5): non-alphanumeric/underscore maps to `_`, prefixed with `_`
/// to guarantee a legal identifier.
pub fn sanitise_identifier(tenant_id: &TenantId, service_id: &ServiceId) -> String {
    let sanitise = |s: &str| -> String {
        s.chars().map(|c| if c.is_alphanumeric() || c == '_' { c } else { '_' }).collect()
    };
    format!("_{}_{}", sanitise(tenant_id.as_str()), sanitise(service_id.as_str()))
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("start failed: {0}")]
    StartFailed(String),
    #[error("send failed: {0}")]
    SendFailed(String),
    #[error("worker does not support in-place code change")]
    CodeChangeUnsupported,
    #[error("code change failed: {0}")]
    CodeChangeFailed(String),
}

/// A message dispatched to a running worker. Opaque to the supervisor.
pub type ServiceMessage = Vec<u8>;

/// A running worker instance (spec §5 "actor-per-service"): an
/// independently schedulable unit with private state and an inbox.
#[async_trait]
pub trait ServiceHandle: Send + Sync {
    /// Deliver a message to the worker's inbox.
    async fn send(&self, message: ServiceMessage) -> Result<(), ServiceError>;

    /// Whether the worker is still running.
    async fn is_alive(&self) -> bool;

    /// Request graceful shutdown; the worker has until the caller's timeout
    /// to react before the supervisor force-kills it (spec §4.6 `Kill`).
    async fn shutdown(&self);

    /// Force-terminate immediately (spec §4.8 `action=kill`).
    async fn kill(&self);

    /// In-place code-change hook for hot swap (spec §4.10). Workers that
    /// don't implement migration should return `CodeChangeUnsupported`.
    async fn code_change(&self, _new_module: &CompiledModule) -> Result<(), ServiceError> {
        Err(ServiceError::CodeChangeUnsupported)
    }
}

/// Starts a [`CompiledModule`] as a running [`ServiceHandle`] (spec §4.5
/// "a loadable unit exposing `start_link(initArg)`").
#[async_trait]
pub trait ServiceFactory: Send + Sync {
    async fn start(
        &self,
        module: &CompiledModule,
        init_arg: (TenantId, ServiceId),
    ) -> Result<Box<dyn ServiceHandle>, ServiceError>;
}

impl fmt::Debug for dyn ServiceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ServiceHandle")
    }
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
