// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reference compiler adapter and service factory: source is a shell
//! script, the "loadable unit" is the script body, and the worker is a
//! subprocess running it (spec §4.5 "any foreign compiler can be plugged
//! in").

use crate::{
    sanitise_identifier, CompileError, CompiledModule, CompilerAdapter, ServiceError,
    ServiceFactory, ServiceHandle, ServiceMessage,
};
use async_trait::async_trait;
use kernel_core::{ServiceId, TenantId};
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use parking_lot::Mutex;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, Command};

pub const FORMAT: &str = "shell_script";

/// Compiles by validating the format and wrapping the script body — there
/// is no real bytecode step for a subprocess worker.
pub struct ScriptCompilerAdapter;

#[async_trait]
impl CompilerAdapter for ScriptCompilerAdapter {
    async fn compile(
        &self,
        tenant_id: &TenantId,
        service_id: &ServiceId,
        format: &str,
        source: &str,
    ) -> Result<CompiledModule, CompileError> {
        if format != FORMAT {
            return Err(CompileError::UnsupportedFormat(format.to_string()));
        }
        if source.trim().is_empty() {
            return Err(CompileError::Failed("empty script body".to_string()));
        }
        Ok(CompiledModule {
            module_identifier: sanitise_identifier(tenant_id, service_id),
            bytecode: source.as_bytes().to_vec(),
        })
    }
}

/// Starts each module's script under `sh -c`, one subprocess per worker.
pub struct ScriptServiceFactory;

#[async_trait]
impl ServiceFactory for ScriptServiceFactory {
    async fn start(
        &self,
        module: &CompiledModule,
        init_arg: (TenantId, ServiceId),
    ) -> Result<Box<dyn ServiceHandle>, ServiceError> {
        let script = String::from_utf8_lossy(&module.bytecode).into_owned();
        let (tenant_id, service_id) = init_arg;

        let mut child = Command::new("sh")
            .arg("-c")
            .arg(script)
            .env("KERNEL_TENANT_ID", tenant_id.as_str())
            .env("KERNEL_SERVICE_ID", service_id.as_str())
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| ServiceError::StartFailed(e.to_string()))?;

        let stdin = child.stdin.take();
        Ok(Box::new(ScriptServiceHandle { child: Mutex::new(child), stdin: Mutex::new(stdin) }))
    }
}

pub struct ScriptServiceHandle {
    child: Mutex<Child>,
    stdin: Mutex<Option<tokio::process::ChildStdin>>,
}

#[async_trait]
impl ServiceHandle for ScriptServiceHandle {
    async fn send(&self, message: ServiceMessage) -> Result<(), ServiceError> {
        let mut stdin = {
            let mut guard = self.stdin.lock();
            match guard.take() {
                Some(stdin) => stdin,
                None => return Err(ServiceError::SendFailed("stdin closed".to_string())),
            }
        };
        let result = async {
            stdin.write_all(&message).await.map_err(|e| ServiceError::SendFailed(e.to_string()))?;
            stdin.write_all(b"\n").await.map_err(|e| ServiceError::SendFailed(e.to_string()))
        }
        .await;
        *self.stdin.lock() = Some(stdin);
        result
    }

    async fn is_alive(&self) -> bool {
        matches!(self.child.lock().try_wait(), Ok(None))
    }

    async fn shutdown(&self) {
        *self.stdin.lock() = None;
        let pid = self.child.lock().id();
        if let Some(pid) = pid {
            let _ = kill(Pid::from_raw(pid as i32), Signal::SIGTERM);
        }
    }

    async fn kill(&self) {
        let _ = self.child.lock().start_kill();
    }
}

#[cfg(test)]
#[path = "script_tests.rs"]
mod tests;
