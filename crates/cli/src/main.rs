// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `ojctl` - smoke-test CLI for the kernel (spec §6).
//!
//! This spec's core has no wire transport, so unlike the teacher's `oj`
//! CLI (which talks to a daemon over a Unix socket) `ojctl` boots a kernel
//! in-process, drives it through a single operation, and shuts down.
//! Requests/responses are still built as `kernel-wire` types first and
//! unpacked into the corresponding daemon call, so the wire shapes stay
//! exercised even without a transport to carry them.

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use kernel_core::{EventId, RestartPolicy, ServiceId, SystemClock, TenantId, TokenHash};
use kernel_daemon::deployer::DeploySpec;
use kernel_daemon::{Config, Kernel};
use kernel_storage::EventFilter;
use kernel_wire::{
    DeployRequest, DeployResponse, GrantCapabilityRequest, GrantCapabilityResponse, HotSwapRequest,
    KillRequest, ListEntry, ListRequest, ListResponse, RevokeCapabilityRequest, StatusRequest,
    StatusResponse, VerifyCapabilityRequest, WatchRequest, WireError,
};
use std::collections::HashSet;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "ojctl", version, about = "Smoke-test CLI for the multi-tenant kernel")]
struct Cli {
    /// Print machine-readable JSON instead of plain text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Deploy a new service
    Deploy {
        #[arg(long)]
        tenant: String,
        #[arg(long)]
        service: String,
        #[arg(long)]
        source: String,
        #[arg(long, default_value = "shell_script")]
        format: String,
        #[arg(long)]
        max_restarts: Option<u32>,
        #[arg(long)]
        window_seconds: Option<u64>,
    },
    /// Kill a running service
    Kill {
        #[arg(long)]
        tenant: String,
        #[arg(long)]
        service: String,
        #[arg(long, default_value_t = 5_000)]
        timeout_ms: u64,
        #[arg(long)]
        force: bool,
    },
    /// Report a service's liveness and last resource sample
    Status {
        #[arg(long)]
        tenant: String,
        #[arg(long)]
        service: String,
    },
    /// List the services registered for a tenant
    List {
        #[arg(long)]
        tenant: String,
    },
    /// Stream events for a tenant (optionally scoped to one service) until Ctrl-C
    Watch {
        #[arg(long)]
        tenant: String,
        #[arg(long)]
        service: Option<String>,
        #[arg(long, default_value_t = 0)]
        since_id: EventId,
    },
    /// Grant a capability token
    Grant {
        #[arg(long)]
        tenant: String,
        #[arg(long)]
        resource: String,
        #[arg(long, value_delimiter = ',')]
        permissions: Vec<String>,
        #[arg(long)]
        ttl_seconds: u64,
    },
    /// Verify a capability token
    Verify {
        #[arg(long)]
        tenant: String,
        #[arg(long)]
        token: String,
        #[arg(long)]
        resource: String,
        #[arg(long)]
        permission: String,
    },
    /// Revoke a capability token by its hash
    Revoke {
        #[arg(long)]
        token_hash: String,
    },
    /// Hot-swap a running service's code
    Hotswap {
        #[arg(long)]
        tenant: String,
        #[arg(long)]
        service: String,
        #[arg(long)]
        new_source: String,
        #[arg(long, default_value_t = 30_000)]
        rollback_window_ms: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load()?;
    let (kernel, _report) = Kernel::boot(&config, SystemClock).await?;

    let result = run(&kernel, cli.command, cli.json).await;

    kernel.shutdown(config.shutdown_drain).await;
    result
}

async fn run(kernel: &Kernel<SystemClock>, command: Command, json: bool) -> Result<()> {
    match command {
        Command::Deploy { tenant, service, source, format, max_restarts, window_seconds } => {
            let restart_policy = (max_restarts.is_some() || window_seconds.is_some()).then(|| {
                let mut policy = RestartPolicy::per_service_default();
                if let Some(m) = max_restarts {
                    policy.max_restarts = m;
                }
                if let Some(w) = window_seconds {
                    policy.window_seconds = w;
                }
                policy
            });
            let request = DeployRequest {
                tenant_id: TenantId::new(tenant),
                service_id: ServiceId::new(service),
                source,
                format,
                restart_policy,
            };
            let worker_handle = format!("{}/{}", request.tenant_id, request.service_id);
            kernel
                .deployer
                .deploy(DeploySpec {
                    tenant_id: request.tenant_id,
                    service_id: request.service_id,
                    source: request.source,
                    format: request.format,
                    restart_policy: request.restart_policy,
                })
                .await
                .map_err(deploy_error)?;
            print_response(&DeployResponse { worker_handle }, json);
        }

        Command::Kill { tenant, service, timeout_ms, force } => {
            let request = KillRequest {
                tenant_id: TenantId::new(tenant),
                service_id: ServiceId::new(service),
                timeout_ms,
                force,
            };
            kernel
                .deployer
                .kill(&request.tenant_id, &request.service_id, Duration::from_millis(request.timeout_ms), request.force)
                .await
                .map_err(deploy_error)?;
            println!("ok");
        }

        Command::Status { tenant, service } => {
            let request = StatusRequest { tenant_id: TenantId::new(tenant), service_id: ServiceId::new(service) };
            let status = kernel.deployer.status(&request.tenant_id, &request.service_id).await.map_err(deploy_error)?;
            print_response(
                &StatusResponse {
                    alive: status.alive,
                    memory_bytes: status.memory_bytes,
                    inbox_len: status.inbox_len,
                    work_units: status.work_units,
                },
                json,
            );
        }

        Command::List { tenant } => {
            let request = ListRequest { tenant_id: TenantId::new(tenant) };
            let services = kernel
                .deployer
                .list(&request.tenant_id)
                .await
                .into_iter()
                .map(|(service_id, alive)| ListEntry { service_id, alive })
                .collect();
            print_response(&ListResponse { services }, json);
        }

        Command::Watch { tenant, service, since_id } => {
            let request = WatchRequest {
                tenant_id: TenantId::new(tenant),
                service_id: service.map(ServiceId::new),
                since_id,
            };
            watch(kernel, request, json).await;
        }

        Command::Grant { tenant, resource, permissions, ttl_seconds } => {
            let request = GrantCapabilityRequest {
                tenant_id: TenantId::new(tenant),
                resource_ref: resource,
                permissions,
                ttl_seconds,
                metadata: Default::default(),
            };
            let token = kernel
                .capability
                .grant(
                    request.tenant_id,
                    request.resource_ref,
                    request.permissions.into_iter().collect::<HashSet<_>>(),
                    request.ttl_seconds,
                    request.metadata,
                )
                .map_err(|e| WireError::TransientIo { message: e.to_string() })?;
            print_response(&GrantCapabilityResponse { token }, json);
        }

        Command::Verify { tenant, token, resource, permission } => {
            let request = VerifyCapabilityRequest {
                tenant_id: TenantId::new(tenant),
                token,
                resource_ref: resource,
                permission,
            };
            kernel
                .capability
                .verify(&request.tenant_id, &request.token, &request.resource_ref, &request.permission)
                .map_err(|reason| WireError::PermissionDenied { reason: reason.to_string() })?;
            println!("ok");
        }

        Command::Revoke { token_hash } => {
            let request = RevokeCapabilityRequest { token_hash };
            let hash = parse_token_hash(&request.token_hash)?;
            kernel.capability.revoke(hash).map_err(|e| WireError::TransientIo { message: e.to_string() })?;
            println!("ok");
        }

        Command::Hotswap { tenant, service, new_source, rollback_window_ms } => {
            let request = HotSwapRequest {
                tenant_id: TenantId::new(tenant),
                service_id: ServiceId::new(service),
                new_source,
                rollback_window_ms,
            };
            let outcome = kernel
                .deployer
                .hot_swap(
                    &request.tenant_id,
                    &request.service_id,
                    request.new_source,
                    Duration::from_millis(request.rollback_window_ms),
                )
                .await
                .map_err(deploy_error)?;
            println!("{outcome:?}");
        }
    }
    Ok(())
}

/// Poll the event store for new records until interrupted, printing each
/// as it arrives. There is no gateway push channel in this workspace's
/// scope, so this is a client-side poll rather than a server-pushed stream.
async fn watch(kernel: &Kernel<SystemClock>, request: WatchRequest, json: bool) {
    let filter =
        EventFilter { tenant_id: Some(request.tenant_id), service_id: request.service_id, event_type: None };
    let mut since_id = request.since_id;
    let mut ctrl_c = Box::pin(tokio::signal::ctrl_c());
    loop {
        let records = kernel.store.stream(&filter, since_id, 0);
        for record in &records {
            since_id = record.id;
            if json {
                if let Ok(line) = serde_json::to_string(record) {
                    println!("{line}");
                }
            } else {
                println!("{since_id} {} {:?}", record.event.event_type(), record.event);
            }
        }
        tokio::select! {
            _ = &mut ctrl_c => return,
            _ = tokio::time::sleep(Duration::from_millis(200)) => {}
        }
    }
}

fn print_response<T: serde::Serialize + std::fmt::Debug>(response: &T, json: bool) {
    if json {
        match serde_json::to_string(response) {
            Ok(line) => println!("{line}"),
            Err(_) => println!("{response:?}"),
        }
    } else {
        println!("{response:?}");
    }
}

fn parse_token_hash(hex: &str) -> Result<TokenHash> {
    if hex.len() != 64 {
        bail!("token hash must be 64 hex characters, got {}", hex.len());
    }
    let mut bytes = [0u8; 32];
    for (i, b) in bytes.iter_mut().enumerate() {
        let pair = &hex[i * 2..i * 2 + 2];
        *b = u8::from_str_radix(pair, 16)?;
    }
    Ok(TokenHash::from_bytes(bytes))
}

fn deploy_error(e: kernel_daemon::DeployError) -> anyhow::Error {
    use kernel_daemon::DeployError as E;
    let wire = match &e {
        E::UnsupportedFormat(_) => WireError::Validation { message: e.to_string() },
        E::Compile(_) => WireError::CompileFailure { message: e.to_string() },
        E::Conflict(_) => WireError::Conflict { message: e.to_string() },
        E::NotFound(_) => WireError::NotFound { message: e.to_string() },
        E::Start(_) | E::HotSwap(_) | E::Store(_) => WireError::TransientIo { message: e.to_string() },
    };
    wire.into()
}
