// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate (spec §6
//! "Environment"), grounded in the teacher's `env.rs`: one function per
//! setting, sensible defaults, `OJK_`-prefixed overrides.

use kernel_resource::ResourceLimits;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not determine a data directory: set OJK_DATA_DIR or HOME")]
    NoDataDir,
}

/// Data directory: `OJK_DATA_DIR` > `XDG_STATE_HOME/kernel` > `~/.local/state/kernel`.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    if let Ok(dir) = std::env::var("OJK_DATA_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("kernel"));
    }
    let home = std::env::var("HOME").map_err(|_| ConfigError::NoDataDir)?;
    Ok(PathBuf::from(home).join(".local/state/kernel"))
}

/// Grace-shutdown drain delay (spec §4.12 "sleep briefly (~100ms)"),
/// overridable via `OJK_SHUTDOWN_DRAIN_MS`.
pub fn shutdown_drain() -> Duration {
    std::env::var("OJK_SHUTDOWN_DRAIN_MS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(Duration::from_millis(100))
}

/// Resource-monitor sampling interval (spec §4.8 `check_interval_ms`,
/// default 1000-5000ms), overridable via `OJK_RESOURCE_CHECK_MS`.
pub fn resource_check_interval() -> Duration {
    std::env::var("OJK_RESOURCE_CHECK_MS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(Duration::from_millis(1000))
}

/// Default per-tenant concurrency quota for the Load Shedder (spec §4.9),
/// overridable via `OJK_DEFAULT_TENANT_LIMIT`.
pub fn default_tenant_limit() -> u32 {
    std::env::var("OJK_DEFAULT_TENANT_LIMIT")
        .ok()
        .and_then(|s| s.parse::<u32>().ok())
        .unwrap_or(100)
}

/// Default per-worker resource limits (spec §4.8), individual fields
/// overridable via `OJK_MAX_MEMORY_BYTES` / `OJK_MAX_INBOX_DEPTH`.
pub fn default_resource_limits() -> ResourceLimits {
    let mut limits = ResourceLimits::default();
    if let Some(max) = std::env::var("OJK_MAX_MEMORY_BYTES").ok().and_then(|s| s.parse().ok()) {
        limits.max_memory_bytes = max;
    }
    if let Some(max) = std::env::var("OJK_MAX_INBOX_DEPTH").ok().and_then(|s| s.parse().ok()) {
        limits.max_inbox_depth = max;
    }
    limits
}

/// Everything the core reads from its environment (spec §6 "Environment"):
/// a data directory, a grace-shutdown delay, and resource-limit defaults.
#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub log_path: PathBuf,
    pub shutdown_drain: Duration,
    pub resource_check_interval: Duration,
    pub default_tenant_limit: u32,
    pub default_resource_limits: ResourceLimits,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        let data_dir = data_dir()?;
        Ok(Self {
            log_path: data_dir.join("kernel.log"),
            data_dir,
            shutdown_drain: shutdown_drain(),
            resource_check_interval: resource_check_interval(),
            default_tenant_limit: default_tenant_limit(),
            default_resource_limits: default_resource_limits(),
        })
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
