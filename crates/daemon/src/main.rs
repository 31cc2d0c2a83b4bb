// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Multi-tenant service-hosting kernel daemon (`oj-kernel`).
//!
//! Boots every system component in the spec's fixed order (Kernel Root,
//! spec §4.13), then waits for `SIGTERM` and runs the graceful shutdown
//! sequence. No socket and no gateway live here — both are external
//! collaborators out of this workspace's scope, so unlike the teacher's
//! own daemon there is no lock-file single-instance check to perform.

use kernel_daemon::config::ConfigError;
use kernel_daemon::{Config, Kernel, KernelError};
use kernel_core::SystemClock;
use tracing::{error, info};

const MAX_LOG_SIZE: u64 = 10 * 1024 * 1024;
const MAX_ROTATED_LOGS: u32 = 3;

/// Prefix the CLI greps for to find where the current boot attempt begins.
/// Full format: "--- oj-kernel: starting (pid: 12345) ---"
const STARTUP_MARKER_PREFIX: &str = "--- oj-kernel: starting (pid: ";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Some(arg) = std::env::args().nth(1) {
        match arg.as_str() {
            "--version" | "-V" | "-v" => {
                println!("oj-kernel {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" | "-h" | "help" => {
                println!("oj-kernel {}", env!("CARGO_PKG_VERSION"));
                println!("Multi-tenant service-hosting kernel daemon");
                println!();
                println!("USAGE:");
                println!("    oj-kernel");
                println!();
                println!("The daemon is typically started by a supervising process and");
                println!("should not be invoked directly.");
                println!();
                println!("OPTIONS:");
                println!("    -h, --help       Print help information");
                println!("    -v, --version    Print version information");
                return Ok(());
            }
            _ => {
                eprintln!("error: unexpected argument '{arg}'");
                eprintln!("Usage: oj-kernel [--help | --version]");
                std::process::exit(1);
            }
        }
    }

    let config = Config::load()?;

    rotate_log_if_needed(&config.log_path);
    write_startup_marker(&config)?;
    let _log_guard = setup_logging(&config)?;

    info!("starting kernel");

    let (kernel, report) = match Kernel::boot(&config, SystemClock).await {
        Ok(ok) => ok,
        Err(e) => {
            write_startup_error(&config, &e);
            error!(error = %e, "failed to boot kernel");
            return Err(e.into());
        }
    };
    info!(
        recovered = report.recovered_count,
        skipped = report.skipped_count,
        failed = report.failed_count,
        "boot complete"
    );

    println!("READY");

    kernel.shutdown_token.clone().cancelled().await;
    info!("shutting down");
    kernel.shutdown(config.shutdown_drain).await;
    info!("kernel stopped");
    Ok(())
}

/// Rotate the daemon log file if it exceeds [`MAX_LOG_SIZE`].
fn rotate_log_if_needed(log_path: &std::path::Path) {
    let size = match std::fs::metadata(log_path) {
        Ok(m) => m.len(),
        Err(_) => return,
    };
    if size < MAX_LOG_SIZE {
        return;
    }

    let log_str = log_path.display().to_string();
    for i in (1..MAX_ROTATED_LOGS).rev() {
        let from = format!("{log_str}.{i}");
        let to = format!("{log_str}.{}", i + 1);
        let _ = std::fs::rename(&from, &to);
    }
    let _ = std::fs::rename(log_path, format!("{log_str}.1"));
}

/// Append the startup marker to the log file before tracing is set up, so
/// it's visible even if logging itself fails to initialize.
fn write_startup_marker(config: &Config) -> Result<(), ConfigError> {
    use std::io::Write;

    if let Some(parent) = config.log_path.parent() {
        std::fs::create_dir_all(parent).map_err(|_| ConfigError::NoDataDir)?;
    }
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.log_path)
        .map_err(|_| ConfigError::NoDataDir)?;
    writeln!(file, "{}{}) ---\n", STARTUP_MARKER_PREFIX, std::process::id())
        .map_err(|_| ConfigError::NoDataDir)?;
    Ok(())
}

/// Write a boot failure synchronously, since the async tracing writer may
/// not flush before the process exits.
fn write_startup_error(config: &Config, error: &KernelError) {
    use std::io::Write;

    let Ok(mut file) = std::fs::OpenOptions::new().create(true).append(true).open(&config.log_path) else {
        return;
    };
    let _ = writeln!(file, "ERROR failed to boot kernel: {error}");
}

fn setup_logging(config: &Config) -> Result<tracing_appender::non_blocking::WorkerGuard, ConfigError> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    if let Some(parent) = config.log_path.parent() {
        std::fs::create_dir_all(parent).map_err(|_| ConfigError::NoDataDir)?;
    }

    let file_appender = tracing_appender::rolling::never(
        config.log_path.parent().ok_or(ConfigError::NoDataDir)?,
        config.log_path.file_name().ok_or(ConfigError::NoDataDir)?,
    );
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry().with(filter).with(fmt::layer().with_writer(non_blocking)).init();

    Ok(guard)
}
