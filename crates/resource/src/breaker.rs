// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-`{tenant, service}` circuit breaker (spec §4.8): `closed → open →
//! half_open → closed`. Callers check [`CircuitBreaker::check`] before
//! invoking a worker and report the outcome via `record_success`/
//! `record_failure`; transitions are returned so the caller can append the
//! `circuit_breaker_opened`/`circuit_breaker_closed` events (this crate
//! does not own an event store).

use kernel_core::{Clock, ServiceRef};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Clone, Copy)]
pub struct BreakerConfig {
    /// Consecutive failures within `closed` before tripping to `open`.
    pub failure_threshold: u32,
    /// How long `open` waits before allowing a single `half_open` probe.
    pub reset_after: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self { failure_threshold: 5, reset_after: Duration::from_secs(30) }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerTransition {
    Opened,
    Closed,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("circuit open for {0}")]
pub struct BreakerOpen(pub ServiceRef);

struct Entry {
    state: BreakerState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
}

impl Entry {
    fn new() -> Self {
        Self { state: BreakerState::Closed, consecutive_failures: 0, opened_at: None }
    }
}

pub struct CircuitBreaker<C: Clock> {
    config: BreakerConfig,
    clock: C,
    entries: RwLock<HashMap<ServiceRef, Entry>>,
}

impl<C: Clock> CircuitBreaker<C> {
    pub fn new(config: BreakerConfig, clock: C) -> Self {
        Self { config, clock, entries: RwLock::new(HashMap::new()) }
    }

    /// Callers check this before invoking the worker; an `open` breaker
    /// fails fast. `open → half_open` happens here once `reset_after` has
    /// elapsed, admitting exactly one probe call.
    pub fn check(&self, service_ref: &ServiceRef) -> Result<(), BreakerOpen> {
        let mut entries = self.entries.write();
        let entry = entries.entry(service_ref.clone()).or_insert_with(Entry::new);
        if entry.state == BreakerState::Open {
            let can_probe = entry
                .opened_at
                .map(|opened_at| self.clock.now().duration_since(opened_at) >= self.config.reset_after)
                .unwrap_or(false);
            if can_probe {
                entry.state = BreakerState::HalfOpen;
            } else {
                return Err(BreakerOpen(service_ref.clone()));
            }
        }
        Ok(())
    }

    /// `half_open → closed` on the probe's success; otherwise just resets
    /// the consecutive-failure counter.
    pub fn record_success(&self, service_ref: &ServiceRef) -> Option<BreakerTransition> {
        let mut entries = self.entries.write();
        let entry = entries.entry(service_ref.clone()).or_insert_with(Entry::new);
        entry.consecutive_failures = 0;
        if entry.state == BreakerState::HalfOpen {
            entry.state = BreakerState::Closed;
            entry.opened_at = None;
            return Some(BreakerTransition::Closed);
        }
        None
    }

    /// `half_open → open` on any probe failure; `closed → open` after
    /// `failure_threshold` consecutive failures.
    pub fn record_failure(&self, service_ref: &ServiceRef) -> Option<BreakerTransition> {
        let mut entries = self.entries.write();
        let entry = entries.entry(service_ref.clone()).or_insert_with(Entry::new);
        match entry.state {
            BreakerState::HalfOpen => {
                entry.state = BreakerState::Open;
                entry.opened_at = Some(self.clock.now());
                Some(BreakerTransition::Opened)
            }
            BreakerState::Closed => {
                entry.consecutive_failures += 1;
                if entry.consecutive_failures >= self.config.failure_threshold {
                    entry.state = BreakerState::Open;
                    entry.opened_at = Some(self.clock.now());
                    Some(BreakerTransition::Opened)
                } else {
                    None
                }
            }
            BreakerState::Open => None,
        }
    }

    pub fn state(&self, service_ref: &ServiceRef) -> BreakerState {
        self.entries.read().get(service_ref).map(|e| e.state).unwrap_or(BreakerState::Closed)
    }
}

#[cfg(test)]
#[path = "breaker_tests.rs"]
mod tests;
