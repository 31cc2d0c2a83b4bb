// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable, append-only event log (spec §4.1 "Event Store", C1).
//!
//! Backed by [`crate::wal::Wal`] for persistence and an in-memory
//! `BTreeMap<EventId, EventRecord>` for `Stream`/`Filter` lookups — the
//! index is rebuilt from the WAL on open, never written separately.

use crate::wal::{Wal, WalError};
use kernel_core::{Clock, Durability, Event, EventId, EventRecord, ServiceId, TenantId};
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Wal(#[from] WalError),
}

/// Predicate for `Stream`/`Filter` (spec §4.1). `None` fields match anything.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub tenant_id: Option<TenantId>,
    pub service_id: Option<ServiceId>,
    pub event_type: Option<&'static str>,
}

impl EventFilter {
    pub fn matches(&self, record: &EventRecord) -> bool {
        if let Some(tenant_id) = &self.tenant_id {
            if record.tenant_id.as_ref() != Some(tenant_id) {
                return false;
            }
        }
        if let Some(service_id) = &self.service_id {
            match record.event.subject() {
                Some((_, sid)) if sid == service_id => {}
                _ => return false,
            }
        }
        if let Some(event_type) = self.event_type {
            if record.event.event_type() != event_type {
                return false;
            }
        }
        true
    }
}

/// Append-only, replayable event log (spec I1: ids are strictly increasing,
/// consecutive, starting at 1).
pub struct EventStore<C: Clock> {
    wal: Mutex<Wal>,
    index: RwLock<BTreeMap<EventId, EventRecord>>,
    clock: C,
    opened_at: Instant,
    ts_seq: AtomicU64,
}

impl<C: Clock> EventStore<C> {
    /// Open the log at `path`, replaying it into the in-memory index.
    pub fn open(path: &Path, clock: C) -> Result<Self, StoreError> {
        let wal = Wal::open(path, 0)?;
        let mut index = BTreeMap::new();
        for entry in wal.entries_after(0)? {
            index.insert(entry.id, entry.record);
        }
        Ok(Self {
            wal: Mutex::new(wal),
            index: RwLock::new(index),
            clock,
            opened_at: Instant::now(),
            ts_seq: AtomicU64::new(0),
        })
    }

    /// Assign the next id and append `event`. Durable event classes are
    /// flushed before returning; best-effort classes are buffered and may
    /// be flushed later by [`Self::flush`] or the periodic flusher (spec
    /// §4.1 "Append").
    pub fn append(
        &self,
        tenant_id: Option<TenantId>,
        causation_id: Option<EventId>,
        event: Event,
    ) -> Result<EventId, StoreError> {
        let durability = event.durability();
        let monotonic_ts = self.opened_at.elapsed().as_nanos() as u64 + self.ts_seq.fetch_add(1, Ordering::Relaxed);
        let record = EventRecord {
            id: 0,
            wall_clock_epoch_ms: self.clock.epoch_ms(),
            monotonic_ts,
            tenant_id,
            causation_id,
            event,
            extra: Default::default(),
        };

        let mut wal = self.wal.lock();
        let id = wal.append(record.clone())?;
        if durability == Durability::Durable {
            wal.flush()?;
        }
        drop(wal);

        let mut stamped = record;
        stamped.id = id;
        self.index.write().insert(id, stamped);
        Ok(id)
    }

    /// Ordered events matching `filter`, starting after `since_id`, capped
    /// at `limit` (spec §4.1 "Stream"). `Filter` is this materialised.
    pub fn stream(&self, filter: &EventFilter, since_id: EventId, limit: usize) -> Vec<EventRecord> {
        self.index
            .read()
            .range((since_id + 1)..)
            .map(|(_, r)| r.clone())
            .filter(|r| filter.matches(r))
            .take(if limit == 0 { usize::MAX } else { limit })
            .collect()
    }

    pub fn last_id(&self) -> EventId {
        self.index.read().keys().next_back().copied().unwrap_or(0)
    }

    /// Force durability of any pending best-effort appends (spec §4.1
    /// `Flush`, called by graceful shutdown).
    pub fn flush(&self) -> Result<(), StoreError> {
        self.wal.lock().flush()?;
        Ok(())
    }

    /// Test-only total wipe (spec §4.1 `Reset`).
    pub fn reset(&self) -> Result<(), StoreError> {
        self.wal.lock().reset()?;
        self.index.write().clear();
        Ok(())
    }
}

#[cfg(test)]
#[path = "event_store_tests.rs"]
mod tests;
