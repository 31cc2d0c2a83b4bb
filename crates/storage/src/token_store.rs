// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persistent capability records (spec §4.3 "Token Store", C3).
//!
//! One JSONL file, one line per live record, rewritten wholesale on every
//! mutation — capability churn is low-volume compared to the event log, so
//! this mirrors the daemon's small rotated metrics files rather than the
//! WAL's append-and-replay discipline.

use kernel_core::{Capability, TenantId, TokenHash};
use std::collections::{HashMap, HashSet};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TokenStoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Persistent map `token_hash → capability_record` with a secondary
/// `tenant_id → set<token_hash>` index, kept in memory and mirrored to disk.
pub struct TokenStore {
    path: PathBuf,
    records: HashMap<TokenHash, Capability>,
    by_tenant: HashMap<TenantId, HashSet<TokenHash>>,
}

impl TokenStore {
    /// Open (or create) the store, loading any persisted records.
    pub fn open(path: &Path) -> Result<Self, TokenStoreError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut store =
            Self { path: path.to_owned(), records: HashMap::new(), by_tenant: HashMap::new() };
        if path.exists() {
            let contents = fs::read_to_string(path)?;
            for line in contents.lines().filter(|l| !l.trim().is_empty()) {
                let cap: Capability = serde_json::from_str(line)?;
                store.index(cap);
            }
        }
        Ok(store)
    }

    fn index(&mut self, cap: Capability) {
        self.by_tenant.entry(cap.tenant_id.clone()).or_default().insert(cap.token_hash);
        self.records.insert(cap.token_hash, cap);
    }

    fn persist_all(&self) -> Result<(), TokenStoreError> {
        let mut file = OpenOptions::new().create(true).write(true).truncate(true).open(&self.path)?;
        for cap in self.records.values() {
            serde_json::to_writer(&file, cap)?;
            file.write_all(b"\n")?;
        }
        file.sync_all()?;
        Ok(())
    }

    /// Insert or overwrite a record (spec §4.3 `Store`).
    pub fn store(&mut self, cap: Capability) -> Result<(), TokenStoreError> {
        self.index(cap);
        self.persist_all()
    }

    /// Look up a record by hash (spec §4.3 `Get`).
    pub fn get(&self, token_hash: &TokenHash) -> Option<&Capability> {
        self.records.get(token_hash)
    }

    /// Remove a record (spec §4.3 `Delete`). Idempotent.
    pub fn delete(&mut self, token_hash: &TokenHash) -> Result<(), TokenStoreError> {
        if let Some(cap) = self.records.remove(token_hash) {
            if let Some(set) = self.by_tenant.get_mut(&cap.tenant_id) {
                set.remove(token_hash);
            }
            self.persist_all()?;
        }
        Ok(())
    }

    /// All currently non-expired records, for rebuilding the capability
    /// manager's in-memory table on startup (spec §4.3 `RestoreAll`).
    pub fn restore_all(&self, now_epoch_ms: u64) -> Vec<Capability> {
        self.records.values().filter(|c| !c.is_expired(now_epoch_ms)).cloned().collect()
    }

    /// Remove expired records from disk (spec §4.3 `CleanupExpired`).
    pub fn cleanup_expired(&mut self, now_epoch_ms: u64) -> Result<usize, TokenStoreError> {
        let expired: Vec<TokenHash> =
            self.records.values().filter(|c| c.is_expired(now_epoch_ms)).map(|c| c.token_hash).collect();
        let count = expired.len();
        for hash in &expired {
            if let Some(cap) = self.records.remove(hash) {
                if let Some(set) = self.by_tenant.get_mut(&cap.tenant_id) {
                    set.remove(hash);
                }
            }
        }
        if count > 0 {
            self.persist_all()?;
        }
        Ok(count)
    }

    pub fn tokens_for_tenant(&self, tenant_id: &TenantId) -> Vec<TokenHash> {
        self.by_tenant.get(tenant_id).map(|s| s.iter().copied().collect()).unwrap_or_default()
    }
}

#[cfg(test)]
#[path = "token_store_tests.rs"]
mod tests;
