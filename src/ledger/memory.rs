//! In-process ledger store.
//!
//! Backs the CLI and the tests. Each record patch happens under a single
//! write lock, which gives the single-record atomicity the sync relies on.

use super::{AuditLog, AuditLogEntry, LedgerStore, OwnerAggregate, OwnershipRecord, RecordPatch};
use crate::error::{Error, Result};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::debug;

/// Serializable image of a [`MemoryStore`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerSnapshot {
    /// Every ownership record.
    #[serde(default)]
    pub records: Vec<OwnershipRecord>,
    /// Owner aggregates.
    #[serde(default)]
    pub aggregates: Vec<OwnerAggregate>,
    /// Audit trail, oldest first.
    #[serde(default)]
    pub audit: Vec<AuditLogEntry>,
}

impl LedgerSnapshot {
    /// Load a snapshot from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Save the snapshot as pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn to_file(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// Ledger and audit log held in memory.
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<BTreeMap<u32, OwnershipRecord>>,
    aggregates: RwLock<HashMap<String, OwnerAggregate>>,
    audit: Mutex<Vec<AuditLogEntry>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with the token universe.
    #[must_use]
    pub fn with_records(records: impl IntoIterator<Item = OwnershipRecord>) -> Self {
        let store = Self::new();
        {
            let mut table = store.records.write();
            for record in records {
                table.insert(record.token_number, record);
            }
        }
        store
    }

    /// Rebuild a store from a snapshot.
    #[must_use]
    pub fn from_snapshot(snapshot: LedgerSnapshot) -> Self {
        let store = Self::with_records(snapshot.records);
        store.aggregates.write().extend(
            snapshot
                .aggregates
                .into_iter()
                .map(|a| (a.identity.clone(), a)),
        );
        *store.audit.lock() = snapshot.audit;
        store
    }

    /// Capture the current contents.
    #[must_use]
    pub fn snapshot(&self) -> LedgerSnapshot {
        let mut aggregates: Vec<_> = self.aggregates.read().values().cloned().collect();
        aggregates.sort_by(|a, b| a.identity.cmp(&b.identity));
        LedgerSnapshot {
            records: self.records.read().values().cloned().collect(),
            aggregates,
            audit: self.audit.lock().clone(),
        }
    }

    /// Record for `token_number`, read synchronously.
    #[must_use]
    pub fn get(&self, token_number: u32) -> Option<OwnershipRecord> {
        self.records.read().get(&token_number).cloned()
    }

    /// Set the accrued value of a record, as the reward subsystem would.
    pub fn set_accrued(&self, token_number: u32, value: f64) {
        if let Some(record) = self.records.write().get_mut(&token_number) {
            record.accrued_value = value;
        }
    }

    /// Stored aggregate for `identity`, read synchronously.
    #[must_use]
    pub fn aggregate_of(&self, identity: &str) -> Option<OwnerAggregate> {
        self.aggregates.read().get(identity).cloned()
    }

    /// All audit entries, oldest first.
    #[must_use]
    pub fn audit_entries(&self) -> Vec<AuditLogEntry> {
        self.audit.lock().clone()
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn records_owned_by(&self, identity: &str) -> Result<Vec<OwnershipRecord>> {
        Ok(self
            .records
            .read()
            .values()
            .filter(|r| r.owner_identity.as_deref() == Some(identity))
            .cloned()
            .collect())
    }

    async fn record(&self, token_number: u32) -> Result<Option<OwnershipRecord>> {
        Ok(self.get(token_number))
    }

    async fn patch(&self, token_number: u32, patch: RecordPatch) -> Result<()> {
        let mut records = self.records.write();
        let record = records
            .get_mut(&token_number)
            .ok_or_else(|| Error::Persistence(format!("no record for token {token_number}")))?;
        patch.apply_to(record);
        debug!("Patched token {token_number}: {patch:?}");
        Ok(())
    }

    async fn count_owned_by(&self, identity: &str) -> Result<u64> {
        let count = self
            .records
            .read()
            .values()
            .filter(|r| r.owner_identity.as_deref() == Some(identity))
            .count();
        Ok(count as u64)
    }

    async fn aggregate(&self, identity: &str) -> Result<Option<OwnerAggregate>> {
        Ok(self.aggregate_of(identity))
    }

    async fn put_aggregate(&self, aggregate: OwnerAggregate) -> Result<()> {
        self.aggregates
            .write()
            .insert(aggregate.identity.clone(), aggregate);
        Ok(())
    }
}

#[async_trait]
impl AuditLog for MemoryStore {
    async fn append(&self, entry: AuditLogEntry) -> Result<()> {
        self.audit.lock().push(entry);
        Ok(())
    }

    async fn latest(&self, identity: &str) -> Result<Option<AuditLogEntry>> {
        Ok(self
            .audit
            .lock()
            .iter()
            .rev()
            .find(|e| e.identity == identity)
            .cloned())
    }
}
