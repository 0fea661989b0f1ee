//! Ownership ledger.
//!
//! The ledger is owned by an external store; this module defines the store
//! seams ([`LedgerStore`], [`AuditLog`]), the record types that cross them,
//! and [`LedgerSync`], which applies verified on-chain truth to the table.
//!
//! Invariants the sync maintains:
//! - a token has at most one owner;
//! - `accrued_value` is zeroed whenever a token changes owner;
//! - an owner's aggregate always equals a full count of their records.

mod memory;
mod sync;

pub use memory::{LedgerSnapshot, MemoryStore};
pub use sync::{LedgerSync, SyncReport};

use crate::error::Result;
use crate::verify::{Source, VerificationResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Ownership of one token in the fixed collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnershipRecord {
    /// Sequence number; the table's primary key.
    pub token_number: u32,
    /// Canonical policy + asset identifier.
    pub token_id: String,
    /// Current owner, if any.
    #[serde(default)]
    pub owner_identity: Option<String>,
    /// Rewards accrued under the current owner.
    #[serde(default)]
    pub accrued_value: f64,
    /// Last modification.
    pub last_updated: DateTime<Utc>,
}

/// Single-record update applied atomically by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordPatch {
    /// Give the token to `owner` and zero its accrued value.
    Assign {
        /// New owner.
        owner: String,
        /// Modification time.
        at: DateTime<Utc>,
    },
    /// Remove the owner.
    Clear {
        /// Modification time.
        at: DateTime<Utc>,
    },
}

impl RecordPatch {
    /// Apply the patch to a record in place.
    pub fn apply_to(&self, record: &mut OwnershipRecord) {
        match self {
            Self::Assign { owner, at } => {
                record.owner_identity = Some(owner.clone());
                record.accrued_value = 0.0;
                record.last_updated = *at;
            }
            Self::Clear { at } => {
                record.owner_identity = None;
                record.last_updated = *at;
            }
        }
    }
}

/// Cached per-owner token count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerAggregate {
    /// Owner identity.
    pub identity: String,
    /// Records currently owned.
    pub token_count: u64,
}

/// One verification attempt, as recorded for audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogEntry {
    /// Identity that was verified.
    pub identity: String,
    /// Whether claims matched holdings.
    pub verified: bool,
    /// Provider that answered, if any did.
    #[serde(default)]
    pub source: Option<Source>,
    /// Tokens claimed.
    pub claimed_count: usize,
    /// Tokens reported on-chain.
    pub verified_count: usize,
    /// When the result was produced.
    pub timestamp: DateTime<Utc>,
}

impl AuditLogEntry {
    /// Audit record for a verification result.
    #[must_use]
    pub fn from_result(identity: &str, result: &VerificationResult) -> Self {
        Self {
            identity: identity.to_string(),
            verified: result.verified,
            source: result.source,
            claimed_count: result.claimed_count,
            verified_count: result.verified_count,
            timestamp: result.timestamp,
        }
    }
}

/// Indexed access to the ownership table and owner aggregates.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Records whose owner is `identity`.
    async fn records_owned_by(&self, identity: &str) -> Result<Vec<OwnershipRecord>>;

    /// Record for one token number.
    async fn record(&self, token_number: u32) -> Result<Option<OwnershipRecord>>;

    /// Atomically update one record.
    async fn patch(&self, token_number: u32, patch: RecordPatch) -> Result<()>;

    /// Full count of records owned by `identity`.
    async fn count_owned_by(&self, identity: &str) -> Result<u64>;

    /// Stored aggregate for `identity`.
    async fn aggregate(&self, identity: &str) -> Result<Option<OwnerAggregate>>;

    /// Overwrite the aggregate for its identity.
    async fn put_aggregate(&self, aggregate: OwnerAggregate) -> Result<()>;
}

/// Append-only verification audit trail.
#[async_trait]
pub trait AuditLog: Send + Sync {
    /// Append an entry.
    async fn append(&self, entry: AuditLogEntry) -> Result<()>;

    /// Most recent entry for `identity`.
    async fn latest(&self, identity: &str) -> Result<Option<AuditLogEntry>>;
}
