//! Applies verified holdings to the ownership table.
//!
//! The sync runs in two phases. Every read happens first, so any failure
//! while loading state aborts before a single record is touched. Writes are
//! single-record patches; if one fails the sync stops, recounts every
//! aggregate it may have touched, and reports a persistence error. A later
//! re-run converges on the same end state, since each step only moves
//! records towards the verified set.

use super::{LedgerStore, OwnerAggregate, RecordPatch};
use crate::error::Result;
use crate::verify::VerifiedToken;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What a sync changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    /// Records transferred to the identity.
    pub updated: usize,
    /// Verified records the identity already owned.
    pub unchanged: usize,
    /// Verified token numbers with no ledger record.
    pub unresolved: Vec<u32>,
    /// Records the identity no longer holds.
    pub cleared: usize,
    /// The identity's recomputed token count.
    pub new_aggregate: u64,
    /// Previous owners whose aggregates were recomputed.
    pub affected_owners: Vec<String>,
}

/// Reconciles the ownership table with on-chain truth.
#[derive(Clone)]
pub struct LedgerSync {
    store: Arc<dyn LedgerStore>,
}

impl LedgerSync {
    /// Create a sync over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Make the ledger reflect that `identity` holds exactly `verified`.
    ///
    /// # Errors
    ///
    /// Returns the first persistence error; no further record writes are
    /// attempted. Aggregates touched by the sync are still recounted so a
    /// re-run converges.
    pub async fn apply(&self, identity: &str, verified: &[VerifiedToken]) -> Result<SyncReport> {
        let mut report = SyncReport::default();

        // Phase 1: reads.
        let owned = self.store.records_owned_by(identity).await?;
        let verified_numbers: BTreeSet<u32> =
            verified.iter().map(|t| t.sequence_number).collect();

        let mut transfers = Vec::new();
        for &token_number in &verified_numbers {
            match self.store.record(token_number).await? {
                None => {
                    warn!(
                        "Data integrity: verified token {} for {} has no ledger record",
                        token_number, identity
                    );
                    report.unresolved.push(token_number);
                }
                Some(record) if record.owner_identity.as_deref() == Some(identity) => {
                    report.unchanged += 1;
                }
                Some(record) => transfers.push((token_number, record.owner_identity)),
            }
        }

        let releases: Vec<u32> = owned
            .iter()
            .map(|r| r.token_number)
            .filter(|n| !verified_numbers.contains(n))
            .collect();

        // Previous owners are fixed before the first write so a failed sync
        // can still recount every aggregate it may have disturbed.
        let affected: BTreeSet<String> = transfers
            .iter()
            .filter_map(|(_, previous)| previous.clone())
            .filter(|previous| previous != identity)
            .collect();

        // Phase 2: single-record writes.
        if let Err(e) = self
            .write(identity, &transfers, &releases, &mut report)
            .await
        {
            warn!(
                "Ledger sync for {} aborted after {} updates and {} clears: {}",
                identity, report.updated, report.cleared, e
            );
            for owner in std::iter::once(identity).chain(affected.iter().map(String::as_str)) {
                if let Err(recount_error) = self.recount(owner).await {
                    warn!("Failed to recount aggregate for {owner}: {recount_error}");
                }
            }
            return Err(e);
        }

        // Phase 3: aggregates from full counts.
        report.new_aggregate = self.recount(identity).await?;
        for owner in &affected {
            self.recount(owner).await?;
        }
        report.affected_owners = affected.into_iter().collect();

        info!(
            "Ledger sync for {}: {} updated, {} cleared, {} unresolved, {} owned",
            identity,
            report.updated,
            report.cleared,
            report.unresolved.len(),
            report.new_aggregate
        );
        Ok(report)
    }

    async fn write(
        &self,
        identity: &str,
        transfers: &[(u32, Option<String>)],
        releases: &[u32],
        report: &mut SyncReport,
    ) -> Result<()> {
        let now = Utc::now();
        for (token_number, previous) in transfers {
            self.store
                .patch(
                    *token_number,
                    RecordPatch::Assign {
                        owner: identity.to_string(),
                        at: now,
                    },
                )
                .await?;
            if let Some(previous) = previous {
                debug!("Token {token_number} moved from {previous} to {identity}");
            }
            report.updated += 1;
        }

        for &token_number in releases {
            self.store
                .patch(token_number, RecordPatch::Clear { at: now })
                .await?;
            report.cleared += 1;
        }
        Ok(())
    }

    async fn recount(&self, identity: &str) -> Result<u64> {
        let token_count = self.store.count_owned_by(identity).await?;
        self.store
            .put_aggregate(OwnerAggregate {
                identity: identity.to_string(),
                token_count,
            })
            .await?;
        Ok(token_count)
    }
}
