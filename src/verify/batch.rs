//! Sequential batch verification.

use crate::verify::data_types::{ClaimedToken, VerificationResult};
use crate::verify::verifier::Verifier;
use serde::{Deserialize, Serialize};
use tracing::info;

/// One identity to verify in a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchEntry {
    /// Stake identity.
    pub identity: String,
    /// Optional payment address for providers that accept one.
    #[serde(default)]
    pub address_hint: Option<String>,
    /// Tokens the identity claims.
    #[serde(default)]
    pub claimed_tokens: Vec<ClaimedToken>,
}

/// Outcome for one batch entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchItem {
    /// Identity that was verified.
    pub identity: String,
    /// Its result.
    pub result: VerificationResult,
}

/// Outcome of a whole batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    /// Results in input order.
    pub results: Vec<BatchItem>,
    /// Entries processed.
    pub total_identities: usize,
    /// Entries whose claims matched.
    pub verified_count: usize,
}

impl Verifier {
    /// Verify `entries` one after another with a pause between calls.
    ///
    /// A failing entry is recorded and the batch moves on.
    pub async fn verify_batch(&self, entries: &[BatchEntry]) -> BatchReport {
        let mut report = BatchReport {
            results: Vec::with_capacity(entries.len()),
            total_identities: entries.len(),
            verified_count: 0,
        };

        for (i, entry) in entries.iter().enumerate() {
            if i > 0 && !self.batch_delay.is_zero() {
                tokio::time::sleep(self.batch_delay).await;
            }

            let result = self
                .verify(
                    &entry.identity,
                    &entry.claimed_tokens,
                    entry.address_hint.as_deref(),
                )
                .await;
            if result.verified {
                report.verified_count += 1;
            }
            report.results.push(BatchItem {
                identity: entry.identity.clone(),
                result,
            });
        }

        info!(
            "Batch complete: {}/{} identities verified",
            report.verified_count, report.total_identities
        );
        report
    }
}
