//! Token and result types shared by the verification pipeline.

use crate::ledger::SyncReport;
use crate::verify::diff::diff;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// A token the client says it owns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimedToken {
    /// Canonical identifier: policy id followed by the hex asset name.
    pub token_id: String,
    /// Human-readable asset name.
    pub token_label: String,
    /// Number within the collection.
    pub sequence_number: u32,
}

/// A token an indexer reports for an identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedToken {
    /// Canonical identifier: policy id followed by the hex asset name.
    pub token_id: String,
    /// Human-readable asset name.
    pub token_label: String,
    /// Number within the collection.
    pub sequence_number: u32,
    /// Units held (1 for a well-formed NFT).
    pub quantity: u64,
}

/// Which indexer produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// Primary indexer (Blockfrost).
    Primary,
    /// Fallback indexer (Koios).
    Secondary,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primary => f.write_str("primary"),
            Self::Secondary => f.write_str("secondary"),
        }
    }
}

/// Why a result has `success == false`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Rejected before any work was done.
    RateLimited,
    /// Every provider failed or timed out.
    ProviderUnavailable,
    /// Ownership was verified on-chain but the ledger could not be updated.
    PersistenceFailure,
}

/// Outcome of one verification call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResult {
    /// A provider answered and every follow-up step completed.
    pub success: bool,
    /// Claims and on-chain holdings match exactly.
    pub verified: bool,
    /// Provider that supplied the holdings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<Source>,
    /// When the result was produced.
    pub timestamp: DateTime<Utc>,
    /// Number of claimed tokens.
    pub claimed_count: usize,
    /// Number of tokens the provider reported.
    pub verified_count: usize,
    /// Claimed but not held.
    #[serde(default)]
    pub false_positives: Vec<ClaimedToken>,
    /// Held but not claimed.
    #[serde(default)]
    pub missing_tokens: Vec<VerifiedToken>,
    /// Everything the provider reported.
    #[serde(default)]
    pub verified_tokens: Vec<VerifiedToken>,
    /// Human-readable failure description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Machine-readable failure class.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    /// How long a rate-limited caller should wait.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after_ms: Option<u64>,
    /// Ledger changes applied for a verified identity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ledger: Option<SyncReport>,
}

impl VerificationResult {
    /// Compare claims against a provider answer.
    #[must_use]
    pub fn reconciled(
        source: Source,
        claimed: &[ClaimedToken],
        verified_tokens: Vec<VerifiedToken>,
    ) -> Self {
        let discrepancies = diff(claimed, &verified_tokens);
        Self {
            success: true,
            verified: discrepancies.is_empty(),
            source: Some(source),
            timestamp: Utc::now(),
            claimed_count: claimed.len(),
            verified_count: verified_tokens.len(),
            false_positives: discrepancies.false_positives,
            missing_tokens: discrepancies.missing_tokens,
            verified_tokens,
            error: None,
            error_kind: None,
            retry_after_ms: None,
            ledger: None,
        }
    }

    /// Rejection issued by the rate limiter.
    #[must_use]
    pub fn rate_limited(claimed_count: usize, retry_after: Duration) -> Self {
        Self {
            error: Some("rate limited".to_string()),
            error_kind: Some(ErrorKind::RateLimited),
            retry_after_ms: Some(u64::try_from(retry_after.as_millis()).unwrap_or(u64::MAX)),
            ..Self::failed(claimed_count)
        }
    }

    /// No provider produced an answer.
    #[must_use]
    pub fn unavailable(claimed_count: usize, message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            error_kind: Some(ErrorKind::ProviderUnavailable),
            ..Self::failed(claimed_count)
        }
    }

    /// Mark a verified result whose ledger sync failed.
    ///
    /// `verified` stays true: the on-chain check passed, only the write did not.
    #[must_use]
    pub fn persistence_failed(self, cause: impl fmt::Display) -> Self {
        Self {
            success: false,
            error: Some(format!(
                "verification succeeded but persistence failed: {cause}"
            )),
            error_kind: Some(ErrorKind::PersistenceFailure),
            ..self
        }
    }

    fn failed(claimed_count: usize) -> Self {
        Self {
            success: false,
            verified: false,
            source: None,
            timestamp: Utc::now(),
            claimed_count,
            verified_count: 0,
            false_positives: Vec::new(),
            missing_tokens: Vec::new(),
            verified_tokens: Vec::new(),
            error: None,
            error_kind: None,
            retry_after_ms: None,
            ledger: None,
        }
    }
}

/// Summary of the last known verification for an identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationStatus {
    /// A verification happened within the cache TTL.
    pub has_recent_verification: bool,
    /// When it happened.
    pub last_verified: Option<DateTime<Utc>>,
    /// Whether it matched.
    pub verified: bool,
    /// Which provider answered.
    pub source: Option<Source>,
    /// Served from the in-process cache rather than the audit log.
    pub cached: bool,
}

impl VerificationStatus {
    /// No verification on record.
    #[must_use]
    pub fn unknown() -> Self {
        Self {
            has_recent_verification: false,
            last_verified: None,
            verified: false,
            source: None,
            cached: false,
        }
    }
}
