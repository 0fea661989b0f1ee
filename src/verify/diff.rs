//! Claimed-versus-verified reconciliation.
//!
//! Identifiers are compared by exact string equality on the canonical
//! token id. On-chain holdings always win.

use crate::verify::data_types::{ClaimedToken, VerifiedToken};
use std::collections::HashSet;

/// Differences between what a client claims and what an indexer reports.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Discrepancies {
    /// Claimed tokens the indexer did not report.
    pub false_positives: Vec<ClaimedToken>,
    /// Reported tokens the client did not claim.
    pub missing_tokens: Vec<VerifiedToken>,
}

impl Discrepancies {
    /// True when claims and holdings agree.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.false_positives.is_empty() && self.missing_tokens.is_empty()
    }
}

/// Compute `claimed \ verified` and `verified \ claimed` by token id.
///
/// Input order is preserved in both outputs.
#[must_use]
pub fn diff(claimed: &[ClaimedToken], verified: &[VerifiedToken]) -> Discrepancies {
    let verified_ids: HashSet<&str> = verified.iter().map(|t| t.token_id.as_str()).collect();
    let claimed_ids: HashSet<&str> = claimed.iter().map(|t| t.token_id.as_str()).collect();

    Discrepancies {
        false_positives: claimed
            .iter()
            .filter(|t| !verified_ids.contains(t.token_id.as_str()))
            .cloned()
            .collect(),
        missing_tokens: verified
            .iter()
            .filter(|t| !claimed_ids.contains(t.token_id.as_str()))
            .cloned()
            .collect(),
    }
}
