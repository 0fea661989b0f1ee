//! Verifier event system.
//!
//! Subsystems that depend on ownership (leaderboards, reward accrual)
//! subscribe here instead of polling the ledger.

use crate::verify::Source;
use tokio::sync::broadcast;

/// Events emitted by the verifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifierEvent {
    /// Claims matched on-chain holdings.
    Verified {
        /// Identity that was verified.
        identity: String,
        /// Provider that answered.
        source: Source,
        /// Tokens held.
        token_count: usize,
    },

    /// Claims and holdings disagree.
    Mismatch {
        /// Identity that was checked.
        identity: String,
        /// Claimed but not held.
        false_positives: usize,
        /// Held but not claimed.
        missing: usize,
    },

    /// One provider failed; the next one will be tried.
    ProviderFailed {
        /// Provider name.
        provider: &'static str,
        /// Error message.
        message: String,
    },

    /// Every provider failed for an identity.
    AllProvidersFailed {
        /// Identity that was checked.
        identity: String,
    },

    /// Ownership table updated for a verified identity.
    LedgerSynced {
        /// Identity that now owns its verified tokens.
        identity: String,
        /// Records transferred to it.
        updated: usize,
        /// Records released by it.
        cleared: usize,
    },

    /// Verified tokens with no ledger record.
    DataIntegrityWarning {
        /// Identity that holds them.
        identity: String,
        /// Token numbers missing from the table.
        token_numbers: Vec<u32>,
    },

    /// Verification passed but the ledger write did not.
    PersistenceFailed {
        /// Identity whose sync failed.
        identity: String,
        /// Error message.
        message: String,
    },
}

/// Channel for receiving verifier events.
pub type VerifierEventsChannel = broadcast::Receiver<VerifierEvent>;

/// Sender for verifier events.
pub type VerifierEventsSender = broadcast::Sender<VerifierEvent>;

/// Create a new event channel pair.
#[must_use]
pub fn create_event_channel() -> (VerifierEventsSender, VerifierEventsChannel) {
    broadcast::channel(256)
}
