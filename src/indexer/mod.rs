//! Blockchain indexer providers.
//!
//! Each provider talks to one third-party indexer, performs its own
//! request shaping and payload decoding, and hands back the holdings of the
//! Mek policy as a list of [`VerifiedToken`]s. Callers only ever see that
//! common shape.
//!
//! | Provider | Identity form | Auth | Payload |
//! |----------|---------------|------|---------|
//! | [`BlockfrostProvider`] | bech32 stake, paged addresses, then UTXOs | `project_id` header | `amount[].unit` = policy + hex name |
//! | [`KoiosProvider`] | bech32 stake in a POST body | none | `asset_list` per stake address |
//!
//! Providers do not enforce their own deadline; the verifier wraps every
//! [`IndexerProvider::fetch`] in [`tokio::time::timeout`] using
//! [`IndexerProvider::timeout`].

pub mod asset;
mod blockfrost;
mod koios;

pub use asset::MEK_POLICY_ID;
pub use blockfrost::{BlockfrostConfig, BlockfrostProvider, DEFAULT_BLOCKFROST_URL};
pub use koios::{KoiosConfig, KoiosProvider, DEFAULT_KOIOS_URL};

use crate::error::Result;
use crate::verify::{Source, VerifiedToken};
use async_trait::async_trait;
use std::time::Duration;

/// Default deadline for one provider query (3 minutes).
///
/// Large wallets page through hundreds of UTXOs.
pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(180);

/// A source of on-chain holdings.
#[async_trait]
pub trait IndexerProvider: Send + Sync {
    /// Short name used in logs and error messages.
    fn name(&self) -> &'static str;

    /// Which slot this provider fills in a result.
    fn source(&self) -> Source;

    /// Deadline the verifier applies to [`Self::fetch`].
    fn timeout(&self) -> Duration {
        DEFAULT_PROVIDER_TIMEOUT
    }

    /// Whether a payment address hint should be passed to [`Self::fetch`].
    fn accepts_address_hint(&self) -> bool {
        false
    }

    /// Holdings of the collection for `identity`.
    ///
    /// # Errors
    ///
    /// Returns an error if the indexer is unreachable, unauthenticated, or
    /// answers with something that cannot be decoded.
    async fn fetch(&self, identity: &str, address_hint: Option<&str>)
        -> Result<Vec<VerifiedToken>>;
}
