//! # mek-verify
//!
//! Ownership verification and reconciliation for the Mek NFT collection.
//!
//! A client claims a set of tokens for a stake identity. The verifier asks
//! blockchain indexers what that identity actually holds, reports the
//! differences, and when the claim is correct moves every verified token to
//! the identity in the ownership ledger.
//!
//! ## Features
//!
//! - **Provider fallback**: Blockfrost first, Koios second, each bounded by a timeout
//! - **Rate limiting**: fixed window per identity
//! - **Result cache**: TTL cache that also remembers failures
//! - **Ledger sync**: idempotent reconciliation of the ownership table
//! - **Events**: broadcast notifications for dependent subsystems
//!
//! ## Example
//!
//! ```rust,ignore
//! use mek_verify::{VerifierBuilder, VerifierConfig};
//!
//! let verifier = VerifierBuilder::new(VerifierConfig::default()).build()?;
//! let result = verifier.verify("stake1u...", &claims, None).await;
//! ```

pub mod config;
pub mod error;
pub mod event;
pub mod indexer;
pub mod ledger;
pub mod verify;

mod builder;

pub use builder::VerifierBuilder;
pub use config::VerifierConfig;
pub use error::{Error, Result};
pub use event::{VerifierEvent, VerifierEventsChannel};
pub use ledger::{LedgerSync, MemoryStore, SyncReport};
pub use verify::{
    BatchEntry, BatchReport, ClaimedToken, ErrorKind, Source, VerificationResult,
    VerificationStatus, VerifiedToken, Verifier,
};
