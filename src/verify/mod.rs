//! Ownership verification pipeline.
//!
//! A verification call checks what an identity claims to own against what an
//! indexer reports on-chain, then makes the ownership ledger agree with the
//! chain when the two match.
//!
//! # Architecture
//!
//! ```text
//! verify(identity, claims)
//!        │
//!        ▼
//! ┌─────────────────────┐
//! │ Rate limiter        │──── REJECTED ──▶ rate limited (not cached)
//! └─────────┬───────────┘
//!           ▼
//! ┌─────────────────────┐
//! │ Check TTL cache     │──── HIT ───────▶ cached result
//! └─────────┬───────────┘
//!          MISS
//!           ▼
//! ┌─────────────────────┐
//! │ Providers in order  │──── ALL FAIL ──▶ unavailable (cached, audited)
//! │ (each with timeout) │
//! └─────────┬───────────┘
//!           ▼
//!     diff claims vs holdings ──▶ cache + audit
//!           │
//!       VERIFIED?
//!           │ yes
//!           ▼
//!   ledger sync ──── FAILS ──▶ persistence failure (cache invalidated)
//! ```

mod batch;
mod cache;
mod data_types;
pub mod diff;
mod rate_limit;
mod verifier;

pub use batch::{BatchEntry, BatchItem, BatchReport};
pub use cache::{CacheEntry, CacheStats, LruResultStore, ResultStore, VerificationCache, DEFAULT_TTL};
pub use data_types::{
    ClaimedToken, ErrorKind, Source, VerificationResult, VerificationStatus, VerifiedToken,
};
pub use diff::Discrepancies;
pub use rate_limit::{
    Admission, MemoryWindowStore, RateLimitEntry, RateLimiter, WindowStore, DEFAULT_LIMIT,
    DEFAULT_WINDOW,
};
pub use verifier::{Verifier, VerifierStats};
pub(crate) use verifier::VerifierParts;
