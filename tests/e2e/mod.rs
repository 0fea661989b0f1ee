//! End-to-end tests for the verification pipeline.
//!
//! The harness wires a real [`mek_verify::Verifier`] to scripted indexer
//! providers and an in-memory ledger, so every path through the pipeline can
//! be driven without network access.

mod harness;

mod batch;
mod ledger;
mod verification;

pub use harness::{claim, token, Mode, TestHarness};
