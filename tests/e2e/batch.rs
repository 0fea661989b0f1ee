//! Batch driver.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use crate::{claim, TestHarness};
use mek_verify::config::BatchConfig;
use mek_verify::{BatchEntry, ErrorKind, VerifierConfig};
use std::time::Duration;

fn entry(identity: &str, claims: &[u32]) -> BatchEntry {
    BatchEntry {
        identity: identity.to_string(),
        address_hint: None,
        claimed_tokens: claims.iter().copied().map(claim).collect(),
    }
}

#[tokio::test]
async fn test_batch_keeps_order_and_counts_verified() {
    let harness = TestHarness::setup();
    harness.primary.hold("stake1ua", &[1]);
    harness.primary.hold("stake1ub", &[2]);

    let report = harness
        .verifier
        .verify_batch(&[
            entry("stake1ua", &[1]),
            entry("stake1ub", &[3]),
            entry("stake1uc", &[]),
        ])
        .await;

    assert_eq!(report.total_identities, 3);
    assert_eq!(report.verified_count, 2);
    let identities: Vec<_> = report.results.iter().map(|r| r.identity.as_str()).collect();
    assert_eq!(identities, ["stake1ua", "stake1ub", "stake1uc"]);
    assert!(!report.results[1].result.verified);
}

#[tokio::test]
async fn test_failed_entry_does_not_stop_batch() {
    let harness = TestHarness::setup_with_config(VerifierConfig {
        batch: BatchConfig { delay_ms: 0 },
        rate_limit: mek_verify::config::RateLimitConfig {
            limit: 1,
            window_ms: 60_000,
        },
        ..VerifierConfig::default()
    });

    let report = harness
        .verifier
        .verify_batch(&[
            entry("stake1ua", &[]),
            entry("stake1ua", &[]),
            entry("stake1ub", &[]),
        ])
        .await;

    assert_eq!(report.total_identities, 3);
    assert_eq!(
        report.results[1].result.error_kind,
        Some(ErrorKind::RateLimited)
    );
    assert!(report.results[2].result.verified);
    assert_eq!(report.verified_count, 2);
}

#[tokio::test(start_paused = true)]
async fn test_batch_spaces_calls_by_delay() {
    let harness = TestHarness::setup_with_config(VerifierConfig {
        batch: BatchConfig { delay_ms: 100 },
        ..VerifierConfig::default()
    });
    let started = tokio::time::Instant::now();

    harness
        .verifier
        .verify_batch(&[
            entry("stake1ua", &[]),
            entry("stake1ub", &[]),
            entry("stake1uc", &[]),
        ])
        .await;

    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(200));
    assert!(elapsed < Duration::from_millis(300));
}

#[test]
fn test_batch_report_serializes_camel_case() {
    let report = mek_verify::BatchReport::default();
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["totalIdentities"], 0);
    assert_eq!(json["verifiedCount"], 0);
}
