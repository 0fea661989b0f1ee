//! Reconciliation, fallback, caching and rate limiting.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use crate::{claim, token, Mode, TestHarness};
use mek_verify::config::RateLimitConfig;
use mek_verify::{ErrorKind, Source, VerifierConfig, VerifierEvent};
use std::time::Duration;

const X: &str = "stake1uxholder";

#[tokio::test]
async fn test_partial_overlap_reports_both_directions() {
    let harness = TestHarness::setup();
    harness.primary.hold(X, &[1, 3]);

    let result = harness.verifier.verify(X, &[claim(1), claim(2)], None).await;

    assert!(result.success);
    assert!(!result.verified);
    assert_eq!(result.source, Some(Source::Primary));
    assert_eq!(result.false_positives, vec![claim(2)]);
    assert_eq!(result.missing_tokens, vec![token(3)]);
    assert_eq!(result.claimed_count, 2);
    assert_eq!(result.verified_count, 2);

    // A mismatch never touches the ledger.
    assert!(result.ledger.is_none());
    assert_eq!(harness.store.owner_of(1), None);
}

#[tokio::test]
async fn test_nothing_claimed_nothing_held_is_verified() {
    let harness = TestHarness::setup();

    let result = harness.verifier.verify(X, &[], None).await;

    assert!(result.success);
    assert!(result.verified);
    assert!(result.false_positives.is_empty());
    assert!(result.missing_tokens.is_empty());
    assert_eq!(result.ledger.unwrap().new_aggregate, 0);
}

#[tokio::test]
async fn test_empty_claim_with_holdings_lists_missing() {
    let harness = TestHarness::setup();
    harness.primary.hold(X, &[4]);

    let result = harness.verifier.verify(X, &[], None).await;

    assert!(result.success);
    assert!(!result.verified);
    assert_eq!(result.missing_tokens, vec![token(4)]);
}

#[tokio::test(start_paused = true)]
async fn test_primary_timeout_falls_back_to_secondary() {
    let harness = TestHarness::setup();
    harness.primary.set_mode(Mode::Hang);
    harness.secondary.hold(X, &[5]);
    let started = tokio::time::Instant::now();

    let result = harness.verifier.verify(X, &[claim(5)], None).await;

    assert!(started.elapsed() >= Duration::from_secs(180));
    assert!(result.success);
    assert!(result.verified);
    assert_eq!(result.source, Some(Source::Secondary));
    assert_eq!(harness.primary.calls(), 1);
    assert_eq!(harness.secondary.calls(), 1);
    assert_eq!(harness.store.owner_of(5).as_deref(), Some(X));
}

#[tokio::test]
async fn test_primary_error_falls_back_and_emits_event() {
    let harness = TestHarness::setup();
    let mut events = harness.verifier.subscribe_events();
    harness.primary.set_mode(Mode::Fail);
    harness.secondary.hold(X, &[2]);

    let result = harness.verifier.verify(X, &[claim(2)], None).await;

    assert_eq!(result.source, Some(Source::Secondary));
    assert!(matches!(
        events.recv().await.unwrap(),
        VerifierEvent::ProviderFailed {
            provider: "primary-stub",
            ..
        }
    ));
}

#[tokio::test]
async fn test_cached_failure_suppresses_provider_calls() {
    let harness = TestHarness::setup();
    harness.primary.set_mode(Mode::Fail);
    harness.secondary.set_mode(Mode::Fail);

    let first = harness.verifier.verify(X, &[claim(1)], None).await;
    assert!(!first.success);
    assert!(!first.verified);
    assert_eq!(first.error_kind, Some(ErrorKind::ProviderUnavailable));
    assert!(first.error.as_deref().unwrap().contains("503"));
    assert_eq!(harness.provider_calls(), 2);

    // Providers recover, but the failure stays cached for the TTL.
    harness.primary.set_mode(Mode::Answer);
    let second = harness.verifier.verify(X, &[claim(1)], None).await;
    assert_eq!(second, first);
    assert_eq!(harness.provider_calls(), 2);

    // The attempt is audited once.
    assert_eq!(harness.store.memory().audit_entries().len(), 1);
}

#[tokio::test]
async fn test_rate_limit_rejects_without_contacting_providers() {
    let harness = TestHarness::setup_with_config(VerifierConfig {
        rate_limit: RateLimitConfig {
            limit: 3,
            window_ms: 60_000,
        },
        ..VerifierConfig::default()
    });

    for _ in 0..3 {
        assert!(harness.verifier.verify(X, &[], None).await.success);
    }
    let calls = harness.provider_calls();
    let audited = harness.store.memory().audit_entries().len();

    let rejected = harness.verifier.verify(X, &[], None).await;

    assert!(!rejected.success);
    assert!(!rejected.verified);
    assert_eq!(rejected.error.as_deref(), Some("rate limited"));
    assert_eq!(rejected.error_kind, Some(ErrorKind::RateLimited));
    assert!(rejected.retry_after_ms.unwrap() <= 60_000);
    assert_eq!(harness.provider_calls(), calls);
    assert_eq!(harness.store.memory().audit_entries().len(), audited);
    assert_eq!(harness.verifier.stats().rate_limited, 1);

    // Other identities are unaffected.
    assert!(harness.verifier.verify("stake1uother", &[], None).await.success);
}

#[tokio::test]
async fn test_clear_cache_forces_fresh_query() {
    let harness = TestHarness::setup();
    harness.primary.hold(X, &[1]);

    harness.verifier.verify(X, &[claim(1)], None).await;
    harness.verifier.verify(X, &[claim(1)], None).await;
    assert_eq!(harness.primary.calls(), 1);

    assert_eq!(harness.verifier.clear_cache(), 1);
    harness.verifier.verify(X, &[claim(1)], None).await;
    assert_eq!(harness.primary.calls(), 2);
}

#[tokio::test]
async fn test_status_reflects_last_verification() {
    let harness = TestHarness::setup();
    harness.primary.hold(X, &[1]);

    let before = tokio_test::assert_ok!(harness.verifier.verification_status(X).await);
    assert!(!before.has_recent_verification);

    harness.verifier.verify(X, &[claim(1)], None).await;
    let after = tokio_test::assert_ok!(harness.verifier.verification_status(X).await);
    assert!(after.has_recent_verification);
    assert!(after.verified);
    assert_eq!(after.source, Some(Source::Primary));
}
