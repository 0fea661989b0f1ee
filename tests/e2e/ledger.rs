//! Ledger effects of verified calls.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use crate::{claim, TestHarness};
use mek_verify::ErrorKind;

const X: &str = "stake1uxseller";
const Y: &str = "stake1uybuyer";

#[tokio::test]
async fn test_transfer_resets_accrued_value_and_recounts_both_owners() {
    let harness = TestHarness::setup();
    harness.primary.hold(X, &[1, 2]);
    assert!(harness.verifier.verify(X, &[claim(1), claim(2)], None).await.verified);
    assert_eq!(harness.store.aggregate_count(X), 2);
    harness.store.memory().set_accrued(1, 125.5);

    // Token 1 changes hands on-chain.
    harness.primary.hold(Y, &[1]);
    let result = harness.verifier.verify(Y, &[claim(1)], None).await;

    assert!(result.success);
    assert!(result.verified);
    let report = result.ledger.unwrap();
    assert_eq!(report.updated, 1);
    assert_eq!(report.affected_owners, vec![X.to_string()]);

    let record = harness.store.memory().get(1).unwrap();
    assert_eq!(record.owner_identity.as_deref(), Some(Y));
    assert!(record.accrued_value.abs() < f64::EPSILON);
    assert_eq!(harness.store.aggregate_count(Y), 1);
    assert_eq!(harness.store.aggregate_count(X), 1);
    assert_eq!(harness.store.owner_of(2).as_deref(), Some(X));
}

#[tokio::test]
async fn test_sold_tokens_are_released_on_next_verification() {
    let harness = TestHarness::setup();
    harness.primary.hold(X, &[1, 2, 3]);
    harness
        .verifier
        .verify(X, &[claim(1), claim(2), claim(3)], None)
        .await;
    harness.verifier.clear_cache();

    harness.primary.hold(X, &[3]);
    let result = harness.verifier.verify(X, &[claim(3)], None).await;

    assert_eq!(result.ledger.unwrap().cleared, 2);
    assert_eq!(harness.store.owner_of(1), None);
    assert_eq!(harness.store.owner_of(2), None);
    assert_eq!(harness.store.aggregate_count(X), 1);
}

#[tokio::test]
async fn test_token_outside_collection_is_unresolved() {
    let harness = TestHarness::setup();
    harness.primary.hold(X, &[1, 42]);

    let result = harness
        .verifier
        .verify(X, &[claim(1), claim(42)], None)
        .await;

    assert!(result.success);
    assert!(result.verified);
    let report = result.ledger.unwrap();
    assert_eq!(report.unresolved, vec![42]);
    assert_eq!(report.new_aggregate, 1);
}

#[tokio::test]
async fn test_persistence_failure_is_distinct_and_retried() {
    let harness = TestHarness::setup();
    harness.primary.hold(X, &[7]);
    harness.store.set_fail_writes(true);

    let failed = harness.verifier.verify(X, &[claim(7)], None).await;

    assert!(!failed.success);
    assert!(failed.verified);
    assert_eq!(failed.error_kind, Some(ErrorKind::PersistenceFailure));
    assert!(failed
        .error
        .as_deref()
        .unwrap()
        .starts_with("verification succeeded but persistence failed"));
    assert_eq!(harness.store.owner_of(7), None);

    // The failed sync is not served from cache; the retry re-runs it.
    harness.store.set_fail_writes(false);
    let retried = harness.verifier.verify(X, &[claim(7)], None).await;

    assert!(retried.success);
    assert_eq!(harness.primary.calls(), 2);
    assert_eq!(harness.store.owner_of(7).as_deref(), Some(X));
    assert_eq!(harness.store.aggregate_count(X), 1);
}

#[tokio::test]
async fn test_repeated_sync_is_stable() {
    let harness = TestHarness::setup();
    harness.primary.hold(X, &[1, 2]);
    let claims = [claim(1), claim(2)];

    harness.verifier.verify(X, &claims, None).await;
    let first = harness.store.memory().snapshot();
    harness.verifier.clear_cache();
    let result = harness.verifier.verify(X, &claims, None).await;
    let second = harness.store.memory().snapshot();

    assert_eq!(first.records, second.records);
    assert_eq!(first.aggregates, second.aggregates);
    let report = result.ledger.unwrap();
    assert_eq!(report.updated, 0);
    assert_eq!(report.unchanged, 2);
}
