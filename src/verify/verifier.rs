//! Verification orchestrator.
//!
//! Ties the rate limiter, result cache, indexer providers, diff engine,
//! audit log and ledger sync into the single `verify` entry point.

use crate::error::Error;
use crate::event::{create_event_channel, VerifierEvent, VerifierEventsChannel, VerifierEventsSender};
use crate::indexer::IndexerProvider;
use crate::ledger::{AuditLog, AuditLogEntry, LedgerSync};
use crate::verify::cache::{CacheStats, VerificationCache};
use crate::verify::data_types::{
    ClaimedToken, Source, VerificationResult, VerificationStatus, VerifiedToken,
};
use crate::verify::rate_limit::{Admission, RateLimiter};
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Running counters for monitoring.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct VerifierStats {
    /// Calls answered by the primary provider.
    pub primary_hits: u64,
    /// Calls answered by the secondary provider.
    pub secondary_hits: u64,
    /// Individual provider failures, timeouts included.
    pub provider_failures: u64,
    /// Calls where every provider failed.
    pub unavailable: u64,
    /// Calls answered from the cache.
    pub cache_hits: u64,
    /// Calls rejected by the rate limiter.
    pub rate_limited: u64,
    /// Verified calls whose ledger sync failed.
    pub persistence_failures: u64,
}

/// Everything a [`Verifier`] is assembled from.
pub(crate) struct VerifierParts {
    pub providers: Vec<Arc<dyn IndexerProvider>>,
    pub limiter: RateLimiter,
    pub cache: VerificationCache,
    pub ledger: LedgerSync,
    pub audit: Arc<dyn AuditLog>,
    pub batch_delay: Duration,
    pub serialize_per_identity: bool,
}

type IdentityLocks = Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>;

/// Verifies claimed holdings and keeps the ownership ledger in line with them.
///
/// Build one with [`crate::VerifierBuilder`].
pub struct Verifier {
    providers: Vec<Arc<dyn IndexerProvider>>,
    limiter: RateLimiter,
    cache: VerificationCache,
    ledger: LedgerSync,
    audit: Arc<dyn AuditLog>,
    pub(crate) batch_delay: Duration,
    identity_locks: Option<IdentityLocks>,
    events_tx: VerifierEventsSender,
    stats: Mutex<VerifierStats>,
}

impl Verifier {
    pub(crate) fn from_parts(parts: VerifierParts) -> Self {
        let (events_tx, _) = create_event_channel();
        Self {
            providers: parts.providers,
            limiter: parts.limiter,
            cache: parts.cache,
            ledger: parts.ledger,
            audit: parts.audit,
            batch_delay: parts.batch_delay,
            identity_locks: parts
                .serialize_per_identity
                .then(|| Mutex::new(HashMap::new())),
            events_tx,
            stats: Mutex::new(VerifierStats::default()),
        }
    }

    /// Verify that `identity` holds exactly `claimed`.
    ///
    /// This is the main entry point:
    /// 1. Rate limit (rejections are neither cached nor audited)
    /// 2. Fresh cache entry, returned verbatim
    /// 3. Providers in order until one answers
    /// 4. Diff, cache and audit
    /// 5. Ledger sync when the claims match
    ///
    /// Failures are reported inside the result; this never returns an error.
    pub async fn verify(
        &self,
        identity: &str,
        claimed: &[ClaimedToken],
        address_hint: Option<&str>,
    ) -> VerificationResult {
        if let Admission::Rejected { retry_after } = self.limiter.check(identity) {
            warn!(
                "Rate limit exceeded for {} (retry in {}ms)",
                identity,
                retry_after.as_millis()
            );
            self.stats.lock().rate_limited += 1;
            return VerificationResult::rate_limited(claimed.len(), retry_after);
        }

        let Some(locks) = &self.identity_locks else {
            return self.verify_admitted(identity, claimed, address_hint).await;
        };

        let lock = Arc::clone(locks.lock().entry(identity.to_string()).or_default());
        let result = {
            let _guard = lock.lock().await;
            self.verify_admitted(identity, claimed, address_hint).await
        };
        drop(lock);
        locks.lock().retain(|_, lock| Arc::strong_count(lock) > 1);
        result
    }

    /// Inbound-call form of [`Self::verify`], argument order as exposed to clients.
    pub async fn verify_ownership(
        &self,
        identity: &str,
        address_hint: Option<&str>,
        claimed_tokens: &[ClaimedToken],
    ) -> VerificationResult {
        self.verify(identity, claimed_tokens, address_hint).await
    }

    async fn verify_admitted(
        &self,
        identity: &str,
        claimed: &[ClaimedToken],
        address_hint: Option<&str>,
    ) -> VerificationResult {
        if let Some(cached) = self.cache.get(identity) {
            debug!("Verification for {identity} served from cache");
            self.stats.lock().cache_hits += 1;
            return cached;
        }

        let mut result = match self.query_providers(identity, address_hint).await {
            Ok((source, tokens)) => VerificationResult::reconciled(source, claimed, tokens),
            Err(failures) => {
                self.stats.lock().unavailable += 1;
                let _ = self.events_tx.send(VerifierEvent::AllProvidersFailed {
                    identity: identity.to_string(),
                });
                let message = if failures.is_empty() {
                    "no indexer providers configured".to_string()
                } else {
                    format!("all providers failed: {}", failures.join("; "))
                };
                VerificationResult::unavailable(claimed.len(), message)
            }
        };

        if result.success {
            self.announce(identity, &result);
        }

        self.cache.put(identity, result.clone());
        self.record_audit(identity, &result).await;

        if !result.verified {
            return result;
        }

        match self.ledger.apply(identity, &result.verified_tokens).await {
            Ok(report) => {
                if !report.unresolved.is_empty() {
                    let _ = self.events_tx.send(VerifierEvent::DataIntegrityWarning {
                        identity: identity.to_string(),
                        token_numbers: report.unresolved.clone(),
                    });
                }
                let _ = self.events_tx.send(VerifierEvent::LedgerSynced {
                    identity: identity.to_string(),
                    updated: report.updated,
                    cleared: report.cleared,
                });
                result.ledger = Some(report);
                self.cache.put(identity, result.clone());
                result
            }
            Err(e) => {
                warn!("Ledger sync failed for {}: {}", identity, e);
                self.cache.invalidate(identity);
                self.stats.lock().persistence_failures += 1;
                let _ = self.events_tx.send(VerifierEvent::PersistenceFailed {
                    identity: identity.to_string(),
                    message: e.to_string(),
                });
                result.persistence_failed(e)
            }
        }
    }

    /// Ask each provider in turn; the first answer wins.
    ///
    /// On total failure returns one message per provider.
    async fn query_providers(
        &self,
        identity: &str,
        address_hint: Option<&str>,
    ) -> std::result::Result<(Source, Vec<VerifiedToken>), Vec<String>> {
        let mut failures = Vec::with_capacity(self.providers.len());

        for provider in &self.providers {
            let hint = address_hint.filter(|_| provider.accepts_address_hint());
            let deadline = provider.timeout();

            let error = match tokio::time::timeout(deadline, provider.fetch(identity, hint)).await
            {
                Ok(Ok(tokens)) => {
                    let source = provider.source();
                    {
                        let mut stats = self.stats.lock();
                        match source {
                            Source::Primary => stats.primary_hits += 1,
                            Source::Secondary => stats.secondary_hits += 1,
                        }
                    }
                    debug!(
                        "{} returned {} tokens for {}",
                        provider.name(),
                        tokens.len(),
                        identity
                    );
                    return Ok((source, tokens));
                }
                Ok(Err(e)) => e,
                Err(_) => Error::Timeout {
                    provider: provider.name(),
                    after: deadline,
                },
            };

            warn!(
                "{} failed for {}, trying next provider: {}",
                provider.name(),
                identity,
                error
            );
            self.stats.lock().provider_failures += 1;
            let _ = self.events_tx.send(VerifierEvent::ProviderFailed {
                provider: provider.name(),
                message: error.to_string(),
            });
            failures.push(error.to_string());
        }

        Err(failures)
    }

    fn announce(&self, identity: &str, result: &VerificationResult) {
        let event = match result.source {
            Some(source) if result.verified => {
                info!(
                    "Verified {} tokens for {} via {}",
                    result.verified_count, identity, source
                );
                VerifierEvent::Verified {
                    identity: identity.to_string(),
                    source,
                    token_count: result.verified_count,
                }
            }
            _ => {
                info!(
                    "Ownership mismatch for {}: {} false positives, {} missing",
                    identity,
                    result.false_positives.len(),
                    result.missing_tokens.len()
                );
                VerifierEvent::Mismatch {
                    identity: identity.to_string(),
                    false_positives: result.false_positives.len(),
                    missing: result.missing_tokens.len(),
                }
            }
        };
        let _ = self.events_tx.send(event);
    }

    async fn record_audit(&self, identity: &str, result: &VerificationResult) {
        if let Err(e) = self
            .audit
            .append(AuditLogEntry::from_result(identity, result))
            .await
        {
            warn!("Failed to write audit entry for {}: {}", identity, e);
        }
    }

    /// Last known verification outcome for `identity`.
    ///
    /// The cache is consulted first, then the most recent audit entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the audit log cannot be read.
    pub async fn verification_status(&self, identity: &str) -> crate::Result<VerificationStatus> {
        if let Some(entry) = self.cache.peek_at(identity, Instant::now()) {
            return Ok(VerificationStatus {
                has_recent_verification: true,
                last_verified: Some(entry.result.timestamp),
                verified: entry.result.verified,
                source: entry.result.source,
                cached: true,
            });
        }

        let Some(entry) = self.audit.latest(identity).await? else {
            return Ok(VerificationStatus::unknown());
        };

        let ttl = self.cache.ttl();
        let recent = (Utc::now() - entry.timestamp)
            .to_std()
            .map_or(true, |age| age <= ttl);

        Ok(VerificationStatus {
            has_recent_verification: recent,
            last_verified: Some(entry.timestamp),
            verified: entry.verified,
            source: entry.source,
            cached: false,
        })
    }

    /// Drop every cached outcome. Returns how many were dropped.
    pub fn clear_cache(&self) -> usize {
        let cleared = self.cache.clear();
        info!("Cleared {cleared} cached verification results");
        cleared
    }

    /// Subscribe to verifier events.
    #[must_use]
    pub fn subscribe_events(&self) -> VerifierEventsChannel {
        self.events_tx.subscribe()
    }

    /// Snapshot of the running counters.
    #[must_use]
    pub fn stats(&self) -> VerifierStats {
        self.stats.lock().clone()
    }

    /// Cache counters.
    #[must_use]
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Provider names in query order.
    #[must_use]
    pub fn provider_names(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.name()).collect()
    }
}
