//! Verifier assembly.

use crate::config::VerifierConfig;
use crate::error::Result;
use crate::indexer::{BlockfrostProvider, IndexerProvider, KoiosProvider};
use crate::ledger::{AuditLog, LedgerStore, LedgerSync, MemoryStore};
use crate::verify::{
    LruResultStore, RateLimiter, ResultStore, VerificationCache, Verifier, VerifierParts,
    WindowStore,
};
use std::sync::Arc;
use tracing::{info, warn};

/// Builder for constructing a [`Verifier`].
///
/// Anything not supplied is derived from the configuration: Blockfrost and
/// Koios providers as enabled, process-local rate-limit and cache stores,
/// and a fresh [`MemoryStore`] for the ledger and audit log.
pub struct VerifierBuilder {
    config: VerifierConfig,
    providers: Option<Vec<Arc<dyn IndexerProvider>>>,
    ledger: Option<Arc<dyn LedgerStore>>,
    audit: Option<Arc<dyn AuditLog>>,
    window_store: Option<Arc<dyn WindowStore>>,
    result_store: Option<Arc<dyn ResultStore>>,
}

impl VerifierBuilder {
    /// Create a new builder with the given configuration.
    #[must_use]
    pub fn new(config: VerifierConfig) -> Self {
        Self {
            config,
            providers: None,
            ledger: None,
            audit: None,
            window_store: None,
            result_store: None,
        }
    }

    /// Use these providers, in this order, instead of the configured ones.
    #[must_use]
    pub fn providers(mut self, providers: Vec<Arc<dyn IndexerProvider>>) -> Self {
        self.providers = Some(providers);
        self
    }

    /// Use one store for both the ledger and the audit log.
    #[must_use]
    pub fn store<S>(mut self, store: Arc<S>) -> Self
    where
        S: LedgerStore + AuditLog + 'static,
    {
        self.ledger = Some(store.clone());
        self.audit = Some(store);
        self
    }

    /// Use this ledger store.
    #[must_use]
    pub fn ledger_store(mut self, store: Arc<dyn LedgerStore>) -> Self {
        self.ledger = Some(store);
        self
    }

    /// Use this audit log.
    #[must_use]
    pub fn audit_log(mut self, log: Arc<dyn AuditLog>) -> Self {
        self.audit = Some(log);
        self
    }

    /// Share rate-limit windows through `store`.
    #[must_use]
    pub fn window_store(mut self, store: Arc<dyn WindowStore>) -> Self {
        self.window_store = Some(store);
        self
    }

    /// Share cached results through `store`.
    #[must_use]
    pub fn result_store(mut self, store: Arc<dyn ResultStore>) -> Self {
        self.result_store = Some(store);
        self
    }

    /// Build the verifier.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or an HTTP client
    /// cannot be created.
    pub fn build(self) -> Result<Verifier> {
        let config = self.config;
        config.validate()?;

        let providers = match self.providers {
            Some(providers) => providers,
            None => configured_providers(&config)?,
        };

        let (ledger, audit) = match (self.ledger, self.audit) {
            (Some(ledger), Some(audit)) => (ledger, audit),
            (ledger, audit) => {
                warn!("No ledger store supplied, using an in-memory store");
                let memory = Arc::new(MemoryStore::new());
                let memory_ledger: Arc<dyn LedgerStore> = memory.clone();
                let memory_audit: Arc<dyn AuditLog> = memory;
                (ledger.unwrap_or(memory_ledger), audit.unwrap_or(memory_audit))
            }
        };

        let limiter = match self.window_store {
            Some(store) => {
                RateLimiter::with_store(config.rate_limit.limit, config.rate_window(), store)
            }
            None => RateLimiter::new(config.rate_limit.limit, config.rate_window()),
        };
        let result_store: Arc<dyn ResultStore> = match self.result_store {
            Some(store) => store,
            None => Arc::new(LruResultStore::with_capacity(config.cache.capacity)),
        };
        let cache = VerificationCache::with_store(config.cache_ttl(), result_store);

        let names: Vec<_> = providers.iter().map(|p| p.name()).collect();
        info!(
            "Verifier initialized (providers={:?}, rate_limit={}/{}ms, cache_ttl={}ms, serialize_per_identity={})",
            names,
            config.rate_limit.limit,
            config.rate_limit.window_ms,
            config.cache.ttl_ms,
            config.serialize_per_identity
        );

        Ok(Verifier::from_parts(VerifierParts {
            providers,
            limiter,
            cache,
            ledger: LedgerSync::new(ledger),
            audit,
            batch_delay: config.batch_delay(),
            serialize_per_identity: config.serialize_per_identity,
        }))
    }
}

/// Blockfrost then Koios, skipping those disabled in `config`.
fn configured_providers(config: &VerifierConfig) -> Result<Vec<Arc<dyn IndexerProvider>>> {
    let mut providers: Vec<Arc<dyn IndexerProvider>> = Vec::new();
    if config.primary.enabled {
        providers.push(Arc::new(BlockfrostProvider::new(config.blockfrost())?));
    }
    if config.secondary.enabled {
        providers.push(Arc::new(KoiosProvider::new(config.koios())?));
    }
    Ok(providers)
}
