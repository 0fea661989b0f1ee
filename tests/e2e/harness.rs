//! Test harness wiring a verifier to stub providers and an in-memory ledger.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use chrono::Utc;
use mek_verify::indexer::IndexerProvider;
use mek_verify::ledger::{
    AuditLog, AuditLogEntry, LedgerStore, OwnerAggregate, OwnershipRecord, RecordPatch,
};
use mek_verify::{
    ClaimedToken, Error, MemoryStore, Source, Verifier, VerifierBuilder, VerifierConfig,
    VerifiedToken,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Policy id used by every test token.
pub const TEST_POLICY: &str = "ffa56051fda3d106a96f09c3d209d4bf24a117406fb813fb8b4548e3";

/// Token `n` as an indexer would report it.
#[must_use]
pub fn token(n: u32) -> VerifiedToken {
    let label = format!("Mekanism{n}");
    VerifiedToken {
        token_id: format!("{TEST_POLICY}{}", hex::encode(&label)),
        token_label: label,
        sequence_number: n,
        quantity: 1,
    }
}

/// Token `n` as a client would claim it.
#[must_use]
pub fn claim(n: u32) -> ClaimedToken {
    let t = token(n);
    ClaimedToken {
        token_id: t.token_id,
        token_label: t.token_label,
        sequence_number: t.sequence_number,
    }
}

/// How a stub provider answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Return the scripted holdings.
    Answer,
    /// Return an error.
    Fail,
    /// Never answer within any sane deadline.
    Hang,
}

/// Scripted indexer that counts its calls.
pub struct StubProvider {
    name: &'static str,
    source: Source,
    mode: Mutex<Mode>,
    holdings: Mutex<HashMap<String, Vec<VerifiedToken>>>,
    calls: AtomicUsize,
}

impl StubProvider {
    /// Create a provider in [`Mode::Answer`] holding nothing.
    #[must_use]
    pub fn new(name: &'static str, source: Source) -> Arc<Self> {
        Arc::new(Self {
            name,
            source,
            mode: Mutex::new(Mode::Answer),
            holdings: Mutex::new(HashMap::new()),
            calls: AtomicUsize::new(0),
        })
    }

    /// Switch the answering mode.
    pub fn set_mode(&self, mode: Mode) {
        *self.mode.lock() = mode;
    }

    /// Script what `identity` holds on-chain.
    pub fn hold(&self, identity: &str, numbers: &[u32]) {
        self.holdings.lock().insert(
            identity.to_string(),
            numbers.iter().copied().map(token).collect(),
        );
    }

    /// Number of fetches so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IndexerProvider for StubProvider {
    fn name(&self) -> &'static str {
        self.name
    }

    fn source(&self) -> Source {
        self.source
    }

    async fn fetch(
        &self,
        identity: &str,
        _address_hint: Option<&str>,
    ) -> mek_verify::Result<Vec<VerifiedToken>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mode = *self.mode.lock();
        match mode {
            Mode::Answer => Ok(self
                .holdings
                .lock()
                .get(identity)
                .cloned()
                .unwrap_or_default()),
            Mode::Fail => Err(Error::Provider {
                provider: self.name,
                message: "503 Service Unavailable".to_string(),
            }),
            Mode::Hang => {
                tokio::time::sleep(Duration::from_secs(24 * 3600)).await;
                Ok(Vec::new())
            }
        }
    }
}

/// In-memory ledger whose writes can be switched off.
#[derive(Default)]
pub struct TestStore {
    memory: MemoryStore,
    fail_writes: AtomicBool,
}

impl TestStore {
    /// Ledger with tokens `1..=size`, all unowned.
    #[must_use]
    pub fn with_collection(size: u32) -> Self {
        Self {
            memory: MemoryStore::with_records((1..=size).map(|n| OwnershipRecord {
                token_number: n,
                token_id: token(n).token_id,
                owner_identity: None,
                accrued_value: 0.0,
                last_updated: Utc::now(),
            })),
            fail_writes: AtomicBool::new(false),
        }
    }

    /// Direct access to the backing store.
    #[must_use]
    pub fn memory(&self) -> &MemoryStore {
        &self.memory
    }

    /// Make every record patch fail until switched back.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Owner of token `n`.
    #[must_use]
    pub fn owner_of(&self, n: u32) -> Option<String> {
        self.memory.get(n).and_then(|r| r.owner_identity)
    }

    /// Stored aggregate count for `identity`, 0 if none.
    #[must_use]
    pub fn aggregate_count(&self, identity: &str) -> u64 {
        self.memory
            .aggregate_of(identity)
            .map_or(0, |a| a.token_count)
    }
}

#[async_trait]
impl LedgerStore for TestStore {
    async fn records_owned_by(&self, identity: &str) -> mek_verify::Result<Vec<OwnershipRecord>> {
        self.memory.records_owned_by(identity).await
    }

    async fn record(&self, token_number: u32) -> mek_verify::Result<Option<OwnershipRecord>> {
        self.memory.record(token_number).await
    }

    async fn patch(&self, token_number: u32, patch: RecordPatch) -> mek_verify::Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::Persistence("connection reset".to_string()));
        }
        self.memory.patch(token_number, patch).await
    }

    async fn count_owned_by(&self, identity: &str) -> mek_verify::Result<u64> {
        self.memory.count_owned_by(identity).await
    }

    async fn aggregate(&self, identity: &str) -> mek_verify::Result<Option<OwnerAggregate>> {
        self.memory.aggregate(identity).await
    }

    async fn put_aggregate(&self, aggregate: OwnerAggregate) -> mek_verify::Result<()> {
        self.memory.put_aggregate(aggregate).await
    }
}

#[async_trait]
impl AuditLog for TestStore {
    async fn append(&self, entry: AuditLogEntry) -> mek_verify::Result<()> {
        self.memory.append(entry).await
    }

    async fn latest(&self, identity: &str) -> mek_verify::Result<Option<AuditLogEntry>> {
        self.memory.latest(identity).await
    }
}

/// A verifier with two stub providers and a ten-token collection.
pub struct TestHarness {
    /// The verifier under test.
    pub verifier: Verifier,
    /// Ledger and audit log.
    pub store: Arc<TestStore>,
    /// First provider queried.
    pub primary: Arc<StubProvider>,
    /// Fallback provider.
    pub secondary: Arc<StubProvider>,
}

impl TestHarness {
    /// Harness with the default configuration.
    #[must_use]
    pub fn setup() -> Self {
        Self::setup_with_config(VerifierConfig {
            batch: mek_verify::config::BatchConfig { delay_ms: 0 },
            ..VerifierConfig::default()
        })
    }

    /// Harness with a custom configuration.
    #[must_use]
    pub fn setup_with_config(config: VerifierConfig) -> Self {
        let primary = StubProvider::new("primary-stub", Source::Primary);
        let secondary = StubProvider::new("secondary-stub", Source::Secondary);
        let store = Arc::new(TestStore::with_collection(10));

        let verifier = VerifierBuilder::new(config)
            .providers(vec![primary.clone(), secondary.clone()])
            .store(store.clone())
            .build()
            .expect("Failed to build verifier");

        Self {
            verifier,
            store,
            primary,
            secondary,
        }
    }

    /// Total provider fetches so far.
    #[must_use]
    pub fn provider_calls(&self) -> usize {
        self.primary.calls() + self.secondary.calls()
    }
}
