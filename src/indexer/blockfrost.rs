//! Blockfrost indexer (primary).
//!
//! Holdings are reconstructed from UTXOs: the stake account's addresses are
//! paged first, then every address's UTXOs, keeping amounts whose unit
//! starts with the collection policy.

use super::asset::{normalize_stake_address, printable_label, sequence_from_label, MEK_POLICY_ID};
use super::{IndexerProvider, DEFAULT_PROVIDER_TIMEOUT};
use crate::error::{Error, Result};
use crate::verify::{Source, VerifiedToken};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info, warn};

const PROVIDER: &str = "Blockfrost";

/// Mainnet API root.
pub const DEFAULT_BLOCKFROST_URL: &str = "https://cardano-mainnet.blockfrost.io/api/v0";

/// Items per page; Blockfrost's maximum.
const PAGE_SIZE: usize = 100;

/// Placeholder shipped in sample env files.
const PLACEHOLDER_KEY: &str = "your_blockfrost_mainnet_api_key_here";

/// Configuration for the Blockfrost provider.
#[derive(Debug, Clone)]
pub struct BlockfrostConfig {
    /// API root.
    pub base_url: String,
    /// `project_id` key. Without one every fetch fails.
    pub api_key: Option<String>,
    /// Query deadline.
    pub timeout: Duration,
    /// Fall back to the payment address hint when the stake account lists no addresses.
    pub use_address_hint: bool,
    /// Page limit per address (and for the address list).
    pub max_pages: usize,
    /// Collection policy to keep.
    pub policy_id: String,
}

impl Default for BlockfrostConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BLOCKFROST_URL.to_string(),
            api_key: None,
            timeout: DEFAULT_PROVIDER_TIMEOUT,
            use_address_hint: true,
            max_pages: 50,
            policy_id: MEK_POLICY_ID.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct AccountAddress {
    address: String,
}

/// One UTXO as returned by `/addresses/{address}/utxos`.
#[derive(Debug, Deserialize)]
pub(crate) struct Utxo {
    #[serde(default)]
    amount: Vec<Amount>,
}

#[derive(Debug, Deserialize)]
struct Amount {
    unit: String,
    quantity: String,
}

/// Blockfrost-backed provider.
pub struct BlockfrostProvider {
    config: BlockfrostConfig,
    client: Client,
}

impl BlockfrostProvider {
    /// Create a provider.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: BlockfrostConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("mek-verify/", env!("CARGO_PKG_VERSION")))
            .build()?;

        if config.api_key.is_none() {
            warn!("No Blockfrost API key configured - primary provider will always fail over");
        }

        Ok(Self { config, client })
    }

    fn api_key(&self) -> Result<&str> {
        match self.config.api_key.as_deref() {
            Some(key) if !key.is_empty() && key != PLACEHOLDER_KEY => Ok(key),
            _ => Err(Error::provider(PROVIDER, "API key not configured")),
        }
    }

    /// GET a JSON document. `Ok(None)` on 404.
    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        let url = format!("{}{}", self.config.base_url, path);
        let response = self
            .client
            .get(&url)
            .header("project_id", self.api_key()?)
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(Some(response.json().await?)),
            StatusCode::PAYMENT_REQUIRED => Err(Error::provider(PROVIDER, "API limit exceeded")),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(Error::provider(PROVIDER, format!("{status} - {body}")))
            }
        }
    }

    async fn account_addresses(&self, stake: &str) -> Result<Vec<String>> {
        let mut addresses = Vec::new();

        for page in 1..=self.config.max_pages {
            let path = format!("/accounts/{stake}/addresses?page={page}&count={PAGE_SIZE}");
            let Some(batch) = self.get_json::<Vec<AccountAddress>>(&path).await? else {
                debug!("Stake account {stake} unknown to Blockfrost");
                return Ok(addresses);
            };

            let full = batch.len() == PAGE_SIZE;
            addresses.extend(batch.into_iter().map(|a| a.address));
            if !full {
                return Ok(addresses);
            }
        }

        Err(self.page_limit_error(&format!("stake account {stake}")))
    }

    async fn collect_address(
        &self,
        address: &str,
        seen: &mut HashSet<String>,
        tokens: &mut Vec<VerifiedToken>,
    ) -> Result<()> {
        for page in 1..=self.config.max_pages {
            let path = format!("/addresses/{address}/utxos?page={page}&count={PAGE_SIZE}");
            let utxos = self
                .get_json::<Vec<Utxo>>(&path)
                .await?
                .unwrap_or_default();

            collect_from_utxos(&self.config.policy_id, &utxos, seen, tokens);
            if utxos.len() < PAGE_SIZE {
                return Ok(());
            }
        }

        Err(self.page_limit_error(&format!("address {address}")))
    }

    /// A listing still full after `max_pages` pages cannot be trusted as complete.
    fn page_limit_error(&self, what: &str) -> Error {
        warn!(
            "Reached max page limit ({}) for {}",
            self.config.max_pages, what
        );
        Error::provider(
            PROVIDER,
            format!("page limit ({}) reached for {what}", self.config.max_pages),
        )
    }
}

#[async_trait]
impl IndexerProvider for BlockfrostProvider {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    fn source(&self) -> Source {
        Source::Primary
    }

    fn timeout(&self) -> Duration {
        self.config.timeout
    }

    fn accepts_address_hint(&self) -> bool {
        self.config.use_address_hint
    }

    async fn fetch(
        &self,
        identity: &str,
        address_hint: Option<&str>,
    ) -> Result<Vec<VerifiedToken>> {
        self.api_key()?;
        let stake = normalize_stake_address(identity)?;
        debug!("Fetching Blockfrost holdings for {stake}");

        let mut addresses = self.account_addresses(&stake).await?;
        if addresses.is_empty() {
            if let Some(hint) = address_hint {
                debug!("No addresses on stake account, using payment address hint");
                addresses.push(hint.to_string());
            }
        }

        let mut seen = HashSet::new();
        let mut tokens = Vec::new();
        for address in &addresses {
            self.collect_address(address, &mut seen, &mut tokens).await?;
        }

        info!(
            "Blockfrost found {} tokens across {} addresses for {}",
            tokens.len(),
            addresses.len(),
            stake
        );
        Ok(tokens)
    }
}

/// Append the collection's tokens found in `utxos`, skipping units already seen.
pub(crate) fn collect_from_utxos(
    policy_id: &str,
    utxos: &[Utxo],
    seen: &mut HashSet<String>,
    tokens: &mut Vec<VerifiedToken>,
) {
    for amount in utxos.iter().flat_map(|u| &u.amount) {
        let Some(asset_name_hex) = amount.unit.strip_prefix(policy_id) else {
            continue;
        };
        if seen.contains(&amount.unit) {
            continue;
        }

        let Some(label) = printable_label(asset_name_hex) else {
            debug!("Skipping undecodable asset name {}", amount.unit);
            continue;
        };
        let Some(sequence_number) = sequence_from_label(&label).filter(|n| *n > 0) else {
            continue;
        };

        seen.insert(amount.unit.clone());
        tokens.push(VerifiedToken {
            token_id: amount.unit.clone(),
            token_label: label,
            sequence_number,
            quantity: amount.quantity.parse().unwrap_or(1),
        });
    }
}
