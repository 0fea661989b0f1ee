//! Koios indexer (secondary).
//!
//! Koios answers per stake address with a pre-aggregated asset list, so no
//! UTXO walking is needed. It needs no API key.

use super::asset::{normalize_stake_address, sequence_from_label, token_id, utf8_label, MEK_POLICY_ID};
use super::{IndexerProvider, DEFAULT_PROVIDER_TIMEOUT};
use crate::error::{Error, Result};
use crate::verify::{Source, VerifiedToken};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info};

const PROVIDER: &str = "Koios";

/// Public API root.
pub const DEFAULT_KOIOS_URL: &str = "https://api.koios.rest/api/v1";

/// Configuration for the Koios provider.
#[derive(Debug, Clone)]
pub struct KoiosConfig {
    /// API root.
    pub base_url: String,
    /// Query deadline.
    pub timeout: Duration,
    /// Query the payment address hint when the stake account holds nothing.
    pub use_address_hint: bool,
    /// Collection policy to keep.
    pub policy_id: String,
}

impl Default for KoiosConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_KOIOS_URL.to_string(),
            timeout: DEFAULT_PROVIDER_TIMEOUT,
            use_address_hint: false,
            policy_id: MEK_POLICY_ID.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct AccountAssetsRequest<'a> {
    #[serde(rename = "_stake_addresses")]
    stake_addresses: [&'a str; 1],
}

#[derive(Debug, Serialize)]
struct AddressAssetsRequest<'a> {
    #[serde(rename = "_addresses")]
    addresses: [&'a str; 1],
}

/// One stake address worth of holdings from `/account_assets`.
#[derive(Debug, Deserialize)]
pub(crate) struct AccountAssets {
    #[serde(default)]
    asset_list: Vec<KoiosAsset>,
}

/// One holding, shared by `/account_assets` lists and `/address_assets` rows.
#[derive(Debug, Deserialize)]
pub(crate) struct KoiosAsset {
    policy_id: String,
    #[serde(default)]
    asset_name: Option<String>,
    quantity: String,
}

/// Koios-backed provider.
pub struct KoiosProvider {
    config: KoiosConfig,
    client: Client,
}

impl KoiosProvider {
    /// Create a provider.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: KoiosConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("mek-verify/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { config, client })
    }

    async fn post_json<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let url = format!("{}{}", self.config.base_url, path);
        let response = self
            .client
            .post(&url)
            .header("Accept", "application/json")
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::provider(PROVIDER, format!("{status} - {body}")));
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl IndexerProvider for KoiosProvider {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    fn source(&self) -> Source {
        Source::Secondary
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
        let stake = koios_stake_address(identity);
        debug!("Fetching Koios holdings for {stake}");

        let accounts: Vec<AccountAssets> = self
            .post_json(
                "/account_assets",
                &AccountAssetsRequest {
                    stake_addresses: [stake.as_str()],
                },
            )
            .await?;
        let mut tokens = decode_assets(
            &self.config.policy_id,
            accounts.iter().flat_map(|a| &a.asset_list),
        );

        if tokens.is_empty() {
            if let Some(hint) = address_hint {
                debug!("Stake account empty on Koios, querying payment address hint");
                let rows: Vec<KoiosAsset> = self
                    .post_json(
                        "/address_assets",
                        &AddressAssetsRequest { addresses: [hint] },
                    )
                    .await?;
                tokens = decode_assets(&self.config.policy_id, rows.iter());
            }
        }

        info!("Koios found {} tokens for {}", tokens.len(), stake);
        Ok(tokens)
    }
}

/// Koios wants bech32; bare data parts get the mainnet prefix.
fn koios_stake_address(identity: &str) -> String {
    normalize_stake_address(identity).unwrap_or_else(|_| format!("stake1{}", identity.trim()))
}

/// Keep the collection's assets, decoding each name into a label and number.
pub(crate) fn decode_assets<'a>(
    policy_id: &str,
    assets: impl Iterator<Item = &'a KoiosAsset>,
) -> Vec<VerifiedToken> {
    let mut seen = HashSet::new();
    assets
        .filter(|asset| asset.policy_id == policy_id)
        .filter_map(|asset| {
            let asset_name_hex = asset.asset_name.as_deref().unwrap_or_default();
            let label = utf8_label(asset_name_hex)?;
            let sequence_number = sequence_from_label(&label).filter(|n| *n > 0)?;
            let id = token_id(&asset.policy_id, asset_name_hex);
            seen.insert(id.clone()).then(|| VerifiedToken {
                token_id: id,
                token_label: label,
                sequence_number,
                quantity: asset.quantity.parse().unwrap_or(1),
            })
        })
        .collect()
}
