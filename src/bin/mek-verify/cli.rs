//! Command-line interface definition.

use clap::{Parser, Subcommand};
use mek_verify::config::default_config_path;
use mek_verify::VerifierConfig;
use std::path::PathBuf;

/// Verify Mek NFT ownership claims against on-chain holdings.
#[derive(Parser, Debug)]
#[command(name = "mek-verify")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file.
    #[arg(long, short, env = "MEK_VERIFY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Ownership ledger snapshot (JSON). Loaded before the run and written back after it.
    #[arg(long, env = "MEK_VERIFY_LEDGER")]
    pub ledger: Option<PathBuf>,

    /// Blockfrost API key.
    #[arg(long, env = "BLOCKFROST_API_KEY", hide_env_values = true)]
    pub blockfrost_api_key: Option<String>,

    /// Log level.
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    pub log_level: String,

    /// Emit logs as JSON lines.
    #[arg(long)]
    pub json_logs: bool,

    /// What to do.
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Verify one identity.
    Verify {
        /// Stake address (bech32 or hex).
        #[arg(long)]
        identity: String,

        /// Payment address for providers that accept one.
        #[arg(long)]
        address_hint: Option<String>,

        /// JSON array of claimed tokens. No file means no claims.
        #[arg(long)]
        claims: Option<PathBuf>,
    },

    /// Verify every entry of a JSON batch file.
    Batch {
        /// JSON array of `{identity, addressHint?, claimedTokens}`.
        #[arg(long)]
        input: PathBuf,
    },

    /// Show the last known verification for an identity.
    Status {
        /// Stake address (bech32 or hex).
        #[arg(long)]
        identity: String,
    },
}

impl Cli {
    /// Build the verifier configuration.
    ///
    /// An explicit `--config` must exist; the default location is optional.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be loaded.
    pub fn load_config(&self) -> color_eyre::Result<VerifierConfig> {
        let mut config = match &self.config {
            Some(path) => VerifierConfig::from_file(path)?,
            None => {
                let path = default_config_path();
                if path.exists() {
                    VerifierConfig::from_file(&path)?
                } else {
                    VerifierConfig::default()
                }
            }
        };

        if let Some(key) = &self.blockfrost_api_key {
            config.primary.api_key = Some(key.clone());
        }
        config.log_level.clone_from(&self.log_level);

        Ok(config.with_env_overrides())
    }
}
