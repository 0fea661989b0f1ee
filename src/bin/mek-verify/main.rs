//! mek-verify CLI entry point.

mod cli;

use clap::Parser;
use cli::{Cli, Command};
use mek_verify::ledger::LedgerSnapshot;
use mek_verify::{BatchEntry, ClaimedToken, MemoryStore, VerifierBuilder};
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    let cli = Cli::parse();

    // Logs go to stderr; stdout carries the JSON result.
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    if cli.json_logs {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr))
            .with(filter)
            .init();
    }

    info!("mek-verify v{}", env!("CARGO_PKG_VERSION"));

    let config = cli.load_config()?;
    let store = Arc::new(load_ledger(cli.ledger.as_deref())?);
    let verifier = VerifierBuilder::new(config).store(store.clone()).build()?;

    let output = match cli.command {
        Command::Verify {
            identity,
            address_hint,
            claims,
        } => {
            let claims: Vec<ClaimedToken> = match claims {
                Some(path) => read_json(&path)?,
                None => Vec::new(),
            };
            let result = verifier
                .verify_ownership(&identity, address_hint.as_deref(), &claims)
                .await;
            serde_json::to_string_pretty(&result)?
        }
        Command::Batch { input } => {
            let entries: Vec<BatchEntry> = read_json(&input)?;
            serde_json::to_string_pretty(&verifier.verify_batch(&entries).await)?
        }
        Command::Status { identity } => {
            serde_json::to_string_pretty(&verifier.verification_status(&identity).await?)?
        }
    };
    println!("{output}");

    if let Some(path) = &cli.ledger {
        store.snapshot().to_file(path)?;
        info!("Ledger snapshot written to {}", path.display());
    }

    Ok(())
}

fn load_ledger(path: Option<&Path>) -> color_eyre::Result<MemoryStore> {
    match path {
        Some(path) if path.exists() => {
            let snapshot = LedgerSnapshot::from_file(path)?;
            info!(
                "Loaded {} ownership records from {}",
                snapshot.records.len(),
                path.display()
            );
            Ok(MemoryStore::from_snapshot(snapshot))
        }
        _ => Ok(MemoryStore::new()),
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> color_eyre::Result<T> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}
