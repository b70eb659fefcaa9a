//! Export binary - writes a project's translations to a file
//!
//! Usage:
//!   cargo run --bin transloom-export -- <project> <format> <output> [languages]
//!
//! `format` is one of json, json_flat, csv, yaml. `languages` is a
//! comma-separated list of codes; the base language is always included.
//!
//! Reads DATABASE_URL like the server; without it the export comes from an
//! empty in-memory store.

use anyhow::{bail, Context, Result};
use std::fs;
use tracing::info;
use transloom::config::Config;
use transloom::keys::KeyStore;
use transloom::languages::LanguageRegistry;
use transloom::store;
use transloom::transfer::{self, select_languages, Entry, ExportFormat};

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("transloom=info".parse()?),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 4 {
        bail!("Usage: transloom-export <project> <format> <output> [languages]");
    }
    let project = &args[1];
    let format: ExportFormat = args[2].parse()?;
    let output = &args[3];

    let config = Config::from_env()?;
    let store = store::open(&config).await?;
    let keys = KeyStore::new(store.clone());

    let base = keys.values().base_language(project).await?;
    let requested: Vec<String> = match args.get(4) {
        Some(list) => list.split(',').map(|c| c.trim().to_string()).collect(),
        None => LanguageRegistry::new(store)
            .list(project)
            .await?
            .into_iter()
            .map(|l| l.code)
            .collect(),
    };
    let languages = select_languages(&base, &requested);

    let entries: Vec<Entry> = keys.list(project).await?.iter().map(Entry::from).collect();
    info!(
        "Exporting {} keys in {} languages from {}",
        entries.len(),
        languages.len(),
        project
    );

    let file = transfer::export(&entries, &languages, format)?;
    fs::write(output, &file.bytes).with_context(|| format!("Failed to write {}", output))?;
    info!("Wrote {} ({} bytes)", output, file.bytes.len());

    Ok(())
}
