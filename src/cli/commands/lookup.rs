//! Lookup command - query a persisted chunk store

use crate::cli::output::{colors, format_chunk_line};
use crate::cli::OutputFormat;
use crate::core::config::{Config, StorageBackend};
use crate::core::storage::{ChunkStore, TantivyChunkStore};
use crate::core::types::{ChunkRecord, SourceKind};
use clap::Args;
use serde::Serialize;

/// Arguments for the lookup command
#[derive(Args, Debug)]
pub struct LookupArgs {
    /// Source kind whose chunks to query (file, thread, ...)
    #[arg(long, short = 'k')]
    pub kind: SourceKind,

    /// Tenant scope to search within
    #[arg(long, short = 's')]
    pub space: String,

    /// Exact word (3-4 characters)
    #[arg(long, short = 'w', conflicts_with = "fragment", required_unless_present = "fragment")]
    pub word: Option<String>,

    /// Skip-gram fragment
    #[arg(long, short = 'f')]
    pub fragment: Option<String>,
}

/// Which bucket a lookup reads
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "bucket", content = "token", rename_all = "snake_case")]
pub enum LookupKey {
    ExactWord(String),
    SkipFragment(String),
}

impl LookupArgs {
    /// Lookup key, lowercased the same way tokens are
    pub fn key(&self) -> Result<LookupKey, Box<dyn std::error::Error>> {
        match (&self.word, &self.fragment) {
            (Some(word), None) => Ok(LookupKey::ExactWord(word.trim().to_lowercase())),
            (None, Some(fragment)) => Ok(LookupKey::SkipFragment(fragment.trim().to_lowercase())),
            _ => Err("Pass exactly one of --word or --fragment".into()),
        }
    }
}

/// Lookup response
#[derive(Debug, Serialize)]
pub struct LookupResponse {
    pub collection: String,
    pub space: String,
    pub key: LookupKey,
    pub total_results: usize,
    pub results: Vec<ChunkRecord>,
}

/// Run one lookup against `store`
pub async fn lookup(
    store: &dyn ChunkStore,
    space: &str,
    key: LookupKey,
) -> crate::core::error::Result<LookupResponse> {
    let results = match &key {
        LookupKey::ExactWord(word) => store.find_by_exact_word(space, word).await?,
        LookupKey::SkipFragment(fragment) => store.find_by_skip_fragment(space, fragment).await?,
    };

    Ok(LookupResponse {
        collection: store.collection().to_string(),
        space: space.to_string(),
        key,
        total_results: results.len(),
        results,
    })
}

/// Execute the lookup command
pub async fn execute(
    args: LookupArgs,
    config: &Config,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    if config.storage.backend != StorageBackend::Tantivy {
        return Err("lookup reads persisted chunks and needs the tantivy storage backend".into());
    }

    let key = args.key()?;
    let dir = config.storage.index_dir.join(args.kind.chunk_collection());
    let store = TantivyChunkStore::open_read_only(args.kind, &dir)?;

    let response = lookup(&store, &args.space, key).await?;

    match format {
        OutputFormat::Human => {
            if response.results.is_empty() {
                println!("No chunks found in {}", response.collection);
                return Ok(());
            }

            for record in &response.results {
                println!("{}", format_chunk_line(record));
            }
            println!();
            println!(
                "{} {} in {}",
                colors::label("Matches:"),
                colors::number(&response.total_results.to_string()),
                response.collection
            );
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
    }

    Ok(())
}
