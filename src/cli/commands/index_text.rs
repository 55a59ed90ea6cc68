//! Index-text command - show the chunks and token buckets of a text

use crate::cli::output::{colors, format_tokens};
use crate::cli::OutputFormat;
use crate::core::indexer::compute_text_chunks;
use crate::core::types::LineChunk;
use clap::Args;
use serde::Serialize;
use std::io::Read;

/// Fragments shown per line in human output
const FRAGMENT_PREVIEW: usize = 12;

/// Arguments for the index-text command
#[derive(Args, Debug)]
pub struct IndexTextArgs {
    /// Text to index (reads stdin when omitted)
    pub text: Option<String>,
}

/// Index-text response
#[derive(Debug, Serialize)]
pub struct IndexTextResponse {
    pub total_chunks: usize,
    pub chunks: Vec<LineChunk>,
}

/// Build the response for `text`
pub fn index_text(text: &str) -> IndexTextResponse {
    let chunks: Vec<LineChunk> = compute_text_chunks(text).collect();
    IndexTextResponse {
        total_chunks: chunks.len(),
        chunks,
    }
}

/// Execute the index-text command
pub async fn execute(
    args: IndexTextArgs,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let text = match args.text {
        Some(text) => text,
        None => {
            let mut buffer = String::new();
            std::io::stdin().read_to_string(&mut buffer)?;
            buffer
        }
    };

    let response = index_text(&text);

    match format {
        OutputFormat::Human => {
            for chunk in &response.chunks {
                println!(
                    "{} {}",
                    colors::number(&format!("{:>4}", chunk.line_number)),
                    chunk.line_text
                );
                println!(
                    "     {} {}",
                    colors::dim("exact:"),
                    colors::token(&format_tokens(&chunk.index.exact_words, usize::MAX))
                );
                println!(
                    "     {} {}",
                    colors::dim("fragments:"),
                    colors::token(&format_tokens(&chunk.index.skip_fragments, FRAGMENT_PREVIEW))
                );
            }
            println!();
            println!(
                "{} {}",
                colors::label("Chunks:"),
                colors::number(&response.total_chunks.to_string())
            );
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
    }

    Ok(())
}
