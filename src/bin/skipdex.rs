//! skipdex - command-line driver for the indexing pipeline
//!
//! # Examples
//!
//! ```bash
//! # Replay a mutation log through the maintainers
//! skipdex watch --input changes.jsonl
//!
//! # Fuzzy lookup in the persisted file chunks
//! skipdex lookup --kind file --space s1 --fragment earch
//!
//! # Inspect how a text is chunked and indexed
//! echo "The cat sat" | skipdex index-text
//! ```

use clap::Parser;
use skipdex::cli::{run, Cli};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Logs go to stderr so stdout stays clean for command output.
/// `RUST_LOG` overrides the filter; `SKIPDEX_LOG_FORMAT=json` switches
/// to one JSON object per line.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "skipdex=info".into());
    let json = std::env::var("SKIPDEX_LOG_FORMAT").is_ok_and(|format| format == "json");

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() {
    init_logging();
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
