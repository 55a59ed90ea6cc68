//! CLI adapter for skipdex
//!
//! Drives the indexing pipeline from the command line. Depends on
//! `core/`; nothing in `core/` depends on it.
//!
//! ```text
//! +------------------+
//! |      cli/        |  watch, lookup, index-text, show-config
//! |  (clap adapter)  |
//! +--------+---------+
//!          |
//!          v
//! +------------------+
//! |     core/        |
//! |  (domain logic)  |
//! +------------------+
//! ```

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};

/// skipdex - Reactive fuzzy-text indexing
///
/// Keeps per-line token indexes (exact short words and skip-gram
/// fragments) in step with changing documents, for typo-tolerant
/// substring search.
#[derive(Parser, Debug)]
#[command(name = "skipdex")]
#[command(version)]
#[command(about = "Reactive fuzzy-text indexing pipeline", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output format
    #[arg(long, global = true, default_value = "human")]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output (default)
    #[default]
    Human,
    /// JSON output for scripting
    Json,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the maintainers over a JSON-lines mutation log
    Watch(commands::WatchArgs),

    /// Look up chunks by exact word or skip-gram fragment
    Lookup(commands::LookupArgs),

    /// Show the chunks and token buckets computed for a text
    #[command(name = "index-text")]
    IndexText(commands::IndexTextArgs),

    /// Show current configuration
    #[command(name = "show-config")]
    ShowConfig(commands::ConfigArgs),

    /// Generate shell completion scripts
    ///
    /// Output completion script to stdout. To install:
    ///
    ///   bash:  skipdex completions bash > ~/.local/share/bash-completion/completions/skipdex
    ///   zsh:   skipdex completions zsh > ~/.zfunc/_skipdex
    ///   fish:  skipdex completions fish > ~/.config/fish/completions/skipdex.fish
    Completions(commands::CompletionsArgs),
}

/// Run the CLI with the provided arguments
pub async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    use crate::core::config::Config;
    use crate::core::services::Services;
    use crate::core::xdg::XdgDirs;
    use std::sync::Arc;

    // Commands that need no configuration
    let command = match cli.command {
        Commands::Completions(args) => return commands::completions::execute(args),
        Commands::IndexText(args) => return commands::index_text::execute(args, cli.format).await,
        other => other,
    };

    // Initialize XDG directories
    let xdg = XdgDirs::new();
    xdg.ensure_dirs_exist()?;
    xdg.log_paths();

    // Load configuration
    let config = Config::load_with_xdg(&xdg)?;
    config.log_config();

    // Execute command
    match command {
        Commands::Watch(args) => {
            let services = Arc::new(Services::new(config)?);
            commands::watch::execute(args, &services, cli.format).await
        }
        Commands::Lookup(args) => commands::lookup::execute(args, &config, cli.format).await,
        Commands::ShowConfig(args) => commands::config::execute(args, &config, cli.format).await,
        Commands::Completions(_) | Commands::IndexText(_) => unreachable!(), // Handled above
    }
}
