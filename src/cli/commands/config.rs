//! Config command - show the effective configuration

use crate::cli::output::colors;
use crate::cli::OutputFormat;
use crate::core::config::Config;
use crate::core::xdg::XdgDirs;
use clap::Args;
use serde::Serialize;

/// Arguments for the show-config command
#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Also show resolved XDG paths
    #[arg(long, short = 'a')]
    pub all: bool,
}

/// Configuration response
#[derive(Debug, Serialize)]
pub struct ConfigResponse<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_file: Option<String>,
    #[serde(flatten)]
    pub config: &'a Config,
}

/// Execute the show-config command
pub async fn execute(
    args: ConfigArgs,
    config: &Config,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let config_file = args
        .all
        .then(|| XdgDirs::new().config_file().to_string_lossy().into_owned());

    let response = ConfigResponse {
        config_file,
        config,
    };

    match format {
        OutputFormat::Human => print_human(&response),
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
    }

    Ok(())
}

fn print_human(response: &ConfigResponse<'_>) {
    let config = response.config;
    let sources: Vec<&str> = config.maintainers.sources.iter().map(|k| k.as_str()).collect();

    println!("{}", colors::label("Configuration:"));
    if let Some(file) = &response.config_file {
        println!("  config_file: {file}");
    }
    println!("  maintainers:");
    println!("    sources: {}", sources.join(", "));
    println!("    restart_delay_ms: {}", config.maintainers.restart_delay_ms);
    println!("  feed:");
    println!("    channel_capacity: {}", config.feed.channel_capacity);
    println!("    subscribe_timeout_ms: {}", config.feed.subscribe_timeout_ms);
    println!("    reconnect_initial_ms: {}", config.feed.reconnect_initial_ms);
    println!("    reconnect_max_ms: {}", config.feed.reconnect_max_ms);
    println!("  storage:");
    println!("    backend: {:?}", config.storage.backend);
    println!("    index_dir: {}", config.storage.index_dir.display());
    println!("    writer_heap_mb: {}", config.storage.writer_heap_mb);
}
