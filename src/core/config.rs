//! Configuration management for the skipdex pipeline.
//!
//! This module handles loading configuration from TOML files and
//! environment variables, with sensible defaults for all settings.

use crate::core::error::{Result, SkipdexError};
use crate::core::types::SourceKind;
use crate::core::xdg::XdgDirs;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Tantivy refuses writer budgets below this per indexing thread
pub const MIN_WRITER_HEAP_MB: usize = 15;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub maintainers: MaintainersConfig,
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Which maintainers run and how they are supervised
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MaintainersConfig {
    /// Source kinds to watch
    #[serde(default = "default_sources")]
    pub sources: Vec<SourceKind>,

    /// Pause before restarting a maintainer that failed
    #[serde(default = "default_restart_delay_ms")]
    pub restart_delay_ms: u64,
}

/// Change feed subscription settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FeedConfig {
    /// Events queued per subscriber before writers wait for it
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Upper bound on one subscribe attempt
    #[serde(default = "default_subscribe_timeout_ms")]
    pub subscribe_timeout_ms: u64,

    /// First reconnect delay (doubles per failed attempt)
    #[serde(default = "default_reconnect_initial_ms")]
    pub reconnect_initial_ms: u64,

    /// Reconnect delay ceiling
    #[serde(default = "default_reconnect_max_ms")]
    pub reconnect_max_ms: u64,
}

/// Chunk store backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Tantivy,
    Memory,
}

impl std::str::FromStr for StorageBackend {
    type Err = SkipdexError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "tantivy" => Ok(StorageBackend::Tantivy),
            "memory" => Ok(StorageBackend::Memory),
            other => Err(SkipdexError::ConfigError(format!(
                "Unknown storage backend '{other}'"
            ))),
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    /// Root directory for chunk indexes
    #[serde(default = "default_index_dir")]
    pub index_dir: PathBuf,

    /// Tantivy writer memory budget per chunk collection
    #[serde(default = "default_writer_heap_mb")]
    pub writer_heap_mb: usize,
}

impl StorageConfig {
    pub fn writer_heap_bytes(&self) -> usize {
        self.writer_heap_mb * 1_000_000
    }
}

// Default value functions
fn default_sources() -> Vec<SourceKind> {
    SourceKind::default_enabled()
}

fn default_restart_delay_ms() -> u64 {
    1_000
}

fn default_channel_capacity() -> usize {
    1_024
}

fn default_subscribe_timeout_ms() -> u64 {
    5_000
}

fn default_reconnect_initial_ms() -> u64 {
    100
}

fn default_reconnect_max_ms() -> u64 {
    30_000
}

fn default_index_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_writer_heap_mb() -> usize {
    50
}

impl Default for MaintainersConfig {
    fn default() -> Self {
        Self {
            sources: default_sources(),
            restart_delay_ms: default_restart_delay_ms(),
        }
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
            subscribe_timeout_ms: default_subscribe_timeout_ms(),
            reconnect_initial_ms: default_reconnect_initial_ms(),
            reconnect_max_ms: default_reconnect_max_ms(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            index_dir: default_index_dir(),
            writer_heap_mb: default_writer_heap_mb(),
        }
    }
}

impl Config {
    /// Load configuration from TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| SkipdexError::ConfigError(format!("Failed to read config file: {e}")))?;

        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load config with priority: env vars > TOML > defaults
    pub fn load() -> Result<Self> {
        let xdg = XdgDirs::new();
        Self::load_with_xdg(&xdg)
    }

    /// Load config with explicit XDG directories
    ///
    /// Priority order:
    /// 1. SKIPDEX_CONFIG env var
    /// 2. XDG config file (~/.config/skipdex/config.toml)
    /// 3. ./skipdex.toml
    /// 4. Defaults
    pub fn load_with_xdg(xdg: &XdgDirs) -> Result<Self> {
        let mut config = if let Ok(config_path) = env::var("SKIPDEX_CONFIG") {
            Self::from_file(config_path)?
        } else {
            let xdg_config = xdg.config_file();
            if xdg_config.exists() {
                Self::from_file(xdg_config)?
            } else if Path::new("skipdex.toml").exists() {
                Self::from_file("skipdex.toml")?
            } else {
                Self::default()
            }
        };

        // Use the XDG data directory unless a location was chosen explicitly
        if env::var("SKIPDEX_DATA_DIR").is_err() && config.storage.index_dir == default_index_dir()
        {
            config.storage.index_dir = xdg.chunks_dir();
        }

        config.merge_env();
        config.validate()?;

        Ok(config)
    }

    /// Merge configuration with environment variables
    pub fn merge_env(&mut self) {
        // Maintainers configuration
        if let Ok(sources) = env::var("SKIPDEX_SOURCES") {
            match parse_sources(&sources) {
                Ok(kinds) => self.maintainers.sources = kinds,
                Err(e) => tracing::warn!("Ignoring SKIPDEX_SOURCES: {}", e),
            }
        }
        if let Ok(delay) = env::var("SKIPDEX_RESTART_DELAY_MS") {
            if let Ok(ms) = delay.parse() {
                self.maintainers.restart_delay_ms = ms;
            }
        }

        // Feed configuration
        if let Ok(capacity) = env::var("SKIPDEX_CHANNEL_CAPACITY") {
            if let Ok(c) = capacity.parse() {
                self.feed.channel_capacity = c;
            }
        }
        if let Ok(timeout) = env::var("SKIPDEX_SUBSCRIBE_TIMEOUT_MS") {
            if let Ok(ms) = timeout.parse() {
                self.feed.subscribe_timeout_ms = ms;
            }
        }
        if let Ok(initial) = env::var("SKIPDEX_RECONNECT_INITIAL_MS") {
            if let Ok(ms) = initial.parse() {
                self.feed.reconnect_initial_ms = ms;
            }
        }
        if let Ok(max) = env::var("SKIPDEX_RECONNECT_MAX_MS") {
            if let Ok(ms) = max.parse() {
                self.feed.reconnect_max_ms = ms;
            }
        }

        // Storage configuration
        if let Ok(backend) = env::var("SKIPDEX_STORAGE_BACKEND") {
            match backend.parse() {
                Ok(b) => self.storage.backend = b,
                Err(e) => tracing::warn!("Ignoring SKIPDEX_STORAGE_BACKEND: {}", e),
            }
        }
        if let Ok(data_dir) = env::var("SKIPDEX_DATA_DIR") {
            self.storage.index_dir = PathBuf::from(data_dir).join("chunks");
        }
        if let Ok(heap) = env::var("SKIPDEX_WRITER_HEAP_MB") {
            if let Ok(mb) = heap.parse() {
                self.storage.writer_heap_mb = mb;
            }
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        // Validate maintainers config
        if self.maintainers.sources.is_empty() {
            return Err(SkipdexError::ConfigError(
                "At least one source must be enabled".to_string(),
            ));
        }

        let mut seen = Vec::with_capacity(self.maintainers.sources.len());
        for kind in &self.maintainers.sources {
            if seen.contains(kind) {
                return Err(SkipdexError::ConfigError(format!(
                    "Source '{kind}' is listed more than once"
                )));
            }
            seen.push(*kind);
        }

        if self.maintainers.restart_delay_ms == 0 {
            return Err(SkipdexError::ConfigError(
                "Restart delay must be non-zero".to_string(),
            ));
        }

        // Validate feed config
        if self.feed.channel_capacity == 0 {
            return Err(SkipdexError::ConfigError(
                "Channel capacity must be non-zero".to_string(),
            ));
        }

        if self.feed.subscribe_timeout_ms == 0 {
            return Err(SkipdexError::ConfigError(
                "Subscribe timeout must be non-zero".to_string(),
            ));
        }

        if self.feed.reconnect_initial_ms == 0 {
            return Err(SkipdexError::ConfigError(
                "Initial reconnect delay must be non-zero".to_string(),
            ));
        }

        if self.feed.reconnect_initial_ms > self.feed.reconnect_max_ms {
            return Err(SkipdexError::ConfigError(
                "Initial reconnect delay cannot exceed the maximum".to_string(),
            ));
        }

        // Validate storage config
        if self.storage.backend == StorageBackend::Tantivy
            && self.storage.writer_heap_mb < MIN_WRITER_HEAP_MB
        {
            return Err(SkipdexError::ConfigError(format!(
                "Writer heap must be at least {MIN_WRITER_HEAP_MB} MB"
            )));
        }

        Ok(())
    }

    /// Log configuration
    pub fn log_config(&self) {
        let sources: Vec<&str> = self.maintainers.sources.iter().map(|k| k.as_str()).collect();

        tracing::info!("Configuration loaded:");
        tracing::info!("  Sources: {}", sources.join(", "));
        tracing::info!("  Restart delay: {}ms", self.maintainers.restart_delay_ms);
        tracing::info!("  Channel capacity: {}", self.feed.channel_capacity);
        tracing::info!("  Subscribe timeout: {}ms", self.feed.subscribe_timeout_ms);
        tracing::info!(
            "  Reconnect backoff: {}ms..{}ms",
            self.feed.reconnect_initial_ms,
            self.feed.reconnect_max_ms
        );
        tracing::info!("  Storage backend: {:?}", self.storage.backend);
        tracing::info!("  Index dir: {:?}", self.storage.index_dir);
        tracing::info!("  Writer heap: {} MB", self.storage.writer_heap_mb);
    }
}

/// Parse a comma separated source list (`file,thread,chat-message`)
pub fn parse_sources(list: &str) -> Result<Vec<SourceKind>> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::parse)
        .collect()
}
