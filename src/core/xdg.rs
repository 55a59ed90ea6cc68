//! XDG Base Directory Support
//!
//! Resolves where skipdex reads its config file and keeps its chunk
//! indexes on Linux/Unix systems.

use std::env;
use std::fs;
use std::path::PathBuf;

/// XDG directory structure for skipdex
#[derive(Debug, Clone)]
pub struct XdgDirs {
    pub config_dir: PathBuf,
    pub data_dir: PathBuf,
}

impl XdgDirs {
    /// Create new XDG directory structure with proper resolution order
    ///
    /// Priority order (highest to lowest):
    /// 1. Explicit SKIPDEX_* env vars
    /// 2. XDG_* environment variables
    /// 3. XDG defaults (~/.config, ~/.local/share)
    pub fn new() -> Self {
        Self {
            config_dir: Self::resolve_config_dir(),
            data_dir: Self::resolve_data_dir(),
        }
    }

    /// Resolve config directory
    fn resolve_config_dir() -> PathBuf {
        if let Ok(dir) = env::var("SKIPDEX_CONFIG_DIR") {
            return PathBuf::from(dir);
        }

        if let Ok(xdg) = env::var("XDG_CONFIG_HOME") {
            return PathBuf::from(xdg).join("skipdex");
        }

        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
            .join("skipdex")
    }

    /// Resolve data directory
    fn resolve_data_dir() -> PathBuf {
        if let Ok(dir) = env::var("SKIPDEX_DATA_DIR") {
            return PathBuf::from(dir);
        }

        if let Ok(xdg) = env::var("XDG_DATA_HOME") {
            return PathBuf::from(xdg).join("skipdex");
        }

        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".local")
            .join("share")
            .join("skipdex")
    }

    /// Get config file path
    pub fn config_file(&self) -> PathBuf {
        // Check SKIPDEX_CONFIG_FILE first (explicit override)
        if let Ok(file) = env::var("SKIPDEX_CONFIG_FILE") {
            return PathBuf::from(file);
        }

        self.config_dir.join("config.toml")
    }

    /// Directory holding one tantivy index per chunk collection
    pub fn chunks_dir(&self) -> PathBuf {
        self.data_dir.join("chunks")
    }

    /// Create all XDG directories if they don't exist
    pub fn ensure_dirs_exist(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.config_dir)?;
        fs::create_dir_all(self.chunks_dir())?;
        Ok(())
    }

    /// Log the resolved XDG paths
    pub fn log_paths(&self) {
        tracing::info!("XDG directories resolved:");
        tracing::info!("  Config: {:?}", self.config_dir);
        tracing::info!("  Data: {:?}", self.data_dir);
        tracing::info!("  Config file: {:?}", self.config_file());
        tracing::info!("  Chunks: {:?}", self.chunks_dir());
    }
}

impl Default for XdgDirs {
    fn default() -> Self {
        Self::new()
    }
}
