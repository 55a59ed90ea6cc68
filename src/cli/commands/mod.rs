//! CLI command implementations
//!
//! Each command module handles argument parsing and execution for a specific CLI command.

pub mod completions;
pub mod config;
pub mod index_text;
pub mod lookup;
pub mod watch;

// Re-export argument types for use in mod.rs
pub use completions::CompletionsArgs;
pub use config::ConfigArgs;
pub use index_text::IndexTextArgs;
pub use lookup::LookupArgs;
pub use watch::WatchArgs;
