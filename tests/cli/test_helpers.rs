//! CLI test helpers
//!
//! - JSON-lines mutation builders
//! - Arc<Services> wrappers matching CLI execute() signatures

use serde_json::json;
use skipdex::core::config::{Config, StorageBackend};
use skipdex::core::services::Services;
use std::sync::Arc;
use tempfile::TempDir;

/// Tantivy-backed services wrapped in Arc, plus the config they were built from
pub fn create_cli_test_services() -> (Arc<Services>, Config, TempDir) {
    create_cli_test_services_with(|_| {})
}

/// Same as [`create_cli_test_services`], with a config tweak applied first
pub fn create_cli_test_services_with(
    configure: impl FnOnce(&mut Config),
) -> (Arc<Services>, Config, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let mut config = Config::default();
    config.storage.backend = StorageBackend::Tantivy;
    config.storage.index_dir = temp_dir.path().to_path_buf();
    config.storage.writer_heap_mb = 15;
    config.maintainers.restart_delay_ms = 10;
    configure(&mut config);

    let services = Arc::new(Services::new(config.clone()).expect("Failed to create services"));
    (services, config, temp_dir)
}

/// Insert mutation line
pub fn insert_line(collection: &str, id: &str, space: &str, text: &str) -> String {
    json!({
        "collection": collection,
        "op": "insert",
        "document": { "_id": id, "space": space, "text": text }
    })
    .to_string()
}

/// Update mutation line setting `text`
pub fn update_line(collection: &str, id: &str, text: &str) -> String {
    json!({
        "collection": collection,
        "op": "update",
        "id": id,
        "set": { "text": text }
    })
    .to_string()
}

/// Delete mutation line
pub fn delete_line(collection: &str, id: &str) -> String {
    json!({ "collection": collection, "op": "delete", "id": id }).to_string()
}

/// Join lines into a mutation log
pub fn mutation_log(lines: &[String]) -> String {
    let mut log = lines.join("\n");
    log.push('\n');
    log
}
