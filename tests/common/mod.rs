use std::fs;
use std::path::PathBuf;
use stickllm::config::{GenerationConfig, ServerConfig};
use stickllm::storage::SqliteStorage;
use stickllm::LlamaCppProvider;
use tempfile::TempDir;

#[allow(dead_code)]
pub fn create_temp_storage() -> (SqliteStorage, TempDir) {
    let tmp = TempDir::new().expect("failed to create tempdir");
    let db_path = tmp.path().join("sessions.db");
    let storage =
        SqliteStorage::new_with_path(db_path).expect("failed to create sqlite storage with path");
    (storage, tmp)
}

#[allow(dead_code)]
pub fn temp_config_file(contents: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("failed to create tempdir");
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(&config_path, contents).expect("failed to write config file");
    (temp_dir, config_path)
}

/// Provider pointed at a mock server with short timeouts
#[allow(dead_code)]
pub fn provider_for(uri: &str) -> LlamaCppProvider {
    let server = ServerConfig {
        url: uri.to_string(),
        timeout: 5,
        health_retries: 3,
        health_wait_seconds: 0,
        health_timeout: 2,
    };
    LlamaCppProvider::new(&server, &GenerationConfig::default()).expect("provider")
}

/// Render a streaming `/completion` body from fragments
#[allow(dead_code)]
pub fn sse_body(fragments: &[&str]) -> String {
    let mut body = String::new();
    for fragment in fragments {
        body.push_str(&format!(
            "data: {}\n\n",
            serde_json::json!({ "content": fragment, "stop": false })
        ));
    }
    body.push_str(&format!(
        "data: {}\n\n",
        serde_json::json!({ "content": "", "stop": true })
    ));
    body
}
