//! Integration tests for Configuration System

use logrelay::config::{ConfigLoader, RelayConfig};
use logrelay::context::Observability;
use std::path::PathBuf;
use tempfile::TempDir;

#[test]
fn test_config_file_drives_context_construction() {
    let temp_dir = TempDir::new().unwrap();
    let config_file = temp_dir.path().join("relay.toml");

    std::fs::write(
        &config_file,
        r#"
[relay]
socket_path = "/tmp/logrelay-test/ide.sock"
max_message_chars = 32
max_frame_bytes = 2048

[store]
capacity = 3

[bus]
subscriber_capacity = 2
"#,
    )
    .unwrap();

    let config = ConfigLoader::load_from_file(&config_file).unwrap();
    let ctx = Observability::new(&config);

    assert_eq!(ctx.store().capacity(), 3);
    assert_eq!(ctx.bus().subscriber_capacity(), 2);
    assert_eq!(ctx.relay().policy().max_message_chars, 32);
    assert_eq!(ctx.socket_path(), PathBuf::from("/tmp/logrelay-test/ide.sock"));
}

#[test]
fn test_invalid_config_reports_every_problem() {
    let temp_dir = TempDir::new().unwrap();
    let config_file = temp_dir.path().join("relay.toml");
    std::fs::write(
        &config_file,
        "[relay]\nmax_message_chars = 8\nmax_frame_bytes = 4\n\n[bus]\nsubscriber_capacity = 0\n",
    )
    .unwrap();

    let err = ConfigLoader::load_from_file(&config_file).unwrap_err();
    let message = err.to_string();
    assert!(message.contains("max_message_chars"), "{message}");
    assert!(message.contains("max_frame_bytes"), "{message}");
    assert!(message.contains("subscriber_capacity"), "{message}");
}

#[test]
fn test_missing_explicit_file_is_an_error() {
    let temp_dir = TempDir::new().unwrap();
    assert!(ConfigLoader::load_from_file(&temp_dir.path().join("absent.toml")).is_err());
}

#[test]
fn test_workspace_without_config_uses_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let config = ConfigLoader::load(temp_dir.path()).unwrap();
    assert_eq!(config.store, RelayConfig::default().store);
    assert_eq!(config.bus, RelayConfig::default().bus);
}
