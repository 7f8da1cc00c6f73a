//! Integration tests for the logrelay binary.

use std::fs;
use std::process::Command;
use tempfile::TempDir;

fn isolated_command(temp_dir: &TempDir) -> Command {
    let config_home = temp_dir.path().join("config");
    let home = temp_dir.path().join("home");
    fs::create_dir_all(&config_home).unwrap();
    fs::create_dir_all(&home).unwrap();

    let mut command = Command::new(env!("CARGO_BIN_EXE_logrelay"));
    command
        .env("XDG_CONFIG_HOME", config_home.as_os_str())
        .env("HOME", home.as_os_str())
        .env_remove("LOGRELAY_LOG")
        .arg("--workspace")
        .arg(temp_dir.path());
    command
}

#[test]
fn test_config_command_prints_resolved_toml() {
    let temp_dir = TempDir::new().unwrap();
    let socket = temp_dir.path().join("relay.sock");

    let output = isolated_command(&temp_dir)
        .arg("--quiet")
        .arg("--socket")
        .arg(&socket)
        .arg("config")
        .output()
        .unwrap();

    assert!(
        output.status.success(),
        "logrelay config should succeed: stderr={:?}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("[relay]"));
    assert!(stdout.contains(&socket.display().to_string()));
    assert!(stdout.contains("capacity = 5000"));
}

#[test]
fn test_workspace_config_file_is_honored() {
    let temp_dir = TempDir::new().unwrap();
    let config_dir = temp_dir.path().join("config");
    fs::create_dir_all(&config_dir).unwrap();
    fs::write(config_dir.join("config.toml"), "[store]\ncapacity = 77\n").unwrap();

    let output = isolated_command(&temp_dir)
        .arg("--quiet")
        .arg("config")
        .output()
        .unwrap();

    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("capacity = 77"));
}

#[test]
fn test_send_without_relay_fails_cleanly() {
    let temp_dir = TempDir::new().unwrap();
    let output = isolated_command(&temp_dir)
        .arg("--quiet")
        .arg("--socket")
        .arg(temp_dir.path().join("nobody-home.sock"))
        .arg("send")
        .arg("--producer")
        .arg("com.example")
        .arg("hello")
        .output()
        .unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Error"), "stderr should explain the failure: {stderr}");
}

#[test]
fn test_verbose_logging_goes_to_stderr() {
    let temp_dir = TempDir::new().unwrap();
    let output = isolated_command(&temp_dir)
        .arg("--verbose")
        .arg("config")
        .output()
        .unwrap();

    assert!(output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("logrelay starting"), "stderr was: {stderr}");
    assert!(!String::from_utf8_lossy(&output.stdout).contains("logrelay starting"));
}
