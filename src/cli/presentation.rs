//! CLI presentation: formatting of command output. No I/O.

use owo_colors::OwoColorize;

use crate::config::RelayConfig;
use crate::error::ApiError;
use crate::record::Severity;
use crate::relay::HealthSnapshot;

/// Colorize a bus line (`[producer][SEVERITY] tag: message`) by its severity.
pub fn format_live_line(line: &str, color: bool) -> String {
    if !color {
        return line.to_string();
    }
    match line_severity(line) {
        Some(Severity::Verbose) => line.dimmed().to_string(),
        Some(Severity::Debug) => line.blue().to_string(),
        Some(Severity::Info) => line.green().to_string(),
        Some(Severity::Warn) => line.yellow().to_string(),
        Some(Severity::Error) => line.red().to_string(),
        Some(Severity::Assert) => line.red().bold().to_string(),
        None => line.to_string(),
    }
}

/// Severity from the second bracketed field of a rendered line.
fn line_severity(line: &str) -> Option<Severity> {
    let rest = line.strip_prefix('[')?;
    let (_, rest) = rest.split_once("][")?;
    let (severity, _) = rest.split_once(']')?;
    severity.parse().ok()
}

pub fn format_config_toml(config: &RelayConfig) -> Result<String, ApiError> {
    toml::to_string_pretty(config)
        .map_err(|e| ApiError::ConfigError(format!("Failed to render configuration: {}", e)))
}

pub fn format_health_summary(health: &HealthSnapshot) -> String {
    format!(
        "Relay stopped: {} accepted, {} rejected identities, {} truncated, {} malformed frames, {} transport failures, {} connections served",
        health.accepted,
        health.rejected_identity,
        health.truncated,
        health.malformed_frames,
        health.transport_failures,
        health.connections_total,
    )
}
