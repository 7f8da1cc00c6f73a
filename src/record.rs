//! Captured log records and their severity scale.

use std::fmt;

use chrono::{Local, TimeZone};
use serde::{Deserialize, Serialize};

/// Marker appended to a message that was cut to fit the per-record bound.
pub const ELLIPSIS: char = '…';

/// Log urgency, ordered from least to most urgent.
///
/// The numeric codes are the ones producers put on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Verbose = 2,
    Debug = 3,
    Info = 4,
    Warn = 5,
    Error = 6,
    Assert = 7,
}

impl Severity {
    pub const ALL: [Severity; 6] = [
        Severity::Verbose,
        Severity::Debug,
        Severity::Info,
        Severity::Warn,
        Severity::Error,
        Severity::Assert,
    ];

    /// Exact lookup of a wire code.
    pub fn from_code(code: i32) -> Option<Severity> {
        Self::ALL.into_iter().find(|s| s.code() == code)
    }

    /// Wire code lookup that falls back to [`Severity::Info`] for unknown codes.
    pub fn from_code_lenient(code: i32) -> Severity {
        Self::from_code(code).unwrap_or(Severity::Info)
    }

    pub fn code(self) -> i32 {
        self as i32
    }

    /// Single-letter label (`V`, `D`, `I`, `W`, `E`, `A`).
    pub fn label(self) -> char {
        match self {
            Severity::Verbose => 'V',
            Severity::Debug => 'D',
            Severity::Info => 'I',
            Severity::Warn => 'W',
            Severity::Error => 'E',
            Severity::Assert => 'A',
        }
    }

    pub fn from_char(c: char) -> Option<Severity> {
        Self::ALL.into_iter().find(|s| s.label() == c)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Verbose => "VERBOSE",
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
            Severity::Assert => "ASSERT",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    /// Accepts full names (any case), single-letter labels, or numeric codes.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(code) = trimmed.parse::<i32>() {
            return Severity::from_code(code).ok_or_else(|| format!("unknown severity code {code}"));
        }
        let mut chars = trimmed.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            if let Some(sev) = Severity::from_char(c.to_ascii_uppercase()) {
                return Ok(sev);
            }
        }
        Severity::ALL
            .into_iter()
            .find(|sev| sev.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| format!("unknown severity {trimmed:?}"))
    }
}

/// One captured log line. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogRecord {
    producer_id: String,
    tag: String,
    message: String,
    severity: Severity,
    timestamp_ms: u64,
    truncated: bool,
}

impl LogRecord {
    /// Build a record, cutting `message` to at most `max_message_chars` characters.
    pub fn new(
        producer_id: impl Into<String>,
        tag: impl Into<String>,
        message: impl Into<String>,
        severity: Severity,
        timestamp_ms: u64,
        max_message_chars: usize,
    ) -> Self {
        let (message, truncated) = truncate_message(message.into(), max_message_chars);
        Self {
            producer_id: producer_id.into(),
            tag: tag.into(),
            message,
            severity,
            timestamp_ms,
            truncated,
        }
    }

    pub fn producer_id(&self) -> &str {
        &self.producer_id
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    /// Milliseconds since Unix epoch.
    pub fn timestamp_ms(&self) -> u64 {
        self.timestamp_ms
    }

    /// True when the message was cut and ends with [`ELLIPSIS`].
    pub fn truncated(&self) -> bool {
        self.truncated
    }

    /// `[producer][SEVERITY] tag: message`, the form mirrored onto the live bus.
    pub fn render_line(&self) -> String {
        format!(
            "[{}][{}] {}: {}",
            self.producer_id, self.severity, self.tag, self.message
        )
    }

    /// Local wall-clock time as `HH:MM:SS.mmm`.
    pub fn formatted_time(&self) -> String {
        i64::try_from(self.timestamp_ms)
            .ok()
            .and_then(|ms| Local.timestamp_millis_opt(ms).single())
            .map(|dt| dt.format("%H:%M:%S%.3f").to_string())
            .unwrap_or_else(|| "--:--:--.---".to_string())
    }

    /// `HH:MM:SS.mmm [L] tag: message`, the viewer's one-line form.
    pub fn display_line(&self) -> String {
        format!(
            "{} [{}] {}: {}",
            self.formatted_time(),
            self.severity.label(),
            self.tag,
            self.message
        )
    }
}

/// Cut `message` to `max_chars` characters, the last of which becomes [`ELLIPSIS`].
pub(crate) fn truncate_message(message: String, max_chars: usize) -> (String, bool) {
    let Some((cut, _)) = message.char_indices().nth(max_chars) else {
        return (message, false);
    };
    if max_chars == 0 {
        return (String::new(), true);
    }
    // `cut` is the byte offset of char number `max_chars`; step back one char for the marker.
    let keep = message[..cut]
        .char_indices()
        .last()
        .map(|(idx, _)| idx)
        .unwrap_or(0);
    let mut out = String::with_capacity(keep + ELLIPSIS.len_utf8());
    out.push_str(&message[..keep]);
    out.push(ELLIPSIS);
    (out, true)
}
