//! Producer side of the relay socket.
//!
//! [`RelayClient`] writes frames and never reads: the relay does not answer.
//! [`parse_brief_line`] understands logcat's `brief` output so an
//! application's own log stream can be forwarded line by line.

use std::path::Path;
use std::sync::LazyLock;

use futures::SinkExt;
use regex::Regex;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::net::UnixStream;
use tokio_util::codec::{FramedWrite, LinesCodec, LinesCodecError};
use tracing::{debug, trace};

use crate::error::RelayError;
use crate::record::{truncate_message, Severity};
use crate::relay::{RelayFrame, SubmitPolicy, Submission};

/// Tag used by the forwarder's own diagnostics; lines carrying it are never
/// forwarded, so a producer that logs about forwarding cannot feed itself.
pub const FORWARDER_TAG: &str = "logrelay";

/// `L/Tag(  pid): message`
static BRIEF_LINE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^([VDIWEA])/([^(]+)\(\s*\d+\)\s*:\s+(.+)$").ok());

/// One parsed logcat `brief` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BriefLine {
    pub severity: Severity,
    pub tag: String,
    pub message: String,
}

/// Parse `D/MainActivity( 1234): Hello` style lines.
pub fn parse_brief_line(line: &str) -> Option<BriefLine> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let caps = BRIEF_LINE.as_ref()?.captures(line)?;
    let severity = caps.get(1)?.as_str().chars().next().and_then(Severity::from_char)?;
    let tag = caps.get(2)?.as_str().trim();
    let message = caps.get(3)?.as_str();
    if tag.is_empty() || message.is_empty() {
        return None;
    }
    Some(BriefLine {
        severity,
        tag: tag.to_string(),
        message: message.to_string(),
    })
}

/// Counts from one [`RelayClient::forward_brief_lines`] run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ForwardStats {
    pub read: usize,
    pub forwarded: usize,
}

/// Write-only connection to a relay socket.
///
/// Messages are cut to `max_message_chars` before sending, so a frame never
/// outgrows what the relay accepts.
pub struct RelayClient {
    frames: FramedWrite<UnixStream, LinesCodec>,
    max_message_chars: usize,
}

impl RelayClient {
    pub async fn connect(socket_path: impl AsRef<Path>) -> Result<Self, RelayError> {
        let stream = UnixStream::connect(socket_path).await?;
        Ok(Self::from_stream(stream))
    }

    pub fn from_stream(stream: UnixStream) -> Self {
        Self {
            frames: FramedWrite::new(stream, LinesCodec::new()),
            max_message_chars: SubmitPolicy::default().max_message_chars,
        }
    }

    /// Match the relay's configured message bound.
    pub fn with_max_message_chars(mut self, max_message_chars: usize) -> Self {
        self.max_message_chars = max_message_chars;
        self
    }

    pub async fn send(&mut self, frame: &RelayFrame) -> Result<(), RelayError> {
        let line = frame.encode()?;
        self.frames.send(line).await.map_err(codec_error)
    }

    /// Announce `producer_id` to the relay.
    pub async fn register(&mut self, producer_id: &str) -> Result<(), RelayError> {
        self.send(&RelayFrame::Register {
            producer_id: producer_id.to_string(),
        })
        .await
    }

    pub async fn submit(&mut self, mut submission: Submission) -> Result<(), RelayError> {
        let (message, truncated) = truncate_message(submission.message, self.max_message_chars);
        if truncated {
            trace!(max = self.max_message_chars, "message cut before sending");
        }
        submission.message = message;
        self.send(&RelayFrame::Submit(submission)).await
    }

    /// Register as `producer_id`, then forward every parseable `brief` line
    /// from `reader` until it ends.
    pub async fn forward_brief_lines<R>(
        &mut self,
        producer_id: &str,
        reader: R,
    ) -> Result<ForwardStats, RelayError>
    where
        R: AsyncBufRead + Unpin,
    {
        self.register(producer_id).await?;
        let mut stats = ForwardStats::default();
        let mut lines = reader.lines();
        while let Some(line) = lines.next_line().await? {
            stats.read += 1;
            let Some(parsed) = parse_brief_line(&line) else {
                trace!(line = %line, "skipping unparseable line");
                continue;
            };
            if parsed.tag == FORWARDER_TAG {
                continue;
            }
            self.submit(Submission::new(
                producer_id,
                parsed.tag,
                parsed.message,
                parsed.severity,
            ))
            .await?;
            stats.forwarded += 1;
        }
        debug!(read = stats.read, forwarded = stats.forwarded, "forwarding finished");
        Ok(stats)
    }

    /// Flush pending frames and shut the connection down.
    pub async fn close(mut self) -> Result<(), RelayError> {
        SinkExt::<String>::close(&mut self.frames)
            .await
            .map_err(codec_error)
    }
}

fn codec_error(err: LinesCodecError) -> RelayError {
    match err {
        LinesCodecError::Io(e) => RelayError::Transport(e),
        LinesCodecError::MaxLineLengthExceeded => {
            RelayError::InvalidFrame("frame exceeds codec limit".to_string())
        }
    }
}
