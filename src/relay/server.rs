//! Unix-socket front end for the relay.
//!
//! Each accepted connection runs in its own task and reads newline-delimited
//! frames. Nothing is ever written back: failures on one connection are
//! counted in [`RelayHealth`](super::RelayHealth) and end only that connection.
//! Unparseable frames and frames over the byte limit are skipped; the
//! connection keeps reading from the next newline.

use std::ops::ControlFlow;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use futures::StreamExt;
use tokio::net::{UnixListener, UnixStream};
use tokio::task::JoinSet;
use tokio_util::codec::{Decoder, FramedRead, LinesCodec, LinesCodecError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::relay::{LogRelay, RelayFrame};

/// Pause after a failed `accept` so a persistent error does not spin.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

/// Per-connection limits.
#[derive(Debug, Clone, Copy)]
pub struct ServerSettings {
    /// A connection with no complete frame for this long is closed.
    pub idle_timeout: Duration,
    /// Longest accepted frame, in bytes, excluding the newline.
    pub max_frame_bytes: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(30),
            max_frame_bytes: 64 * 1024,
        }
    }
}

/// One decoded unit from a producer connection.
#[derive(Debug, PartialEq, Eq)]
enum Inbound {
    Line(String),
    /// A line over the byte limit; the codec discards it up to its newline.
    Oversized,
    /// A complete line that is not UTF-8.
    NotUtf8,
}

/// [`LinesCodec`] that reports bad lines as items, so `FramedRead` keeps going.
struct FrameCodec {
    lines: LinesCodec,
}

impl FrameCodec {
    fn new(max_frame_bytes: usize) -> Self {
        Self {
            lines: LinesCodec::new_with_max_length(max_frame_bytes),
        }
    }

    fn lift(
        decoded: Result<Option<String>, LinesCodecError>,
    ) -> Result<Option<Inbound>, std::io::Error> {
        match decoded {
            Ok(line) => Ok(line.map(Inbound::Line)),
            Err(LinesCodecError::MaxLineLengthExceeded) => Ok(Some(Inbound::Oversized)),
            Err(LinesCodecError::Io(e)) if e.kind() == std::io::ErrorKind::InvalidData => {
                Ok(Some(Inbound::NotUtf8))
            }
            Err(LinesCodecError::Io(e)) => Err(e),
        }
    }
}

impl Decoder for FrameCodec {
    type Item = Inbound;
    type Error = std::io::Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Inbound>, std::io::Error> {
        Self::lift(self.lines.decode(buf))
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Inbound>, std::io::Error> {
        Self::lift(self.lines.decode_eof(buf))
    }
}

/// Bind `socket_path` and serve until `shutdown` is cancelled.
///
/// A stale socket file at the path is replaced, and the file is removed again
/// on the way out.
///
/// # Errors
///
/// Returns an error if the socket cannot be bound or the stale file cannot be
/// removed.
pub async fn serve(
    socket_path: impl AsRef<Path>,
    relay: Arc<LogRelay>,
    settings: ServerSettings,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    let path = socket_path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    if path.exists() {
        tokio::fs::remove_file(path).await?;
    }

    let listener = UnixListener::bind(path)?;
    info!(path = %path.display(), "Log relay listening");

    serve_listener(listener, relay, settings, shutdown).await;

    if let Err(e) = tokio::fs::remove_file(path).await {
        debug!(path = %path.display(), error = %e, "socket file already gone");
    }
    info!(path = %path.display(), "Log relay stopped");
    Ok(())
}

/// Accept loop over an already bound listener.
pub async fn serve_listener(
    listener: UnixListener,
    relay: Arc<LogRelay>,
    settings: ServerSettings,
    shutdown: CancellationToken,
) {
    let mut connections = JoinSet::new();
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            res = listener.accept() => match res {
                Ok((stream, _addr)) => {
                    connections.spawn(handle_connection(
                        stream,
                        Arc::clone(&relay),
                        settings,
                        shutdown.child_token(),
                    ));
                }
                Err(e) => {
                    relay.health().transport_failure();
                    error!(error = %e, "Failed to accept producer connection");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                }
            },
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
        }
    }

    // Connection tasks observe the same token and wind down on their own.
    while connections.join_next().await.is_some() {}
}

/// Read frames from one producer until it disconnects, idles out or the
/// relay shuts down.
pub async fn handle_connection(
    stream: UnixStream,
    relay: Arc<LogRelay>,
    settings: ServerSettings,
    shutdown: CancellationToken,
) {
    let health = relay.health();
    health.connection_opened();
    debug!("Producer connected");

    let mut frames = FramedRead::new(stream, FrameCodec::new(settings.max_frame_bytes));

    loop {
        let next = tokio::select! {
            _ = shutdown.cancelled() => break,
            next = tokio::time::timeout(settings.idle_timeout, frames.next()) => next,
        };

        match next {
            Err(_elapsed) => {
                health.idle_timeout();
                debug!(idle = ?settings.idle_timeout, "Closing idle producer connection");
                break;
            }
            Ok(None) => break,
            Ok(Some(Ok(Inbound::Line(line)))) => {
                if line.trim().is_empty() {
                    continue;
                }
                if dispatch(&relay, &line).is_break() {
                    break;
                }
            }
            Ok(Some(Ok(Inbound::Oversized))) => {
                health.oversized_frame();
                warn!(
                    max_frame_bytes = settings.max_frame_bytes,
                    "Skipping oversized frame"
                );
            }
            Ok(Some(Ok(Inbound::NotUtf8))) => {
                health.malformed_frame();
                debug!("Skipping frame that is not UTF-8");
            }
            Ok(Some(Err(e))) => {
                health.transport_failure();
                warn!(error = %e, "Producer connection failed");
                break;
            }
        }
    }

    health.connection_closed();
    debug!("Producer connection closed");
}

fn dispatch(relay: &LogRelay, line: &str) -> ControlFlow<()> {
    let frame = match RelayFrame::decode(line) {
        Ok(frame) => frame,
        Err(err) => {
            relay.health().malformed_frame();
            debug!(error = %err, "Skipping malformed frame");
            return ControlFlow::Continue(());
        }
    };

    match frame {
        RelayFrame::Register { producer_id } => match relay.register(&producer_id) {
            Ok(new) => {
                debug!(producer = %producer_id, new, "Producer registered");
                ControlFlow::Continue(())
            }
            Err(err) => {
                warn!(error = %err, "Closing connection with malformed identity");
                ControlFlow::Break(())
            }
        },
        RelayFrame::Submit(submission) => {
            // Producers get no reply; the relay has already counted a rejection.
            let _ = relay.submit(submission);
            ControlFlow::Continue(())
        }
    }
}
