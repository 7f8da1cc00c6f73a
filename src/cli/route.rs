//! CLI route: single route table and run context.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use futures::StreamExt;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

use crate::cli::parse::Commands;
use crate::cli::presentation::{format_config_toml, format_health_summary, format_live_line};
use crate::config::{ConfigLoader, RelayConfig};
use crate::context::Observability;
use crate::error::ApiError;
use crate::record::Severity;
use crate::relay::client::RelayClient;
use crate::relay::Submission;

/// Runtime context for CLI execution: the resolved configuration.
/// Built from workspace path and optional config path using ConfigLoader only.
pub struct RunContext {
    config: RelayConfig,
    workspace_root: PathBuf,
}

impl RunContext {
    /// Load configuration; `socket` overrides the configured relay socket.
    pub fn new(
        workspace_root: PathBuf,
        config_path: Option<PathBuf>,
        socket: Option<PathBuf>,
    ) -> Result<Self, ApiError> {
        let mut config = if let Some(ref cfg_path) = config_path {
            ConfigLoader::load_from_file(cfg_path)?
        } else {
            ConfigLoader::load(&workspace_root)?
        };
        if socket.is_some() {
            config.relay.socket_path = socket;
        }
        Ok(Self::from_config(config, workspace_root))
    }

    pub fn from_config(config: RelayConfig, workspace_root: PathBuf) -> Self {
        Self {
            config,
            workspace_root,
        }
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    pub fn workspace_root(&self) -> &PathBuf {
        &self.workspace_root
    }

    /// Execute a command, returning the text to print when it finishes.
    pub async fn execute(&self, command: &Commands) -> Result<String, ApiError> {
        match command {
            Commands::Serve { no_color } => self.handle_serve(!no_color).await,
            Commands::Send {
                producer,
                tag,
                severity,
                message,
            } => self.handle_send(producer, tag, *severity, message).await,
            Commands::Forward { producer } => self.handle_forward(producer).await,
            Commands::Config => format_config_toml(&self.config),
        }
    }

    async fn handle_serve(&self, color: bool) -> Result<String, ApiError> {
        let ctx = Arc::new(Observability::new(&self.config));
        let interrupted = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to listen for Ctrl-C; stopping");
            }
        };
        serve_live(ctx, tokio::io::stdout(), color, interrupted).await
    }

    async fn handle_send(
        &self,
        producer: &str,
        tag: &str,
        severity: Severity,
        message: &str,
    ) -> Result<String, ApiError> {
        let socket = self.config.relay.resolve_socket_path();
        debug!(socket = %socket.display(), "Connecting to relay");
        let mut client = RelayClient::connect(&socket)
            .await?
            .with_max_message_chars(self.config.relay.max_message_chars);
        client.register(producer).await?;
        client
            .submit(Submission::new(producer, tag, message, severity))
            .await?;
        client.close().await?;
        Ok(format!("Sent 1 record to {}", socket.display()))
    }

    async fn handle_forward(&self, producer: &str) -> Result<String, ApiError> {
        let socket = self.config.relay.resolve_socket_path();
        let mut client = RelayClient::connect(&socket)
            .await?
            .with_max_message_chars(self.config.relay.max_message_chars);
        let stdin = BufReader::new(tokio::io::stdin());
        let stats = client.forward_brief_lines(producer, stdin).await?;
        client.close().await?;
        Ok(format!(
            "Forwarded {} of {} lines to {}",
            stats.forwarded,
            stats.read,
            socket.display()
        ))
    }
}

/// Run the relay and copy every live line to `out` until `stop` resolves, the
/// server ends, or `out` fails. The relay is shut down on every exit path.
async fn serve_live<W, F>(
    ctx: Arc<Observability>,
    mut out: W,
    color: bool,
    stop: F,
) -> Result<String, ApiError>
where
    W: AsyncWrite + Unpin,
    F: Future<Output = ()>,
{
    let mut live = ctx.bus().subscribe();
    let mut server = tokio::spawn({
        let ctx = Arc::clone(&ctx);
        async move { ctx.serve_relay().await }
    });
    tokio::pin!(stop);

    let mut finished = None;
    let mut output_error = None;
    loop {
        tokio::select! {
            _ = &mut stop => break,
            // Bind failures end the server before any signal arrives.
            joined = &mut server => {
                finished = Some(joined);
                break;
            }
            line = live.next() => {
                let Some(line) = line else { break };
                let rendered = format_live_line(&line, color);
                if let Err(e) = write_live_line(&mut out, &rendered).await {
                    warn!(error = %e, "Live output closed; stopping relay");
                    output_error = Some(e);
                    break;
                }
            }
        }
    }

    ctx.shutdown();
    let joined = match finished {
        Some(joined) => joined,
        None => server.await,
    };
    match joined {
        Ok(result) => result?,
        Err(e) => warn!(error = %e, "Relay server task ended abnormally"),
    }
    if let Some(e) = output_error {
        return Err(e.into());
    }
    if live.dropped() > 0 {
        info!(dropped = live.dropped(), "Live output fell behind");
    }
    Ok(format_health_summary(&ctx.relay().health().snapshot()))
}

async fn write_live_line<W: AsyncWrite + Unpin>(out: &mut W, line: &str) -> std::io::Result<()> {
    out.write_all(line.as_bytes()).await?;
    out.write_all(b"\n").await?;
    out.flush().await
}
