//! Process-wide observability context.
//!
//! Owns the two status cells, the live bus, the record store and the relay.
//! Subsystems receive it (or pieces of it) at startup instead of reaching for
//! globals, and [`Observability::shutdown`] tears the relay endpoint down.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::bus::LogBus;
use crate::config::RelayConfig;
use crate::relay::LogRelay;
use crate::status::StatusCell;
use crate::store::LogStore;

/// Name of the "project initialization in progress" cell.
pub const INITIALIZATION_STATUS: &str = "initializationStatus";
/// Name of the "background index in progress" cell.
pub const INDEXING_STATUS: &str = "indexingStatus";

pub struct Observability {
    initialization_status: StatusCell,
    indexing_status: StatusCell,
    bus: LogBus,
    store: Arc<LogStore>,
    relay: Arc<LogRelay>,
    socket_path: PathBuf,
    config: RelayConfig,
    shutdown: CancellationToken,
}

impl Observability {
    /// Build an isolated context from `config`.
    pub fn new(config: &RelayConfig) -> Self {
        let bus = LogBus::new(config.bus.subscriber_capacity);
        let store = LogStore::shared(config.store.capacity);
        let relay = LogRelay::shared(
            Arc::clone(&store),
            bus.clone(),
            config.relay.submit_policy(),
        );
        Self {
            initialization_status: StatusCell::new(INITIALIZATION_STATUS, false),
            indexing_status: StatusCell::new(INDEXING_STATUS, false),
            bus,
            store,
            relay,
            socket_path: config.relay.resolve_socket_path(),
            config: config.clone(),
            shutdown: CancellationToken::new(),
        }
    }

    /// Set by the build runner while a project is being initialized.
    pub fn initialization_status(&self) -> &StatusCell {
        &self.initialization_status
    }

    /// Set by the indexer while a background index runs.
    pub fn indexing_status(&self) -> &StatusCell {
        &self.indexing_status
    }

    pub fn bus(&self) -> &LogBus {
        &self.bus
    }

    pub fn store(&self) -> &Arc<LogStore> {
        &self.store
    }

    pub fn relay(&self) -> &Arc<LogRelay> {
        &self.relay
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Token cancelled by [`Observability::shutdown`].
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Serve the relay socket until [`Observability::shutdown`] is called.
    #[cfg(unix)]
    pub async fn serve_relay(&self) -> std::io::Result<()> {
        crate::relay::server::serve(
            &self.socket_path,
            Arc::clone(&self.relay),
            self.config.server_settings(),
            self.shutdown.child_token(),
        )
        .await
    }

    /// Stop the relay endpoint and every open producer connection.
    pub fn shutdown(&self) {
        if !self.shutdown.is_cancelled() {
            info!("Shutting down observability context");
            self.shutdown.cancel();
        }
    }
}

impl Drop for Observability {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
