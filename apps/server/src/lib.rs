//! # PixHost Server
//!
//! HTTP surface of the media store, built on `Axum` and `axum-server`.
//!
//! ## Example
//! ```no_run
//! use pixhost_server::Server;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     Server::builder()
//!         .port(5000)
//!         .build()
//!         .await?
//!         .run()
//!         .await
//! }
//! ```

mod auth;
pub mod config;
mod error;
mod routes;
mod state;
pub mod telemetry;

pub use error::{ApiError, ApiErrorExt};
pub use routes::router;
pub use state::AppState;

use anyhow::{Context, Result};
use axum::Router;
use axum_server::Handle;
use pixhost_domain::config::AppConfig;
use pixhost_storage::Storage;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);
/// Decompressed bytes a restore may produce per byte of accepted archive.
const RESTORE_EXPANSION: u64 = 4;

/// A fluent builder for configuring and initializing the [`Server`].
#[must_use = "builders do nothing unless you call .build()"]
#[derive(Debug, Default)]
pub struct ServerBuilder {
    cfg: AppConfig,
}

impl ServerBuilder {
    /// Set up the server's configuration.
    pub fn config(mut self, cfg: AppConfig) -> Self {
        self.cfg = cfg;
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.cfg.server.port = port;
        self
    }

    async fn init_storage(&self) -> Result<Storage> {
        let storage_cfg = &self.cfg.storage;
        let builder = Storage::builder()
            .root(&storage_cfg.root)
            .snapshot_dir(&storage_cfg.snapshot_dir)
            .allowed_extensions(storage_cfg.normalized_extensions())
            .max_file_size(storage_cfg.max_file_size)
            .max_restore_size(storage_cfg.max_archive_size.saturating_mul(RESTORE_EXPANSION))
            .default_folder(&storage_cfg.default_folder);

        Context::context(builder.connect().await, "Failed to open media store")
    }

    /// Consumes the builder and initializes the server.
    ///
    /// # Process
    /// 1. Opens the media store (creating root and snapshot directories)
    /// 2. Constructs application state
    ///
    /// # Errors
    /// Returns an error if the storage root or snapshot directory cannot be
    /// created or resolved, or the upload policy is inconsistent.
    pub async fn build(self) -> Result<Server> {
        let address = SocketAddr::new(self.cfg.server.address, self.cfg.server.port);
        info!(address = %address, root = %self.cfg.storage.root.display(), "Initializing server");

        let storage = self.init_storage().await?;

        Ok(Server { state: AppState { config: self.cfg, storage } })
    }
}

/// A fully initialized server instance ready to run.
#[must_use = "call .run().await to start the server"]
#[derive(Debug)]
pub struct Server {
    state: AppState,
}

impl Server {
    /// Returns a new [`ServerBuilder`] to configure the server.
    pub fn builder() -> ServerBuilder {
        ServerBuilder::default()
    }

    /// The complete router, with state applied.
    #[must_use]
    pub fn app(&self) -> Router {
        router(self.state.clone())
    }

    /// Starts the server and runs until the shutdown signal is received.
    ///
    /// # Errors
    /// Returns an error if the server fails to bind to the configured address.
    pub async fn run(self) -> Result<()> {
        let cfg = &self.state.config;
        let address = SocketAddr::new(cfg.server.address, cfg.server.port);
        let app = self.app();

        let handle = Handle::<SocketAddr>::new();
        let shutdown_handle = handle.clone();

        tokio::spawn(async move {
            if let Err(e) = shutdown_signal().await {
                error!("Error while waiting for shutdown signal: {e}");
                return;
            }
            info!("Shutdown signal received, starting graceful shutdown...");
            shutdown_handle.graceful_shutdown(Some(SHUTDOWN_GRACE));
        });

        info!("Starting HTTP server on http://{address}");
        axum_server::bind(address)
            .handle(handle)
            .serve(app.into_make_service())
            .await
            .context("HTTP server failed")?;

        info!("Server shutdown complete");
        Ok(())
    }

    #[must_use]
    pub const fn state(&self) -> &AppState {
        &self.state
    }
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() -> Result<()> {
    let ctrl_c = async { signal::ctrl_c().await.context("Failed to install Ctrl+C handler") };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .context("Failed to install SIGTERM handler")?
            .recv()
            .await;
        Ok::<_, anyhow::Error>(())
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<Result<()>>();

    tokio::select! {
        res = ctrl_c => res?,
        res = terminate => res?,
    }

    Ok(())
}
