//! Server lifecycle management
//!
//! Manages the startup and shutdown of the HTTP server and the background
//! sweep of empty subscriber sets.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use predlive_api::{create_router, AppState};
use predlive_core::Config;
use predlive_hub::StreamHub;

/// Subscriptions never end on their own, so draining is bounded
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

pub struct PredLiveServer {
    config: Config,
    hub: Arc<StreamHub>,
    sweep_handle: Option<JoinHandle<()>>,
}

impl PredLiveServer {
    pub const fn new(config: Config, hub: Arc<StreamHub>) -> Self {
        Self {
            config,
            hub,
            sweep_handle: None,
        }
    }

    /// Start all components and wait for shutdown signal
    pub async fn start(mut self) -> anyhow::Result<()> {
        info!("Starting Prediction Live server...");

        // Create shutdown signal channel
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        if let Some(interval) = self.config.broadcast.sweep_interval() {
            info!("Empty subscriber set sweep: every {}s", interval.as_secs());
            self.sweep_handle = Some(self.hub.spawn_sweep_task(interval));
        }

        let mut http_handle = self.start_http_server(shutdown_rx).await?;

        info!("All servers started successfully");

        // Wait for either the server to stop or a shutdown signal
        let http_running = tokio::select! {
            _ = &mut http_handle => {
                error!("HTTP server stopped unexpectedly");
                false
            }
            () = shutdown_signal() => {
                info!("Shutdown signal received, starting graceful shutdown...");
                true
            }
        };

        // Signal all components to shut down
        let _ = shutdown_tx.send(true);

        self.shutdown(http_running.then_some(http_handle)).await;

        Ok(())
    }

    /// Gracefully shut down all server components
    async fn shutdown(&mut self, http_handle: Option<JoinHandle<()>>) {
        info!("Shutting down Prediction Live server...");

        if let Some(handle) = self.sweep_handle.take() {
            handle.abort();
        }

        if let Some(mut handle) = http_handle {
            let active = self.hub.connection_count();
            if active > 0 {
                info!(
                    "Waiting up to {}s for {} subscriber(s) to disconnect...",
                    DRAIN_TIMEOUT.as_secs(),
                    active
                );
            }

            if tokio::time::timeout(DRAIN_TIMEOUT, &mut handle).await.is_ok() {
                info!("All connections drained");
            } else {
                warn!(
                    "Drain timeout reached with {} subscriber(s) still connected, proceeding with shutdown",
                    self.hub.connection_count()
                );
                handle.abort();
            }
        }

        info!("Prediction Live server shut down complete");
    }

    /// Start HTTP server with graceful shutdown support
    async fn start_http_server(
        &self,
        shutdown_rx: watch::Receiver<bool>,
    ) -> anyhow::Result<JoinHandle<()>> {
        let http_address = self.config.http_address();
        let http_addr: std::net::SocketAddr = http_address
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid HTTP address '{http_address}': {e}"))?;

        let listener = tokio::net::TcpListener::bind(http_addr)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind HTTP address {http_addr}: {e}"))?;

        let state = AppState::new(self.hub.clone(), self.config.broadcast.clone());
        let http_router = create_router(state, &self.config.cors);

        let handle = tokio::spawn(async move {
            info!("HTTP server listening on {}", http_addr);

            let mut rx = shutdown_rx;
            let graceful = async move {
                let _ = rx.changed().await;
            };

            if let Err(e) = axum::serve(listener, http_router)
                .with_graceful_shutdown(graceful)
                .await
            {
                error!("HTTP server error: {}", e);
            }

            info!("HTTP server shut down gracefully");
        });

        Ok(handle)
    }
}

/// Wait for a shutdown signal (SIGTERM or SIGINT/Ctrl+C)
async fn shutdown_signal() {
    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl+C signal");
            }
            Err(e) => {
                error!("Failed to install Ctrl+C handler: {}", e);
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
                info!("Received SIGTERM signal");
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
