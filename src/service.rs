use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use axum_server::Handle;
use blob_store::{BlobStore, ObjectStoreBlobStorage};
use tracing::{error, info, warn};

use crate::{
    config::ServerConfig,
    lifecycle::{Lifecycle, Phase},
    routes::{create_routes, RouteState},
};

pub struct Service {
    pub config: Arc<ServerConfig>,
    lifecycle: Arc<Lifecycle>,
    blob_store: Arc<dyn BlobStore>,
}

impl Service {
    /// Connect to blob storage and assemble the service. Fails fast if the
    /// backend is misconfigured or unreachable.
    pub async fn new(config: ServerConfig) -> Result<Self> {
        let blob_store = ObjectStoreBlobStorage::new(config.blob_storage.clone())
            .await
            .with_context(|| {
                format!("failed to initialize blob storage at {}", config.blob_storage.path)
            })?;
        Ok(Self {
            config: Arc::new(config),
            lifecycle: Arc::new(Lifecycle::new()),
            blob_store: Arc::new(blob_store),
        })
    }

    pub async fn start(self) -> Result<()> {
        let addr = self.config.listen_addr();
        let handle = Handle::new();

        let shutdown_handle = handle.clone();
        let shutdown_lifecycle = self.lifecycle.clone();
        let drain_grace = Duration::from_secs(self.config.drain_grace_period_secs);
        let shutdown_timeout = Duration::from_secs(self.config.shutdown_timeout_secs);
        tokio::spawn(async move {
            shutdown_signal(shutdown_handle, shutdown_lifecycle, drain_grace, shutdown_timeout)
                .await;
        });

        let routes = create_routes(RouteState {
            config: self.config.clone(),
            blob_store: self.blob_store.clone(),
            lifecycle: self.lifecycle.clone(),
        });

        self.lifecycle.advance(Phase::Ready);
        info!("server listening on {}", addr);
        axum_server::bind(addr)
            .handle(handle)
            .serve(routes.into_make_service())
            .await
            .context("server exited with error")?;

        self.lifecycle.advance(Phase::Stopped);
        info!("server stopped");
        Ok(())
    }
}

/// Wait for SIGINT/SIGTERM, then run the drain sequence: flip readiness,
/// hold for the grace period so load balancers catch up, then give
/// in-flight requests a bounded window to finish.
async fn shutdown_signal(
    handle: Handle,
    lifecycle: Arc<Lifecycle>,
    drain_grace: Duration,
    shutdown_timeout: Duration,
) {
    let handle_sigint = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("received SIGINT"),
            Err(err) => error!("failed to install SIGINT handler: {:?}", err),
        }
    };
    #[cfg(unix)]
    let handle_sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
                info!("received SIGTERM");
            }
            Err(err) => error!("failed to install SIGTERM handler: {:?}", err),
        }
    };
    #[cfg(not(unix))]
    let handle_sigterm = std::future::pending::<()>();
    tokio::select! {
        _ = handle_sigint => {},
        _ = handle_sigterm => {},
    }

    lifecycle.advance(Phase::Draining);
    info!(
        "draining: readiness disabled, waiting {}s before closing the listener",
        drain_grace.as_secs()
    );
    tokio::time::sleep(drain_grace).await;

    info!(
        "closing listener, allowing up to {}s for in-flight requests",
        shutdown_timeout.as_secs()
    );
    handle.graceful_shutdown(Some(shutdown_timeout));

    tokio::time::sleep(shutdown_timeout).await;
    if lifecycle.phase() < Phase::Stopped {
        warn!("shutdown timeout elapsed with requests still in flight, forcing close");
    }
}
