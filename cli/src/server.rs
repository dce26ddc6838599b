// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Coordinator HTTP server

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};

use fedaurora_core::{
    application::{
        coordinator::{CoordinatorSettings, RoundCoordinator},
        distributor::Distributor,
    },
    domain::{config::CoordinatorConfig, repository::GlobalModelStore},
    infrastructure::{
        event_bus::EventBus,
        http_push::HttpModelPush,
        model_store::{FileGlobalModelStore, InMemoryGlobalModelStore},
    },
    presentation::api,
};

/// Wire the coordinator from `config`.
pub fn build_coordinator(config: &CoordinatorConfig) -> Result<Arc<RoundCoordinator>> {
    let spec = &config.spec;

    let push = HttpModelPush::new(
        spec.distribution.receive_path.clone(),
        Duration::from_millis(spec.distribution.timeout_ms),
    )
    .context("Failed to initialize model distribution client")?;

    let store: Arc<dyn GlobalModelStore> = match &spec.storage.global_model_dir {
        Some(dir) => {
            info!("Persisting global models under {}", dir.display());
            Arc::new(FileGlobalModelStore::new(dir))
        }
        None => Arc::new(InMemoryGlobalModelStore::new()),
    };

    Ok(Arc::new(RoundCoordinator::new(
        Distributor::new(Arc::new(push)),
        store,
        EventBus::new(spec.events.capacity),
        CoordinatorSettings {
            auto_reset_on_complete: spec.round.auto_reset_on_complete,
        },
    )))
}

pub async fn serve(config: CoordinatorConfig) -> Result<()> {
    config
        .validate()
        .context("Configuration validation failed")?;

    info!(
        name = %config.metadata.name,
        "FedAurora coordinator starting (PID: {})",
        std::process::id()
    );

    if config.spec.observability.metrics.enabled {
        let addr: std::net::SocketAddr = ([0, 0, 0, 0], config.spec.observability.metrics.port).into();
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("Failed to install Prometheus exporter")?;
        info!("Prometheus metrics exposed on {}", addr);
    }

    let coordinator = build_coordinator(&config)?;
    if let Err(e) = coordinator.restore_global_model().await {
        warn!("Could not restore previous global model: {}", e);
    }

    let app = api::app(coordinator, config.spec.server.max_body_bytes);

    let addr = config.listen_address();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("Coordinator listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("Coordinator shutting down");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fedaurora_core::domain::round::RoundState;

    #[tokio::test]
    async fn test_build_coordinator_from_defaults() {
        let coordinator = build_coordinator(&CoordinatorConfig::default()).unwrap();
        assert_eq!(coordinator.status().state, RoundState::Idle);
        assert!(coordinator.global_model().is_none());
    }

    #[tokio::test]
    async fn test_build_coordinator_with_file_store() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = CoordinatorConfig::default();
        config.spec.storage.global_model_dir = Some(dir.path().to_path_buf());

        let coordinator = build_coordinator(&config).unwrap();
        assert!(!coordinator.restore_global_model().await.unwrap());
    }
}
