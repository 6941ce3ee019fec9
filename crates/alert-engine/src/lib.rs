// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fleet alert derivation & forwarding engine.
//!
//! Pulls a time-ordered event stream from the fleet control-plane API, derives
//! an active-alert view per resource, and forwards state transitions to an
//! Alertmanager-compatible sink. Survives API failures, sink failures, and
//! process restarts without losing or duplicating alert lifecycle transitions
//! beyond a bounded window.

pub mod alertmanager;
pub mod checkpoint;
pub mod config;
pub mod controller;
pub mod error;
pub mod events_api;
pub mod health;
pub mod metrics;
pub mod model;
pub mod processor;
pub mod reasons;
pub mod state_machine;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::alertmanager::AlertmanagerClient;
use crate::checkpoint::{CheckpointCodec, FileCheckpointCodec};
use crate::config::EngineConfig;
use crate::controller::CycleController;
use crate::events_api::HttpEventsApi;
use crate::metrics::Metrics;

/// Run the engine until shutdown.
///
/// Spawns the metrics/health server and the cycle controller, then blocks
/// until both have exited (normally via Ctrl-C, delivered as cancellation).
pub async fn run(config: EngineConfig) -> anyhow::Result<()> {
    let shutdown = CancellationToken::new();
    let metrics = Arc::new(Metrics::new()?);

    let health_addr = format!("{}:{}", config.metrics_host, config.metrics_port);
    let health_listener = tokio::net::TcpListener::bind(&health_addr).await?;
    tracing::info!(addr = %health_addr, "metrics/health server listening");

    let health_router = health::build_router(Arc::clone(&metrics));
    let health_shutdown = shutdown.clone();
    let health_task = tokio::spawn(async move {
        if let Err(e) = axum::serve(health_listener, health_router)
            .with_graceful_shutdown(health_shutdown.cancelled_owned())
            .await
        {
            tracing::error!(err = %e, "metrics/health server exited with error");
        }
    });

    health::spawn_uptime_updater(Arc::clone(&metrics), shutdown.clone());

    let codec = FileCheckpointCodec::new(config.checkpoint_path.clone(), Arc::clone(&metrics));
    let checkpoint = codec.load().await.unwrap_or_default();

    let events_api = Arc::new(HttpEventsApi::new(config.events_api_base_url.clone())?);
    let sink = AlertmanagerClient::new(
        &config.alertmanager_host,
        config.alertmanager_port,
        config.alertmanager.clone(),
    )?;

    let controller =
        CycleController::new(events_api, sink, codec, Arc::clone(&metrics), &config, checkpoint);

    let ctrl_shutdown = shutdown.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("received shutdown signal");
        ctrl_shutdown.cancel();
    });

    let result = controller.run(shutdown.clone()).await;

    shutdown.cancel();
    let _ = health_task.await;
    result
}
