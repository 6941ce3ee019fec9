// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Metrics/health HTTP surface, served alongside the cycle controller.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;

use crate::metrics::Metrics;

struct HealthState {
    metrics: Arc<Metrics>,
    started_at: std::time::Instant,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_seconds: i64,
    component: &'static str,
    timestamp: chrono::DateTime<Utc>,
}

/// `GET /health`
async fn health(State(s): State<Arc<HealthState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "running",
        uptime_seconds: s.started_at.elapsed().as_secs() as i64,
        component: "alert-engine",
        timestamp: Utc::now(),
    })
}

/// `GET /metrics`
async fn metrics(State(s): State<Arc<HealthState>>) -> impl IntoResponse {
    match s.metrics.render() {
        Ok(body) => (StatusCode::OK, body).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, format!("failed to render metrics: {e}")).into_response(),
    }
}

/// Build the `/health` + `/metrics` router.
pub fn build_router(metrics: Arc<Metrics>) -> Router {
    let state = Arc::new(HealthState { metrics, started_at: std::time::Instant::now() });
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Keep `alert_engine_uptime_seconds` current while the process runs.
pub fn spawn_uptime_updater(metrics: Arc<Metrics>, shutdown: CancellationToken) {
    tokio::spawn(async move {
        let started_at = std::time::Instant::now();
        let mut interval = tokio::time::interval(Duration::from_secs(30));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {}
            }
            metrics.uptime_seconds.set(started_at.elapsed().as_secs() as i64);
        }
    });
}
