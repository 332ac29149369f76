// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Metrics and status HTTP server.
//!
//! | Path | Response |
//! |---|---|
//! | `/metrics` | Prometheus text format |
//! | `/healthz` | `200` while the process is running |
//! | `/readyz` | `200` once a Corefile has been observed, `503` before |
//! | `/rewrites` | JSON snapshot of the rewrite engine |

use crate::constants::METRICS_SERVER_PATH;
use crate::metrics;
use crate::reconcilers::engine::{EngineStatus, RewriteEngine};
use anyhow::{Context as _, Result};
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

/// Build the router serving metrics and engine status.
pub fn router(engine: Arc<RewriteEngine>) -> Router {
    Router::new()
        .route(METRICS_SERVER_PATH, get(get_metrics))
        .route("/healthz", get(get_healthz))
        .route("/readyz", get(get_readyz))
        .route("/rewrites", get(get_rewrites))
        .with_state(engine)
}

/// Serve [`router`] on `address` until the listener fails.
///
/// # Errors
///
/// Returns an error if the address cannot be bound or the server stops.
pub async fn serve(address: &str, engine: Arc<RewriteEngine>) -> Result<()> {
    let listener = TcpListener::bind(address)
        .await
        .with_context(|| format!("Failed to bind metrics server to {address}"))?;
    info!(address = %address, "Metrics server listening");

    axum::serve(listener, router(engine))
        .await
        .context("Metrics server stopped")
}

pub async fn get_metrics() -> impl IntoResponse {
    match metrics::gather_metrics() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        ),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(header::CONTENT_TYPE, "text/plain")],
                format!("failed to encode metrics: {e}"),
            )
        }
    }
}

pub async fn get_healthz() -> &'static str {
    "ok"
}

pub async fn get_readyz(State(engine): State<Arc<RewriteEngine>>) -> (StatusCode, &'static str) {
    if engine.is_ready() {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "corefile not observed yet")
    }
}

pub async fn get_rewrites(State(engine): State<Arc<RewriteEngine>>) -> Json<EngineStatus> {
    Json(engine.status())
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod http_tests;
