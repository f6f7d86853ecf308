// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! HTTP server assembly and lifecycle

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::api::detect::detect_handler;
use crate::api::stream::{video_handler, webcam_handler};
use crate::config::NodeConfig;
use crate::stream::StreamSessionManager;
use crate::vision::image_utils::MAX_IMAGE_SIZE;
use crate::vision::DetectionPipeline;

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<DetectionPipeline>,
    pub session: Arc<StreamSessionManager>,
    pub config: Arc<NodeConfig>,
}

impl AppState {
    pub fn new(
        pipeline: Arc<DetectionPipeline>,
        session: Arc<StreamSessionManager>,
        config: NodeConfig,
    ) -> Self {
        Self {
            pipeline,
            session,
            config: Arc::new(config),
        }
    }
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "plate-vision-node",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Build the application router with all endpoints and middleware.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/detect", post(detect_handler))
        .route("/webcam", get(webcam_handler))
        .route("/video", get(video_handler))
        .layer(DefaultBodyLimit::max(MAX_IMAGE_SIZE * 2))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind the configured port and serve until shutdown is signalled.
pub async fn start_server(state: AppState) -> Result<()> {
    let addr = format!("0.0.0.0:{}", state.config.api_port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("listening on {addr}");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to install ctrl-c handler: {e}");
        return;
    }
    info!("shutdown signal received");
}
