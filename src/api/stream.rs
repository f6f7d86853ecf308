// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! MJPEG streaming endpoint handlers

use axum::body::Body;
use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use tracing::{error, info};

use crate::api::errors::ApiError;
use crate::api::http_server::AppState;
use crate::stream::mjpeg::{live_stream, video_stream, MJPEG_CONTENT_TYPE};
use crate::stream::source::open_video_source;

fn mjpeg_response(body: Body) -> Response {
    (
        [
            (header::CONTENT_TYPE, MJPEG_CONTENT_TYPE),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        body,
    )
        .into_response()
}

/// GET /webcam - Infinite MJPEG stream of annotated live frames
///
/// Starts the shared capture and processing loops on first call; later calls
/// attach to the same loops and see the same frames. The stream runs until
/// the client disconnects.
pub async fn webcam_handler(State(state): State<AppState>) -> Response {
    state.session.ensure_started();
    info!("webcam stream client connected");

    let stream = live_stream(
        state.session.clone(),
        state.config.stream_interval,
        state.config.jpeg_quality,
    );
    mjpeg_response(Body::from_stream(stream))
}

/// GET /video - Finite MJPEG stream over the configured video source
///
/// Each request opens its own source and runs the detection pipeline inline
/// on every frame, so concurrent requests do not share playback position.
/// The response body ends when the source is exhausted.
pub async fn video_handler(State(state): State<AppState>) -> Response {
    let config = state.config.clone();
    let source = match tokio::task::spawn_blocking(move || open_video_source(&config)).await {
        Ok(Ok(source)) => source,
        Ok(Err(e)) => {
            error!("failed to open video source: {e}");
            return ApiError::Internal(format!("failed to open video source: {e}"))
                .into_response();
        }
        Err(e) => return ApiError::Internal(e.to_string()).into_response(),
    };
    info!("video stream client connected");

    let stream = video_stream(source, state.pipeline.clone(), state.config.jpeg_quality);
    mjpeg_response(Body::from_stream(stream))
}
