// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Synchronous detection endpoint handler

use axum::extract::{Multipart, State};
use axum::Json;
use tracing::{debug, info, warn};

use super::response::DetectResponse;
use crate::api::errors::ApiError;
use crate::api::http_server::AppState;
use crate::vision::image_utils::decode_image_bytes;

/// POST /detect - Run plate detection and recognition on one uploaded image
///
/// Accepts a multipart form with a binary `image` field and returns the
/// annotated frame, a gallery of plate crops with their recognized text, the
/// combined text, and the average detector confidence.
///
/// # Errors
/// - 400 Bad Request: missing `image` field, or undecodable image bytes
/// - 500 Internal Server Error: detection or recognition failed
pub async fn detect_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<DetectResponse>, ApiError> {
    let mut image_bytes = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::DecodeFailure(e.to_string()))?
    {
        if field.name() == Some("image") {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::DecodeFailure(e.to_string()))?;
            image_bytes = Some(bytes);
            break;
        }
    }

    let bytes = image_bytes
        .filter(|b| !b.is_empty())
        .ok_or(ApiError::NoImagePayload)?;

    let (image, image_info) = decode_image_bytes(&bytes).map_err(|e| {
        warn!("failed to decode upload: {e}");
        ApiError::DecodeFailure(e.to_string())
    })?;
    debug!(
        "decoded upload: {}x{}, {} bytes",
        image_info.width, image_info.height, image_info.size_bytes
    );

    let pipeline = state.pipeline.clone();
    let summary = tokio::task::spawn_blocking(move || pipeline.detect_and_annotate(&image))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .map_err(|e| {
            warn!("detection pipeline failed: {e}");
            ApiError::Internal(e.to_string())
        })?;

    info!(
        "detect complete: {} plates, {:.1}% confidence",
        summary.plates.len(),
        summary.confidence
    );

    let response = DetectResponse::from_summary(&summary, state.config.jpeg_quality)
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(Json(response))
}
