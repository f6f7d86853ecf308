// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! API error taxonomy and wire rendering

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Request-scoped failures surfaced to the client as `{"error": ...}` JSON.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The upload carried no `image` field.
    #[error("No image uploaded")]
    NoImagePayload,

    /// The upload bytes did not decode to a usable image.
    #[error("Failed to decode image: {0}")]
    DecodeFailure(String),

    /// Detection or recognition failed for this request.
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NoImagePayload | ApiError::DecodeFailure(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({ "error": self.to_string() });
        (self.status_code(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(ApiError::NoImagePayload.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::DecodeFailure("bad".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Internal("boom".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_no_image_message_matches_wire_format() {
        assert_eq!(ApiError::NoImagePayload.to_string(), "No image uploaded");
    }
}
