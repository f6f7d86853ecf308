// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Wire format for the synchronous detection endpoint

use serde::{Deserialize, Serialize};

use crate::vision::{image_utils, DetectionSummary, ImageError};

/// One plate crop in the response gallery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GalleryEntry {
    /// Base64-encoded JPEG of the plate crop
    pub image: String,
    /// Recognized plate text
    pub text: String,
}

/// Response body for `POST /detect`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectResponse {
    /// Base64-encoded JPEG of the annotated frame
    pub annotated_image: String,
    /// Per-plate crops in detector output order
    pub gallery: Vec<GalleryEntry>,
    /// Plate texts joined by newline
    pub text: String,
    /// Average detector confidence, 0-100
    pub confidence: f32,
}

impl DetectResponse {
    /// Encode a pipeline summary for the wire.
    pub fn from_summary(summary: &DetectionSummary, jpeg_quality: u8) -> Result<Self, ImageError> {
        let annotated_jpeg = image_utils::encode_jpeg(&summary.annotated, jpeg_quality)?;

        let gallery = summary
            .plates
            .iter()
            .map(|plate| GalleryEntry {
                image: image_utils::to_base64(&plate.crop_jpeg),
                text: plate.text.clone(),
            })
            .collect();

        Ok(Self {
            annotated_image: image_utils::to_base64(&annotated_jpeg),
            gallery,
            text: summary.text.clone(),
            confidence: summary.confidence,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    #[test]
    fn test_empty_summary_serializes_with_empty_gallery() {
        let summary = DetectionSummary {
            annotated: RgbImage::new(4, 4),
            plates: vec![],
            text: String::new(),
            confidence: 0.0,
        };
        let response = DetectResponse::from_summary(&summary, 80).unwrap();
        assert!(response.gallery.is_empty());
        assert_eq!(response.text, "");
        assert_eq!(response.confidence, 0.0);
        assert!(!response.annotated_image.is_empty());

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["gallery"], serde_json::json!([]));
        assert_eq!(json["confidence"], 0.0);
    }
}
