// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Detect-and-annotate pipeline
//!
//! Runs the plate detector, filters out undersized candidates, recognizes the
//! text of each surviving crop, and burns the overlays into a copy of the
//! input frame. The pipeline is pure with respect to shared state; callers
//! decide whether a failure is fatal (upload endpoint) or skippable (the
//! background processing loop).

use std::sync::Arc;

use image::imageops;
use image::RgbImage;
use imageproc::contrast::equalize_histogram;
use thiserror::Error;
use tracing::debug;

use super::annotate;
use super::detector::{Detector, PlateBox};
use super::image_utils::{self, ImageError};
use super::recognizer::TextRecognizer;

/// Crops narrower than this are treated as detector noise.
pub const MIN_PLATE_WIDTH: u32 = 40;
/// Crops shorter than this are treated as detector noise.
pub const MIN_PLATE_HEIGHT: u32 = 15;

/// Substituted when the recognizer returns no text for a crop.
pub const UNREADABLE_TEXT: &str = "(unreadable)";

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("plate detection failed: {0}")]
    Detection(#[source] anyhow::Error),

    #[error("text recognition failed: {0}")]
    Recognition(#[source] anyhow::Error),

    #[error("crop encoding failed: {0}")]
    Encode(#[from] ImageError),
}

/// One confirmed plate in a frame.
#[derive(Debug, Clone)]
pub struct PlateDetection {
    pub bbox: PlateBox,
    /// Detector confidence in [0, 1].
    pub confidence: f32,
    /// JPEG-encoded crop of the plate region.
    pub crop_jpeg: Vec<u8>,
    /// Recognized text, or [`UNREADABLE_TEXT`].
    pub text: String,
}

/// Result of one pipeline run over a single frame.
#[derive(Debug, Clone)]
pub struct DetectionSummary {
    /// Frame copy with boxes and labels burned in. Same dimensions as the
    /// input, always.
    pub annotated: RgbImage,
    /// Plates in detector output order.
    pub plates: Vec<PlateDetection>,
    /// Per-plate texts joined by newline.
    pub text: String,
    /// Mean surviving confidence as a percentage, 0.0 when nothing survived.
    pub confidence: f32,
}

pub struct DetectionPipeline {
    detector: Arc<dyn Detector>,
    recognizer: Arc<dyn TextRecognizer>,
    jpeg_quality: u8,
}

impl DetectionPipeline {
    pub fn new(
        detector: Arc<dyn Detector>,
        recognizer: Arc<dyn TextRecognizer>,
        jpeg_quality: u8,
    ) -> Self {
        Self {
            detector,
            recognizer,
            jpeg_quality,
        }
    }

    /// Run detection and recognition over one frame and build the annotated
    /// copy. The input frame is never mutated.
    pub fn detect_and_annotate(&self, image: &RgbImage) -> Result<DetectionSummary, PipelineError> {
        let (frame_w, frame_h) = image.dimensions();

        let candidates = self
            .detector
            .detect(image)
            .map_err(PipelineError::Detection)?;
        debug!("detector proposed {} candidate regions", candidates.len());

        let mut annotated = image.clone();
        let mut plates = Vec::new();
        let mut texts = Vec::new();
        let mut confidence_sum = 0.0_f32;

        for candidate in candidates {
            let Some(bbox) = candidate.bbox.clamped(frame_w, frame_h) else {
                continue;
            };

            // Noise filter: degenerate or undersized crops carry no readable
            // plate and are excluded from every output.
            if bbox.height() < MIN_PLATE_HEIGHT || bbox.width() < MIN_PLATE_WIDTH {
                continue;
            }

            let crop = imageops::crop_imm(image, bbox.x1(), bbox.y1(), bbox.width(), bbox.height())
                .to_image();

            // Contrast normalization before recognition helps on low-light
            // and noisy crops.
            let gray = imageops::grayscale(&crop);
            let normalized = equalize_histogram(&gray);

            let lines = self
                .recognizer
                .recognize(&normalized)
                .map_err(PipelineError::Recognition)?;

            let text = if lines.is_empty() {
                UNREADABLE_TEXT.to_string()
            } else {
                lines.join(" ")
            };

            let confidence = candidate.confidence.unwrap_or(1.0);
            confidence_sum += confidence;

            annotate::draw_plate(&mut annotated, &bbox, &text);

            let crop_jpeg = image_utils::encode_jpeg(&crop, self.jpeg_quality)?;
            texts.push(text.clone());
            plates.push(PlateDetection {
                bbox,
                confidence,
                crop_jpeg,
                text,
            });
        }

        let confidence = if plates.is_empty() {
            0.0
        } else {
            confidence_sum / plates.len() as f32 * 100.0
        };

        Ok(DetectionSummary {
            annotated,
            text: texts.join("\n"),
            confidence,
            plates,
        })
    }
}
