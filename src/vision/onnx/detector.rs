// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! ONNX-backed plate detector
//!
//! Runs a YOLO-style single-output detection model (shape [1, A, N] with
//! cx/cy/w/h rows followed by class scores) on CPU and maps the surviving
//! boxes back into source pixel space.

use anyhow::{Context, Result};
use image::RgbImage;
use ndarray::IxDyn;
use ort::execution_providers::CPUExecutionProvider;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;
use parking_lot::Mutex;
use std::path::Path;
use tracing::{debug, info};

use super::preprocessing::{preprocess_for_detection, DET_INPUT_SIZE};
use crate::vision::detector::{Candidate, Detector, PlateBox};

/// A decoded detection in source pixel space, before ordering is restored.
#[derive(Debug, Clone, Copy)]
struct RawDetection {
    x1: f32,
    y1: f32,
    x2: f32,
    y2: f32,
    score: f32,
    /// Anchor index; detector output order is anchor order.
    index: usize,
}

/// Plate detection model running on CPU via ONNX Runtime.
pub struct OnnxPlateDetector {
    session: Mutex<Session>,
    input_name: String,
    confidence_threshold: f32,
    iou_threshold: f32,
}

impl std::fmt::Debug for OnnxPlateDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxPlateDetector")
            .field("input_name", &self.input_name)
            .field("confidence_threshold", &self.confidence_threshold)
            .field("iou_threshold", &self.iou_threshold)
            .finish_non_exhaustive()
    }
}

impl OnnxPlateDetector {
    /// Load the detection model from an ONNX file.
    pub async fn new<P: AsRef<Path>>(model_path: P) -> Result<Self> {
        let model_path = model_path.as_ref();

        if !model_path.exists() {
            anyhow::bail!("plate detection model not found: {}", model_path.display());
        }

        info!("Loading plate detection model from {}", model_path.display());

        let session = Session::builder()
            .context("Failed to create session builder")?
            .with_execution_providers([CPUExecutionProvider::default().build()])
            .context("Failed to set CPU execution provider")?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .context("Failed to set optimization level")?
            .with_intra_threads(4)
            .context("Failed to set intra threads")?
            .commit_from_file(model_path)
            .context(format!(
                "Failed to load plate detection model from {}",
                model_path.display()
            ))?;

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .unwrap_or_else(|| "images".to_string());

        info!("Plate detection model loaded (CPU-only)");

        Ok(Self {
            session: Mutex::new(session),
            input_name,
            confidence_threshold: 0.25,
            iou_threshold: 0.45,
        })
    }

    pub fn with_confidence_threshold(mut self, threshold: f32) -> Self {
        self.confidence_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    pub fn with_iou_threshold(mut self, threshold: f32) -> Self {
        self.iou_threshold = threshold.clamp(0.0, 1.0);
        self
    }
}

impl Detector for OnnxPlateDetector {
    fn detect(&self, image: &RgbImage) -> Result<Vec<Candidate>> {
        let (frame_w, frame_h) = image.dimensions();
        let (tensor, letterbox) = preprocess_for_detection(image);

        let input_value = Value::from_array(tensor).context("Failed to create input tensor")?;

        let mut session = self.session.lock();
        let outputs = session
            .run(ort::inputs![&self.input_name => input_value])
            .context("Detection inference failed")?;

        let output = outputs[0]
            .try_extract_array::<f32>()
            .context("Failed to extract detection output")?;

        let shape = output.shape().to_vec();
        anyhow::ensure!(
            shape.len() == 3 && shape[0] == 1 && shape[1] >= 5,
            "Unexpected detection output shape: {:?}, expected [1, A>=5, N]",
            shape
        );
        let attrs = shape[1];
        let anchors = shape[2];

        let mut raw = Vec::new();
        for i in 0..anchors {
            // Class score is the max over the rows after the box geometry.
            let mut score = 0.0_f32;
            for c in 4..attrs {
                score = score.max(output[IxDyn(&[0, c, i])]);
            }
            if score < self.confidence_threshold {
                continue;
            }

            let cx = output[IxDyn(&[0, 0, i])];
            let cy = output[IxDyn(&[0, 1, i])];
            let w = output[IxDyn(&[0, 2, i])];
            let h = output[IxDyn(&[0, 3, i])];

            let max = DET_INPUT_SIZE as f32;
            let x1 = letterbox.unmap_x((cx - w / 2.0).clamp(0.0, max));
            let y1 = letterbox.unmap_y((cy - h / 2.0).clamp(0.0, max));
            let x2 = letterbox.unmap_x((cx + w / 2.0).clamp(0.0, max));
            let y2 = letterbox.unmap_y((cy + h / 2.0).clamp(0.0, max));

            raw.push(RawDetection {
                x1: x1.clamp(0.0, frame_w as f32),
                y1: y1.clamp(0.0, frame_h as f32),
                x2: x2.clamp(0.0, frame_w as f32),
                y2: y2.clamp(0.0, frame_h as f32),
                score,
                index: i,
            });
        }

        let kept = non_max_suppression(raw, self.iou_threshold);
        debug!("detector kept {} boxes after NMS", kept.len());

        // Restore anchor order so downstream output order is stable.
        let mut kept = kept;
        kept.sort_by_key(|d| d.index);

        Ok(kept
            .into_iter()
            .filter_map(|d| {
                let bbox = PlateBox::new(
                    d.x1.round() as u32,
                    d.y1.round() as u32,
                    d.x2.round() as u32,
                    d.y2.round() as u32,
                )?;
                Some(Candidate {
                    bbox,
                    confidence: Some(d.score),
                })
            })
            .collect())
    }
}

/// Greedy IoU suppression, highest score first.
fn non_max_suppression(mut detections: Vec<RawDetection>, iou_threshold: f32) -> Vec<RawDetection> {
    detections.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

    let mut kept: Vec<RawDetection> = Vec::new();
    for det in detections {
        if kept.iter().all(|k| iou(k, &det) <= iou_threshold) {
            kept.push(det);
        }
    }
    kept
}

fn iou(a: &RawDetection, b: &RawDetection) -> f32 {
    let ix1 = a.x1.max(b.x1);
    let iy1 = a.y1.max(b.y1);
    let ix2 = a.x2.min(b.x2);
    let iy2 = a.y2.min(b.y2);

    let iw = (ix2 - ix1).max(0.0);
    let ih = (iy2 - iy1).max(0.0);
    let inter = iw * ih;

    let area_a = (a.x2 - a.x1).max(0.0) * (a.y2 - a.y1).max(0.0);
    let area_b = (b.x2 - b.x1).max(0.0) * (b.y2 - b.y1).max(0.0);
    let union = area_a + area_b - inter;

    if union <= 0.0 {
        0.0
    } else {
        inter / union
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(x1: f32, y1: f32, x2: f32, y2: f32, score: f32, index: usize) -> RawDetection {
        RawDetection {
            x1,
            y1,
            x2,
            y2,
            score,
            index,
        }
    }

    #[test]
    fn test_iou_disjoint() {
        let a = det(0.0, 0.0, 10.0, 10.0, 0.9, 0);
        let b = det(20.0, 20.0, 30.0, 30.0, 0.8, 1);
        assert_eq!(iou(&a, &b), 0.0);
    }

    #[test]
    fn test_iou_identical() {
        let a = det(0.0, 0.0, 10.0, 10.0, 0.9, 0);
        assert!((iou(&a, &a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_nms_suppresses_overlap() {
        let detections = vec![
            det(0.0, 0.0, 100.0, 50.0, 0.9, 0),
            det(5.0, 2.0, 102.0, 52.0, 0.7, 1),
            det(200.0, 0.0, 300.0, 50.0, 0.8, 2),
        ];
        let kept = non_max_suppression(detections, 0.45);
        assert_eq!(kept.len(), 2);
        assert!(kept.iter().any(|d| d.index == 0));
        assert!(kept.iter().any(|d| d.index == 2));
    }

    #[test]
    fn test_nms_keeps_highest_score() {
        let detections = vec![
            det(0.0, 0.0, 100.0, 50.0, 0.6, 0),
            det(1.0, 1.0, 101.0, 51.0, 0.9, 1),
        ];
        let kept = non_max_suppression(detections, 0.45);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].index, 1);
    }

    #[tokio::test]
    async fn test_model_not_found_error() {
        let result = OnnxPlateDetector::new("/nonexistent/plate_detect.onnx").await;
        let err = result.unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
