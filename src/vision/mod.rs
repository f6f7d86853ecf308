// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Vision processing: plate detection, text recognition, annotation
//!
//! The detector and recognizer are trait seams so the pipeline and the HTTP
//! layer stay independent of the inference runtime. The default backends run
//! on CPU via ONNX Runtime (`onnx` feature).

pub mod annotate;
pub mod detector;
pub mod image_utils;
#[cfg(feature = "onnx")]
pub mod onnx;
pub mod pipeline;
pub mod recognizer;

pub use detector::{Candidate, Detector, PlateBox};
pub use image_utils::{decode_image_bytes, detect_format, encode_jpeg, to_base64, ImageError, ImageInfo};
pub use pipeline::{DetectionPipeline, DetectionSummary, PipelineError, PlateDetection};
pub use recognizer::TextRecognizer;
