// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! ONNX Runtime inference backends
//!
//! CPU-only plate detection and text recognition behind the `onnx` cargo
//! feature. Builds without the feature still get the trait seams in
//! [`crate::vision::detector`] and [`crate::vision::recognizer`].

pub mod detector;
pub mod preprocessing;
pub mod recognizer;

pub use detector::OnnxPlateDetector;
pub use recognizer::OnnxTextRecognizer;
