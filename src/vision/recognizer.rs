// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Text recognition seam

use anyhow::Result;
use image::GrayImage;

/// Text-extraction capability consumed by the detection pipeline.
///
/// The input is a single plate crop that has already been converted to
/// grayscale and contrast-normalized. An empty result means the crop was
/// unreadable; it is not an error.
pub trait TextRecognizer: Send + Sync {
    fn recognize(&self, crop: &GrayImage) -> Result<Vec<String>>;
}
