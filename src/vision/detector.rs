// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Plate detector seam and box geometry

use anyhow::Result;
use image::RgbImage;

/// Axis-aligned box in source-frame pixel space.
///
/// Construction enforces `x2 > x1` and `y2 > y1`, so a `PlateBox` always has
/// a non-zero area.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlateBox {
    x1: u32,
    y1: u32,
    x2: u32,
    y2: u32,
}

impl PlateBox {
    /// Build a box, rejecting degenerate coordinates.
    pub fn new(x1: u32, y1: u32, x2: u32, y2: u32) -> Option<Self> {
        if x2 > x1 && y2 > y1 {
            Some(Self { x1, y1, x2, y2 })
        } else {
            None
        }
    }

    pub fn x1(&self) -> u32 {
        self.x1
    }

    pub fn y1(&self) -> u32 {
        self.y1
    }

    pub fn x2(&self) -> u32 {
        self.x2
    }

    pub fn y2(&self) -> u32 {
        self.y2
    }

    pub fn width(&self) -> u32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> u32 {
        self.y2 - self.y1
    }

    /// Clamp the box to an image of the given dimensions.
    /// Returns `None` if nothing of the box remains inside the frame.
    pub fn clamped(&self, width: u32, height: u32) -> Option<Self> {
        Self::new(
            self.x1.min(width),
            self.y1.min(height),
            self.x2.min(width),
            self.y2.min(height),
        )
    }
}

/// A detector-proposed plate region, not yet confirmed by size filtering.
///
/// `confidence` is `None` when the detector backend does not report a score
/// for this candidate; the pipeline treats that as 1.0.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub bbox: PlateBox,
    pub confidence: Option<f32>,
}

/// Region-proposal capability consumed by the detection pipeline.
///
/// Implementations return candidates in their own scoring order; the
/// pipeline preserves that order in all outputs.
pub trait Detector: Send + Sync {
    fn detect(&self, image: &RgbImage) -> Result<Vec<Candidate>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plate_box_dimensions() {
        let bbox = PlateBox::new(10, 20, 110, 50).unwrap();
        assert_eq!(bbox.width(), 100);
        assert_eq!(bbox.height(), 30);
    }

    #[test]
    fn test_plate_box_rejects_degenerate() {
        assert!(PlateBox::new(10, 10, 10, 20).is_none());
        assert!(PlateBox::new(10, 10, 20, 10).is_none());
        assert!(PlateBox::new(20, 10, 10, 30).is_none());
    }

    #[test]
    fn test_plate_box_clamped_inside() {
        let bbox = PlateBox::new(10, 10, 50, 30).unwrap();
        assert_eq!(bbox.clamped(640, 480), Some(bbox));
    }

    #[test]
    fn test_plate_box_clamped_overhang() {
        let bbox = PlateBox::new(600, 400, 700, 500).unwrap();
        let clamped = bbox.clamped(640, 480).unwrap();
        assert_eq!((clamped.x2(), clamped.y2()), (640, 480));
        assert_eq!(clamped.width(), 40);
    }

    #[test]
    fn test_plate_box_clamped_outside() {
        let bbox = PlateBox::new(700, 500, 800, 600).unwrap();
        assert!(bbox.clamped(640, 480).is_none());
    }
}
