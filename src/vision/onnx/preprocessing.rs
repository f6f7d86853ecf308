// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Tensor preprocessing for the ONNX detector and recognizer

use image::{DynamicImage, GrayImage, RgbImage};
use ndarray::Array4;

/// Detector input is a square letterbox of this size.
pub const DET_INPUT_SIZE: u32 = 640;

/// Recognition model input height.
pub const REC_INPUT_HEIGHT: u32 = 48;

/// Maximum width for recognition model input.
pub const REC_MAX_WIDTH: u32 = 320;

/// Letterbox padding intensity (the conventional YOLO gray).
const PAD_VALUE: f32 = 114.0 / 255.0;

/// Mean values for recognition normalization (ImageNet)
const MEAN: [f32; 3] = [0.485, 0.456, 0.406];

/// Std values for recognition normalization (ImageNet)
const STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Geometry of a letterboxed frame, used to map detections back into source
/// pixel space.
#[derive(Debug, Clone, Copy)]
pub struct Letterbox {
    pub scale: f32,
    pub pad_x: f32,
    pub pad_y: f32,
}

impl Letterbox {
    /// Map a coordinate from letterbox space back to source space.
    pub fn unmap_x(&self, x: f32) -> f32 {
        (x - self.pad_x) / self.scale
    }

    pub fn unmap_y(&self, y: f32) -> f32 {
        (y - self.pad_y) / self.scale
    }
}

/// Resize a frame into a centered square letterbox and normalize it to a
/// [1, 3, S, S] NCHW tensor in 0..1 range.
pub fn preprocess_for_detection(image: &RgbImage) -> (Array4<f32>, Letterbox) {
    let (orig_w, orig_h) = image.dimensions();
    let size = DET_INPUT_SIZE;

    let scale = (size as f32 / orig_w as f32).min(size as f32 / orig_h as f32);
    let new_w = ((orig_w as f32 * scale).round() as u32).clamp(1, size);
    let new_h = ((orig_h as f32 * scale).round() as u32).clamp(1, size);
    let pad_x = ((size - new_w) / 2) as f32;
    let pad_y = ((size - new_h) / 2) as f32;

    let resized = DynamicImage::ImageRgb8(image.clone())
        .resize_exact(new_w, new_h, image::imageops::FilterType::Triangle)
        .to_rgb8();

    let mut tensor = Array4::from_elem((1, 3, size as usize, size as usize), PAD_VALUE);
    for y in 0..new_h as usize {
        for x in 0..new_w as usize {
            let pixel = resized.get_pixel(x as u32, y as u32);
            for c in 0..3 {
                tensor[[0, c, y + pad_y as usize, x + pad_x as usize]] =
                    pixel[c] as f32 / 255.0;
            }
        }
    }

    (
        tensor,
        Letterbox {
            scale,
            pad_x,
            pad_y,
        },
    )
}

/// Resize a grayscale plate crop to the recognition input height with dynamic
/// width, replicate it to three channels, and normalize with ImageNet
/// mean/std into a [1, 3, H, W] tensor.
pub fn preprocess_for_recognition(crop: &GrayImage) -> Array4<f32> {
    let (orig_w, orig_h) = crop.dimensions();

    let scale = REC_INPUT_HEIGHT as f32 / orig_h.max(1) as f32;
    let new_width = ((orig_w as f32 * scale).round() as u32)
        .min(REC_MAX_WIDTH)
        .max(4);

    let resized = DynamicImage::ImageLuma8(crop.clone())
        .resize_exact(new_width, REC_INPUT_HEIGHT, image::imageops::FilterType::Lanczos3)
        .to_luma8();

    let width = new_width as usize;
    let mut tensor = Array4::zeros((1, 3, REC_INPUT_HEIGHT as usize, width));
    for y in 0..REC_INPUT_HEIGHT as usize {
        for x in 0..width {
            let intensity = resized.get_pixel(x as u32, y as u32)[0] as f32 / 255.0;
            for c in 0..3 {
                tensor[[0, c, y, x]] = (intensity - MEAN[c]) / STD[c];
            }
        }
    }

    tensor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detection_tensor_shape() {
        let image = RgbImage::new(320, 240);
        let (tensor, _) = preprocess_for_detection(&image);
        assert_eq!(tensor.shape(), &[1, 3, 640, 640]);
    }

    #[test]
    fn test_letterbox_scale_wide_frame() {
        let image = RgbImage::new(1280, 720);
        let (_, meta) = preprocess_for_detection(&image);
        assert!((meta.scale - 0.5).abs() < 1e-6);
        assert_eq!(meta.pad_x, 0.0);
        // 720 * 0.5 = 360, centered in 640
        assert_eq!(meta.pad_y, 140.0);
    }

    #[test]
    fn test_letterbox_unmap_round_trip() {
        let image = RgbImage::new(1280, 720);
        let (_, meta) = preprocess_for_detection(&image);
        let x = 100.0 * meta.scale + meta.pad_x;
        let y = 50.0 * meta.scale + meta.pad_y;
        assert!((meta.unmap_x(x) - 100.0).abs() < 1e-3);
        assert!((meta.unmap_y(y) - 50.0).abs() < 1e-3);
    }

    #[test]
    fn test_recognition_tensor_dynamic_width() {
        let crop = GrayImage::new(120, 40);
        let tensor = preprocess_for_recognition(&crop);
        // 48/40 scale gives width 144
        assert_eq!(tensor.shape(), &[1, 3, 48, 144]);
    }

    #[test]
    fn test_recognition_tensor_width_capped() {
        let crop = GrayImage::new(2000, 40);
        let tensor = preprocess_for_recognition(&crop);
        assert_eq!(tensor.shape()[3], REC_MAX_WIDTH as usize);
    }

    #[test]
    fn test_recognition_tensor_min_width() {
        let crop = GrayImage::new(1, 40);
        let tensor = preprocess_for_recognition(&crop);
        assert_eq!(tensor.shape()[3], 4);
    }
}
