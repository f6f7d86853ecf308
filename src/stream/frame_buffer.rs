// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Double-buffered shared frame state
//!
//! Two single-value slots with lossy-latest semantics: the raw slot is fed by
//! the acquisition loop, the annotated slot by the processing loop. Each slot
//! has its own lock so a reader of one never stalls the writer of the other,
//! and no lock is ever held across capture or inference.

use image::RgbImage;
use parking_lot::Mutex;

#[derive(Default)]
pub struct SharedFrameBuffer {
    raw: Mutex<Option<RgbImage>>,
    annotated: Mutex<Option<RgbImage>>,
}

impl SharedFrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the raw slot. Any unconsumed previous frame is dropped.
    pub fn set_raw(&self, frame: RgbImage) {
        *self.raw.lock() = Some(frame);
    }

    /// Copy out the most recent raw frame, if any.
    pub fn latest_raw(&self) -> Option<RgbImage> {
        self.raw.lock().clone()
    }

    /// Replace the annotated slot. Any unconsumed previous frame is dropped.
    pub fn set_annotated(&self, frame: RgbImage) {
        *self.annotated.lock() = Some(frame);
    }

    /// Copy out the most recent annotated frame, if any.
    pub fn latest_annotated(&self) -> Option<RgbImage> {
        self.annotated.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use std::sync::Arc;

    fn frame(shade: u8) -> RgbImage {
        RgbImage::from_pixel(4, 4, Rgb([shade, shade, shade]))
    }

    #[test]
    fn test_slots_start_empty() {
        let buffer = SharedFrameBuffer::new();
        assert!(buffer.latest_raw().is_none());
        assert!(buffer.latest_annotated().is_none());
    }

    #[test]
    fn test_latest_wins() {
        let buffer = SharedFrameBuffer::new();
        buffer.set_raw(frame(1));
        buffer.set_raw(frame(2));
        let latest = buffer.latest_raw().unwrap();
        assert_eq!(latest.get_pixel(0, 0)[0], 2);
    }

    #[test]
    fn test_slots_are_independent() {
        let buffer = SharedFrameBuffer::new();
        buffer.set_raw(frame(1));
        assert!(buffer.latest_annotated().is_none());
        buffer.set_annotated(frame(9));
        assert_eq!(buffer.latest_raw().unwrap().get_pixel(0, 0)[0], 1);
        assert_eq!(buffer.latest_annotated().unwrap().get_pixel(0, 0)[0], 9);
    }

    #[test]
    fn test_reader_gets_independent_copy() {
        let buffer = SharedFrameBuffer::new();
        buffer.set_raw(frame(5));
        let mut copy = buffer.latest_raw().unwrap();
        copy.put_pixel(0, 0, Rgb([0, 0, 0]));
        // The slot is unaffected by mutation of the copy
        assert_eq!(buffer.latest_raw().unwrap().get_pixel(0, 0)[0], 5);
    }

    #[test]
    fn test_concurrent_writers_and_readers() {
        let buffer = Arc::new(SharedFrameBuffer::new());
        let writer = {
            let buffer = buffer.clone();
            std::thread::spawn(move || {
                for shade in 0..100u8 {
                    buffer.set_raw(frame(shade));
                }
            })
        };
        let reader = {
            let buffer = buffer.clone();
            std::thread::spawn(move || {
                for _ in 0..100 {
                    if let Some(f) = buffer.latest_raw() {
                        // A frame is replaced wholesale, never torn
                        assert_eq!(f.get_pixel(0, 0), f.get_pixel(3, 3));
                    }
                }
            })
        };
        writer.join().unwrap();
        reader.join().unwrap();
    }
}
