// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Frame sources for the live and file-backed streams
//!
//! A [`FrameSource`] yields decoded RGB frames until it is exhausted
//! (`Ok(None)`), which live sources never are. The OpenCV device source is
//! behind the `camera` feature; the image-sequence source works everywhere
//! and doubles as the dev/test capture backend.

use std::path::Path;

use image::RgbImage;
use thiserror::Error;

use crate::config::NodeConfig;

#[derive(Debug, Error)]
pub enum CaptureError {
    /// The source could not be opened at all. Fatal to the acquisition loop.
    #[error("failed to open frame source {uri}: {reason}")]
    Open { uri: String, reason: String },

    /// One capture attempt failed; the cycle is skippable.
    #[error("frame capture failed: {0}")]
    Read(String),

    /// One frame could not be decoded; the cycle is skippable.
    #[error("failed to decode frame {path}: {reason}")]
    Decode { path: String, reason: String },
}

/// A sequential supplier of decoded frames.
pub trait FrameSource: Send {
    /// Produce the next frame. `Ok(None)` means the source is exhausted and
    /// will not yield again.
    fn read_frame(&mut self) -> Result<Option<RgbImage>, CaptureError>;
}

/// Frames decoded from a sorted directory of image files.
///
/// With `looped` set the sequence restarts at the end, which turns a frame
/// directory into a stand-in live feed for builds without device capture.
#[derive(Debug)]
pub struct ImageSequenceSource {
    frames: Vec<std::path::PathBuf>,
    index: usize,
    looped: bool,
}

impl ImageSequenceSource {
    pub fn open<P: AsRef<Path>>(dir: P, looped: bool) -> Result<Self, CaptureError> {
        let dir = dir.as_ref();
        let entries = std::fs::read_dir(dir).map_err(|e| CaptureError::Open {
            uri: dir.display().to_string(),
            reason: e.to_string(),
        })?;

        let mut frames: Vec<_> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                matches!(
                    path.extension().and_then(|e| e.to_str()),
                    Some("jpg" | "jpeg" | "png" | "bmp")
                )
            })
            .collect();
        frames.sort();

        if frames.is_empty() {
            return Err(CaptureError::Open {
                uri: dir.display().to_string(),
                reason: "no image frames in directory".to_string(),
            });
        }

        Ok(Self {
            frames,
            index: 0,
            looped,
        })
    }
}

impl FrameSource for ImageSequenceSource {
    fn read_frame(&mut self) -> Result<Option<RgbImage>, CaptureError> {
        if self.index >= self.frames.len() {
            if !self.looped {
                return Ok(None);
            }
            self.index = 0;
        }

        let path = &self.frames[self.index];
        self.index += 1;

        match image::open(path) {
            Ok(img) => Ok(Some(img.to_rgb8())),
            // Advance past the bad file so the next cycle can recover
            Err(e) => Err(CaptureError::Decode {
                path: path.display().to_string(),
                reason: e.to_string(),
            }),
        }
    }
}

/// OpenCV-backed capture from a V4L device or a video file.
#[cfg(feature = "camera")]
pub struct CameraSource {
    capture: opencv::videoio::VideoCapture,
    /// File-backed captures end; device captures treat a failed read as a
    /// skippable cycle instead.
    finite: bool,
    uri: String,
}

#[cfg(feature = "camera")]
impl CameraSource {
    /// Open a live device by index or `/dev/videoN` path at 640x480.
    pub fn open_device(uri: &str) -> Result<Self, CaptureError> {
        use opencv::videoio::{self, VideoCapture, VideoCaptureTrait};

        let index = parse_device_index(uri).ok_or_else(|| CaptureError::Open {
            uri: uri.to_string(),
            reason: "not a device index or /dev/videoN path".to_string(),
        })?;

        let mut capture = None;
        for backend in [videoio::CAP_V4L, videoio::CAP_ANY] {
            if let Ok(cap) = VideoCapture::new(index, backend) {
                if matches!(opencv::videoio::VideoCaptureTraitConst::is_opened(&cap), Ok(true)) {
                    capture = Some(cap);
                    break;
                }
            }
        }
        let mut capture = capture.ok_or_else(|| CaptureError::Open {
            uri: uri.to_string(),
            reason: "device could not be opened".to_string(),
        })?;

        let _ = capture.set(videoio::CAP_PROP_FRAME_WIDTH, 640.0);
        let _ = capture.set(videoio::CAP_PROP_FRAME_HEIGHT, 480.0);

        Ok(Self {
            capture,
            finite: false,
            uri: uri.to_string(),
        })
    }

    /// Open a video file for sequential, finite reading.
    pub fn open_file(path: &str) -> Result<Self, CaptureError> {
        use opencv::videoio::{self, VideoCapture};

        let capture = VideoCapture::from_file(path, videoio::CAP_ANY).map_err(|e| {
            CaptureError::Open {
                uri: path.to_string(),
                reason: e.to_string(),
            }
        })?;
        if !matches!(opencv::videoio::VideoCaptureTraitConst::is_opened(&capture), Ok(true)) {
            return Err(CaptureError::Open {
                uri: path.to_string(),
                reason: "file could not be opened".to_string(),
            });
        }

        Ok(Self {
            capture,
            finite: true,
            uri: path.to_string(),
        })
    }
}

#[cfg(feature = "camera")]
impl FrameSource for CameraSource {
    fn read_frame(&mut self) -> Result<Option<RgbImage>, CaptureError> {
        use opencv::core::{Mat, MatTraitConst, MatTraitConstManual};
        use opencv::videoio::VideoCaptureTrait;

        let mut frame = Mat::default();
        let ok = self
            .capture
            .read(&mut frame)
            .map_err(|e| CaptureError::Read(e.to_string()))?;

        let size = frame.size().map_err(|e| CaptureError::Read(e.to_string()))?;
        if !ok || size.width <= 0 || size.height <= 0 {
            if self.finite {
                return Ok(None);
            }
            return Err(CaptureError::Read(format!(
                "device {} returned no frame",
                self.uri
            )));
        }

        let data = frame
            .data_bytes()
            .map_err(|e| CaptureError::Read(e.to_string()))?;
        let (width, height) = (size.width as u32, size.height as u32);

        // OpenCV frames are BGR
        let mut rgb = Vec::with_capacity(data.len());
        for px in data.chunks_exact(3) {
            rgb.extend_from_slice(&[px[2], px[1], px[0]]);
        }

        RgbImage::from_vec(width, height, rgb)
            .map(Some)
            .ok_or_else(|| CaptureError::Read("unexpected frame layout".to_string()))
    }
}

/// Parse a `/dev/videoN` style URI or bare index.
#[cfg(feature = "camera")]
fn parse_device_index(uri: &str) -> Option<i32> {
    if let Ok(index) = uri.parse::<i32>() {
        return Some(index);
    }
    uri.strip_prefix("/dev/video")
        .and_then(|rest| rest.parse::<i32>().ok())
}

/// Open the live source backing `/webcam` acquisition.
pub fn open_live_source(config: &NodeConfig) -> Result<Box<dyn FrameSource>, CaptureError> {
    let path = Path::new(&config.camera_source);
    if path.is_dir() {
        return Ok(Box::new(ImageSequenceSource::open(path, true)?));
    }

    #[cfg(feature = "camera")]
    return Ok(Box::new(CameraSource::open_device(&config.camera_source)?));

    #[cfg(not(feature = "camera"))]
    Err(CaptureError::Open {
        uri: config.camera_source.clone(),
        reason: "built without the camera feature; CAMERA_SOURCE must be a frame directory"
            .to_string(),
    })
}

/// Open the finite source backing one `/video` request.
pub fn open_video_source(config: &NodeConfig) -> Result<Box<dyn FrameSource>, CaptureError> {
    let path = Path::new(&config.video_source);
    if path.is_dir() {
        return Ok(Box::new(ImageSequenceSource::open(path, false)?));
    }

    #[cfg(feature = "camera")]
    return Ok(Box::new(CameraSource::open_file(&config.video_source)?));

    #[cfg(not(feature = "camera"))]
    Err(CaptureError::Open {
        uri: config.video_source.clone(),
        reason: "built without the camera feature; VIDEO_SOURCE must be a frame directory"
            .to_string(),
    })
}
