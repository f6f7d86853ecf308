// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! MJPEG multipart framing and the streaming responders
//!
//! Both responders produce lazy byte-chunk sequences driven entirely by the
//! HTTP response lifecycle: dropping the stream (client disconnect) cancels
//! it without touching the background loops.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use async_stream::stream;
use bytes::Bytes;
use futures::Stream;
use tokio::time::sleep;
use tracing::warn;

use super::session::StreamSessionManager;
use super::source::FrameSource;
use crate::vision::{image_utils, DetectionPipeline};

/// Content type for the multipart frame streams.
pub const MJPEG_CONTENT_TYPE: &str = "multipart/x-mixed-replace; boundary=frame";

/// Frame one encoded image as a multipart chunk.
pub fn mjpeg_part(jpeg: &[u8]) -> Bytes {
    let mut payload = Vec::with_capacity(jpeg.len() + 48);
    payload.extend_from_slice(b"--frame\r\nContent-Type: image/jpeg\r\n\r\n");
    payload.extend_from_slice(jpeg);
    payload.extend_from_slice(b"\r\n");
    Bytes::from(payload)
}

/// Unbounded live stream over the annotated slot.
///
/// A pure reader: it polls at its own cadence, skips cycles where no
/// annotated frame exists yet, and always serves the latest frame available
/// (intermediate frames are silently dropped).
pub fn live_stream(
    session: Arc<StreamSessionManager>,
    interval: Duration,
    jpeg_quality: u8,
) -> impl Stream<Item = Result<Bytes, Infallible>> {
    stream! {
        loop {
            sleep(interval).await;
            let Some(frame) = session.buffer().latest_annotated() else {
                continue;
            };
            match image_utils::encode_jpeg(&frame, jpeg_quality) {
                Ok(jpeg) => yield Ok(mjpeg_part(&jpeg)),
                Err(e) => warn!("failed to encode annotated frame: {e}"),
            }
        }
    }
}

enum VideoStep {
    Part(Vec<u8>),
    Skip,
    End,
}

/// Finite, non-restartable stream over a file-backed source.
///
/// Detection runs inline per frame; each request owns its source and there
/// is no shared state. The stream ends when the source is exhausted.
pub fn video_stream(
    source: Box<dyn FrameSource>,
    pipeline: Arc<DetectionPipeline>,
    jpeg_quality: u8,
) -> impl Stream<Item = Result<Bytes, Infallible>> {
    stream! {
        let mut source = source;
        loop {
            let pipeline = pipeline.clone();
            let step = tokio::task::spawn_blocking(move || {
                let step = match source.read_frame() {
                    Ok(Some(frame)) => match pipeline.detect_and_annotate(&frame) {
                        Ok(summary) => {
                            match image_utils::encode_jpeg(&summary.annotated, jpeg_quality) {
                                Ok(jpeg) => VideoStep::Part(jpeg),
                                Err(e) => {
                                    warn!("failed to encode video frame: {e}");
                                    VideoStep::Skip
                                }
                            }
                        }
                        Err(e) => {
                            warn!("pipeline failed for one video frame, skipping: {e}");
                            VideoStep::Skip
                        }
                    },
                    Ok(None) => VideoStep::End,
                    Err(e) => {
                        warn!("video frame read failed, skipping: {e}");
                        VideoStep::Skip
                    }
                };
                (source, step)
            })
            .await;

            let (returned, step) = match step {
                Ok(v) => v,
                Err(e) => {
                    warn!("video frame task failed, ending stream: {e}");
                    break;
                }
            };
            source = returned;

            match step {
                VideoStep::Part(jpeg) => yield Ok(mjpeg_part(&jpeg)),
                VideoStep::Skip => continue,
                VideoStep::End => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::source::ImageSequenceSource;
    use crate::vision::detector::{Candidate, Detector, PlateBox};
    use crate::vision::recognizer::TextRecognizer;
    use anyhow::Result;
    use futures::StreamExt;
    use image::{GrayImage, Rgb, RgbImage};

    struct OneBoxDetector;

    impl Detector for OneBoxDetector {
        fn detect(&self, _image: &RgbImage) -> Result<Vec<Candidate>> {
            Ok(vec![Candidate {
                bbox: PlateBox::new(2, 2, 60, 30).unwrap(),
                confidence: Some(0.9),
            }])
        }
    }

    struct FixedRecognizer;

    impl TextRecognizer for FixedRecognizer {
        fn recognize(&self, _crop: &GrayImage) -> Result<Vec<String>> {
            Ok(vec!["AB123".to_string()])
        }
    }

    fn test_pipeline() -> Arc<DetectionPipeline> {
        Arc::new(DetectionPipeline::new(
            Arc::new(OneBoxDetector),
            Arc::new(FixedRecognizer),
            80,
        ))
    }

    #[test]
    fn test_mjpeg_part_framing() {
        let part = mjpeg_part(&[0xFF, 0xD8, 0xFF]);
        assert!(part.starts_with(b"--frame\r\nContent-Type: image/jpeg\r\n\r\n"));
        assert!(part.ends_with(b"\xFF\xD8\xFF\r\n"));
    }

    #[tokio::test]
    async fn test_video_stream_terminates_when_source_exhausted() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..3 {
            RgbImage::from_pixel(80, 60, Rgb([i * 10, 0, 0]))
                .save(dir.path().join(format!("f{i}.png")))
                .unwrap();
        }
        let source = Box::new(ImageSequenceSource::open(dir.path(), false).unwrap());

        let stream = video_stream(source, test_pipeline(), 80);
        let parts: Vec<_> = stream.collect().await;
        assert_eq!(parts.len(), 3);
        for part in parts {
            let part = part.unwrap();
            assert!(part.starts_with(b"--frame\r\n"));
        }
    }

    #[tokio::test]
    async fn test_video_stream_skips_undecodable_frames() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a_bad.png"), b"garbage").unwrap();
        RgbImage::from_pixel(80, 60, Rgb([1, 2, 3]))
            .save(dir.path().join("b_good.png"))
            .unwrap();
        let source = Box::new(ImageSequenceSource::open(dir.path(), false).unwrap());

        let stream = video_stream(source, test_pipeline(), 80);
        let parts: Vec<_> = stream.collect().await;
        // The bad frame is skipped, not fatal
        assert_eq!(parts.len(), 1);
    }
}
