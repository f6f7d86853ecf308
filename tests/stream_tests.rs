// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Tests for the shared live-stream session lifecycle

use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use image::{GrayImage, RgbImage};

use plate_vision_node::stream::{
    ImageSequenceSource, LoopPacing, SourceFactory, StreamSessionManager,
};
use plate_vision_node::vision::{Candidate, Detector, DetectionPipeline, TextRecognizer};

struct NullDetector;

impl Detector for NullDetector {
    fn detect(&self, _image: &RgbImage) -> anyhow::Result<Vec<Candidate>> {
        Ok(vec![])
    }
}

struct NullRecognizer;

impl TextRecognizer for NullRecognizer {
    fn recognize(&self, _crop: &GrayImage) -> anyhow::Result<Vec<String>> {
        Ok(vec![])
    }
}

fn stub_pipeline() -> Arc<DetectionPipeline> {
    Arc::new(DetectionPipeline::new(
        Arc::new(NullDetector),
        Arc::new(NullRecognizer),
        80,
    ))
}

fn frame_dir(frames: usize) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    for i in 0..frames {
        let img = RgbImage::from_pixel(32, 32, image::Rgb([i as u8 * 40, 0, 0]));
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        std::fs::write(dir.path().join(format!("frame_{i}.png")), buf).unwrap();
    }
    dir
}

fn fast_pacing() -> LoopPacing {
    LoopPacing {
        capture_interval: Duration::from_millis(1),
        process_interval: Duration::from_millis(1),
    }
}

#[tokio::test]
async fn ensure_started_opens_the_source_exactly_once() {
    let dir = frame_dir(2);
    let path = dir.path().to_path_buf();
    let opens = Arc::new(AtomicUsize::new(0));
    let opens_in_factory = opens.clone();

    let factory: SourceFactory = Arc::new(move || {
        opens_in_factory.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ImageSequenceSource::open(&path, true)?))
    });
    let session = Arc::new(StreamSessionManager::new(
        stub_pipeline(),
        factory,
        fast_pacing(),
    ));

    assert!(!session.is_started());
    for _ in 0..10 {
        session.ensure_started();
    }
    assert!(session.is_started());

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(opens.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn concurrent_callers_spawn_one_loop_pair() {
    let dir = frame_dir(1);
    let path = dir.path().to_path_buf();
    let opens = Arc::new(AtomicUsize::new(0));
    let opens_in_factory = opens.clone();

    let factory: SourceFactory = Arc::new(move || {
        opens_in_factory.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ImageSequenceSource::open(&path, true)?))
    });
    let session = Arc::new(StreamSessionManager::new(
        stub_pipeline(),
        factory,
        fast_pacing(),
    ));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let session = session.clone();
        handles.push(tokio::spawn(async move {
            session.ensure_started();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(opens.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn loops_fill_both_frame_slots() {
    let dir = frame_dir(3);
    let path = dir.path().to_path_buf();

    let factory: SourceFactory =
        Arc::new(move || Ok(Box::new(ImageSequenceSource::open(&path, true)?)));
    let session = Arc::new(StreamSessionManager::new(
        stub_pipeline(),
        factory,
        fast_pacing(),
    ));
    session.ensure_started();

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        if session.buffer().latest_annotated().is_some() {
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "no annotated frame appeared within the deadline"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(session.buffer().latest_raw().is_some());
}

#[tokio::test]
async fn unopenable_source_does_not_poison_the_session() {
    let factory: SourceFactory = Arc::new(|| {
        Ok(Box::new(ImageSequenceSource::open(
            "/nonexistent/frames",
            true,
        )?))
    });
    let session = Arc::new(StreamSessionManager::new(
        stub_pipeline(),
        factory,
        fast_pacing(),
    ));

    session.ensure_started();
    tokio::time::sleep(Duration::from_millis(50)).await;

    // The acquisition loop exits after the failed open; the session stays
    // marked started and the slots simply remain empty.
    assert!(session.is_started());
    assert!(session.buffer().latest_raw().is_none());
    assert!(session.buffer().latest_annotated().is_none());
}
