// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Background acquisition and processing loops
//!
//! Both loops are process-lifetime daemons spawned once by the session
//! manager. Capture and inference are blocking calls, so each cycle hops to
//! the blocking pool and hands the source back afterwards. A failed cycle is
//! skipped, never fatal; only an unopenable live source ends the acquisition
//! loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, error, warn};

use super::frame_buffer::SharedFrameBuffer;
use super::source::{CaptureError, FrameSource};
use crate::vision::DetectionPipeline;

/// Builds the live frame source for the acquisition loop. Invoked exactly
/// once per process, on the blocking pool.
pub type SourceFactory =
    Arc<dyn Fn() -> Result<Box<dyn FrameSource>, CaptureError> + Send + Sync>;

/// Continuously capture frames into the raw slot.
///
/// Older unconsumed raw frames are overwritten; only the latest matters for
/// a live feed.
pub async fn acquisition_loop(
    factory: SourceFactory,
    buffer: Arc<SharedFrameBuffer>,
    interval: Duration,
) {
    let opened = tokio::task::spawn_blocking(move || factory()).await;
    let mut source = match opened {
        Ok(Ok(source)) => source,
        Ok(Err(e)) => {
            // Device unavailable is fatal to this loop and reported once
            error!("live source unavailable, acquisition loop stopped: {e}");
            return;
        }
        Err(e) => {
            error!("source open task failed: {e}");
            return;
        }
    };

    debug!("acquisition loop started");
    let mut capture_failing = false;
    loop {
        let step = tokio::task::spawn_blocking(move || {
            let frame = source.read_frame();
            (source, frame)
        })
        .await;

        let (returned, frame) = match step {
            Ok(v) => v,
            Err(e) => {
                error!("capture task failed, acquisition loop stopped: {e}");
                return;
            }
        };
        source = returned;

        match frame {
            Ok(Some(frame)) => {
                buffer.set_raw(frame);
                capture_failing = false;
            }
            Ok(None) => {
                if !capture_failing {
                    warn!("live source yielded no frame, skipping cycle");
                    capture_failing = true;
                }
            }
            Err(e) => {
                // One failed capture is a skipped cycle. Log the first of a
                // run at warn, the rest at debug.
                if !capture_failing {
                    warn!("frame capture failed, skipping cycle: {e}");
                    capture_failing = true;
                } else {
                    debug!("frame capture still failing: {e}");
                }
            }
        }

        sleep(interval).await;
    }
}

/// Continuously run the detection pipeline over the latest raw frame and
/// publish the annotated result.
///
/// This is the rate-limiting stage: it always consumes the most recent raw
/// frame rather than a queue, so it lags the feed by dropping stale frames
/// instead of backlogging.
pub async fn processing_loop(
    buffer: Arc<SharedFrameBuffer>,
    pipeline: Arc<DetectionPipeline>,
    interval: Duration,
) {
    debug!("processing loop started");
    loop {
        if let Some(frame) = buffer.latest_raw() {
            let pipeline = pipeline.clone();
            match tokio::task::spawn_blocking(move || pipeline.detect_and_annotate(&frame)).await {
                Ok(Ok(summary)) => buffer.set_annotated(summary.annotated),
                Ok(Err(e)) => warn!("pipeline failed for one frame, skipping cycle: {e}"),
                Err(e) => warn!("pipeline task failed, skipping cycle: {e}"),
            }
        }

        sleep(interval).await;
    }
}
