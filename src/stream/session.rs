// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! One-time startup of the live streaming loops

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::info;

use super::frame_buffer::SharedFrameBuffer;
use super::loops::{acquisition_loop, processing_loop, SourceFactory};
use crate::vision::DetectionPipeline;

/// Pacing delays for the two background loops. Processing is deliberately
/// slower than capture; it is the expensive stage and always works on the
/// latest frame anyway.
#[derive(Debug, Clone, Copy)]
pub struct LoopPacing {
    pub capture_interval: Duration,
    pub process_interval: Duration,
}

impl Default for LoopPacing {
    fn default() -> Self {
        Self {
            capture_interval: Duration::from_millis(10),
            process_interval: Duration::from_millis(100),
        }
    }
}

/// Owns the shared frame buffer and starts the acquisition/processing loop
/// pair exactly once per process lifetime.
///
/// The started flag only ever transitions `false -> true`; the loops have no
/// cancellation path and run until the process exits.
pub struct StreamSessionManager {
    buffer: Arc<SharedFrameBuffer>,
    pipeline: Arc<DetectionPipeline>,
    source_factory: SourceFactory,
    pacing: LoopPacing,
    started: Mutex<bool>,
}

impl StreamSessionManager {
    pub fn new(
        pipeline: Arc<DetectionPipeline>,
        source_factory: SourceFactory,
        pacing: LoopPacing,
    ) -> Self {
        Self {
            buffer: Arc::new(SharedFrameBuffer::new()),
            pipeline,
            source_factory,
            pacing,
            started: Mutex::new(false),
        }
    }

    pub fn buffer(&self) -> &Arc<SharedFrameBuffer> {
        &self.buffer
    }

    pub fn is_started(&self) -> bool {
        *self.started.lock()
    }

    /// Spawn the loop pair if this is the first call; otherwise a no-op.
    ///
    /// The flag is checked and flipped under one lock, so concurrent callers
    /// cannot both spawn. Must run inside a tokio runtime.
    pub fn ensure_started(&self) {
        let mut started = self.started.lock();
        if *started {
            return;
        }

        info!("starting live acquisition and processing loops");
        tokio::spawn(acquisition_loop(
            self.source_factory.clone(),
            self.buffer.clone(),
            self.pacing.capture_interval,
        ));
        tokio::spawn(processing_loop(
            self.buffer.clone(),
            self.pipeline.clone(),
            self.pacing.process_interval,
        ));
        *started = true;
    }
}
