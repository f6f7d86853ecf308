// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Concurrent live-annotation machinery
//!
//! Data flow: live source -> acquisition loop -> raw slot -> processing
//! loop -> annotated slot -> MJPEG responder -> client. The two slots in
//! [`SharedFrameBuffer`] are the only state shared across loops.

pub mod frame_buffer;
pub mod loops;
pub mod mjpeg;
pub mod session;
pub mod source;

pub use frame_buffer::SharedFrameBuffer;
pub use loops::SourceFactory;
pub use mjpeg::MJPEG_CONTENT_TYPE;
pub use session::{LoopPacing, StreamSessionManager};
pub use source::{CaptureError, FrameSource, ImageSequenceSource};
