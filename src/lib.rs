// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! License-plate detection and recognition node
//!
//! An HTTP service that finds license plates in images and video, reads
//! their text, and serves annotated results three ways: a synchronous
//! detect endpoint for single images, a live MJPEG stream backed by a
//! shared capture/processing loop pair, and a per-request MJPEG stream
//! over a configured video source.

pub mod api;
pub mod config;
pub mod stream;
pub mod vision;

pub use api::{router, start_server, AppState};
pub use config::NodeConfig;
pub use vision::DetectionPipeline;
