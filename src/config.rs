// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Environment-driven node configuration

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::stream::LoopPacing;

/// Runtime configuration, read once at startup. Every knob has a default so
/// a bare `plate-vision-node` starts against local models and device 0.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// HTTP listen port (`API_PORT`)
    pub api_port: u16,
    /// Live source: device index, `/dev/videoN`, or a frame directory
    /// (`CAMERA_SOURCE`)
    pub camera_source: String,
    /// File source backing `/video`: a video file or a frame directory
    /// (`VIDEO_SOURCE`)
    pub video_source: String,
    /// Plate detection ONNX model (`DETECTOR_MODEL_PATH`)
    pub detector_model_path: PathBuf,
    /// Text recognition ONNX model (`REC_MODEL_PATH`)
    pub rec_model_path: PathBuf,
    /// Recognition character dictionary (`REC_DICT_PATH`)
    pub rec_dict_path: PathBuf,
    /// Acquisition loop delay (`CAPTURE_INTERVAL_MS`)
    pub capture_interval: Duration,
    /// Processing loop delay (`PROCESS_INTERVAL_MS`)
    pub process_interval: Duration,
    /// Live responder poll delay (`STREAM_INTERVAL_MS`)
    pub stream_interval: Duration,
    /// JPEG quality for streamed and returned images (`JPEG_QUALITY`)
    pub jpeg_quality: u8,
}

impl NodeConfig {
    pub fn from_env() -> Self {
        Self {
            api_port: parse_env("API_PORT", 8000),
            camera_source: env::var("CAMERA_SOURCE").unwrap_or_else(|_| "0".to_string()),
            video_source: env::var("VIDEO_SOURCE")
                .unwrap_or_else(|_| "test_video.mp4".to_string()),
            detector_model_path: env::var("DETECTOR_MODEL_PATH")
                .unwrap_or_else(|_| "./models/plate_detect.onnx".to_string())
                .into(),
            rec_model_path: env::var("REC_MODEL_PATH")
                .unwrap_or_else(|_| "./models/rec_model.onnx".to_string())
                .into(),
            rec_dict_path: env::var("REC_DICT_PATH")
                .unwrap_or_else(|_| "./models/rec_keys.txt".to_string())
                .into(),
            capture_interval: Duration::from_millis(parse_env("CAPTURE_INTERVAL_MS", 10)),
            process_interval: Duration::from_millis(parse_env("PROCESS_INTERVAL_MS", 100)),
            stream_interval: Duration::from_millis(parse_env("STREAM_INTERVAL_MS", 30)),
            jpeg_quality: parse_env("JPEG_QUALITY", 80u8).clamp(1, 100),
        }
    }

    pub fn loop_pacing(&self) -> LoopPacing {
        LoopPacing {
            capture_interval: self.capture_interval,
            process_interval: self.process_interval,
        }
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

fn parse_env<T: std::str::FromStr + Copy>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = NodeConfig::from_env();
        assert!(config.jpeg_quality >= 1 && config.jpeg_quality <= 100);
        // Processing must pace slower than capture
        assert!(config.process_interval > config.capture_interval);
    }

    #[test]
    fn test_parse_env_falls_back_on_garbage() {
        std::env::set_var("PLATE_TEST_GARBAGE", "not-a-number");
        let value: u16 = parse_env("PLATE_TEST_GARBAGE", 42);
        assert_eq!(value, 42);
        std::env::remove_var("PLATE_TEST_GARBAGE");
    }
}
