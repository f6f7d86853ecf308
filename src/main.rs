// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

use std::sync::Arc;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use plate_vision_node::api::{start_server, AppState};
use plate_vision_node::config::NodeConfig;
use plate_vision_node::stream::{source, SourceFactory, StreamSessionManager};
use plate_vision_node::vision::DetectionPipeline;

#[cfg(feature = "onnx")]
async fn build_pipeline(config: &NodeConfig) -> Result<Arc<DetectionPipeline>> {
    use anyhow::Context;

    use plate_vision_node::vision::onnx::{OnnxPlateDetector, OnnxTextRecognizer};

    let detector = OnnxPlateDetector::new(&config.detector_model_path)
        .await
        .with_context(|| {
            format!(
                "failed to load detector model from {}",
                config.detector_model_path.display()
            )
        })?;
    let recognizer = OnnxTextRecognizer::new(&config.rec_model_path, &config.rec_dict_path)
        .await
        .with_context(|| {
            format!(
                "failed to load recognition model from {}",
                config.rec_model_path.display()
            )
        })?;

    Ok(Arc::new(DetectionPipeline::new(
        Arc::new(detector),
        Arc::new(recognizer),
        config.jpeg_quality,
    )))
}

#[cfg(not(feature = "onnx"))]
async fn build_pipeline(_config: &NodeConfig) -> Result<Arc<DetectionPipeline>> {
    anyhow::bail!("built without the onnx feature; no detection backend available")
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = NodeConfig::from_env();
    info!(
        "starting plate-vision-node on port {} (camera source: {}, video source: {})",
        config.api_port, config.camera_source, config.video_source
    );

    let pipeline = build_pipeline(&config).await?;

    let factory_config = config.clone();
    let source_factory: SourceFactory =
        Arc::new(move || source::open_live_source(&factory_config));
    let session = Arc::new(StreamSessionManager::new(
        pipeline.clone(),
        source_factory,
        config.loop_pacing(),
    ));

    let state = AppState::new(pipeline, session, config);
    start_server(state).await
}
