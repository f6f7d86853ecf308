// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! ONNX-backed text recognizer
//!
//! CTC recognition model plus a character dictionary, greedy-decoded. The
//! model consumes one normalized plate crop at a time and emits a single
//! text line.

use anyhow::{Context, Result};
use image::GrayImage;
use ndarray::IxDyn;
use ort::execution_providers::CPUExecutionProvider;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;
use parking_lot::Mutex;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::info;

use super::preprocessing::preprocess_for_recognition;
use crate::vision::recognizer::TextRecognizer;

/// Text recognition model running on CPU via ONNX Runtime.
pub struct OnnxTextRecognizer {
    session: Mutex<Session>,
    dictionary: Vec<String>,
    input_name: String,
}

impl std::fmt::Debug for OnnxTextRecognizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxTextRecognizer")
            .field("dictionary_size", &self.dictionary.len())
            .field("input_name", &self.input_name)
            .finish_non_exhaustive()
    }
}

impl OnnxTextRecognizer {
    /// Load the recognition model and its character dictionary.
    pub async fn new<P: AsRef<Path>>(model_path: P, dict_path: P) -> Result<Self> {
        let model_path = model_path.as_ref();
        let dict_path = dict_path.as_ref();

        if !model_path.exists() {
            anyhow::bail!("text recognition model not found: {}", model_path.display());
        }
        if !dict_path.exists() {
            anyhow::bail!("character dictionary not found: {}", dict_path.display());
        }

        info!("Loading text recognition model from {}", model_path.display());

        let dictionary = load_dictionary(dict_path)?;
        info!("Loaded character dictionary with {} entries", dictionary.len());

        let session = Session::builder()
            .context("Failed to create session builder")?
            .with_execution_providers([CPUExecutionProvider::default().build()])
            .context("Failed to set CPU execution provider")?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .context("Failed to set optimization level")?
            .with_intra_threads(4)
            .context("Failed to set intra threads")?
            .commit_from_file(model_path)
            .context(format!(
                "Failed to load text recognition model from {}",
                model_path.display()
            ))?;

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .unwrap_or_else(|| "x".to_string());

        info!("Text recognition model loaded (CPU-only)");

        Ok(Self {
            session: Mutex::new(session),
            dictionary,
            input_name,
        })
    }
}

impl TextRecognizer for OnnxTextRecognizer {
    fn recognize(&self, crop: &GrayImage) -> Result<Vec<String>> {
        let tensor = preprocess_for_recognition(crop);

        let input_value = Value::from_array(tensor).context("Failed to create input tensor")?;

        let mut session = self.session.lock();
        let outputs = session
            .run(ort::inputs![&self.input_name => input_value])
            .context("Recognition inference failed")?;

        let output = outputs[0]
            .try_extract_array::<f32>()
            .context("Failed to extract recognition output")?;

        let shape = output.shape().to_vec();
        anyhow::ensure!(
            shape.len() == 3 && shape[0] == 1,
            "Unexpected recognition output shape: {:?}, expected [1, T, C]",
            shape
        );
        let steps = shape[1];
        let classes = shape[2];

        // Greedy CTC decode: argmax per timestep, collapse repeats, drop the
        // blank class (index 0).
        let mut text = String::new();
        let mut prev = 0usize;
        for t in 0..steps {
            let mut best = 0usize;
            let mut best_score = f32::MIN;
            for c in 0..classes {
                let score = output[IxDyn(&[0, t, c])];
                if score > best_score {
                    best_score = score;
                    best = c;
                }
            }
            if best != 0 && best != prev {
                if let Some(token) = self.dictionary.get(best - 1) {
                    text.push_str(token);
                }
            }
            prev = best;
        }

        if text.trim().is_empty() {
            Ok(vec![])
        } else {
            Ok(vec![text])
        }
    }
}

/// One dictionary token per line; index 0 in the model output is the CTC
/// blank, so token i maps to class i+1.
fn load_dictionary(path: &Path) -> Result<Vec<String>> {
    let file = File::open(path)
        .context(format!("Failed to open dictionary {}", path.display()))?;
    let reader = BufReader::new(file);

    let mut dictionary = Vec::new();
    for line in reader.lines() {
        let line = line.context("Failed to read dictionary line")?;
        let token = line.trim_end_matches(['\r', '\n']);
        if !token.is_empty() {
            dictionary.push(token.to_string());
        }
    }

    anyhow::ensure!(!dictionary.is_empty(), "character dictionary is empty");
    Ok(dictionary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_model_not_found_error() {
        let result =
            OnnxTextRecognizer::new("/nonexistent/rec.onnx", "/nonexistent/keys.txt").await;
        let err = result.unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_load_dictionary() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "A").unwrap();
        writeln!(file, "B").unwrap();
        writeln!(file, "7").unwrap();
        let dict = load_dictionary(file.path()).unwrap();
        assert_eq!(dict, vec!["A", "B", "7"]);
    }

    #[test]
    fn test_load_dictionary_empty_fails() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(load_dictionary(file.path()).is_err());
    }
}
