//! ONNX model loader

use super::inference::OnnxEstimator;
use anyhow::{Context, Result};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::ValueType;
use std::path::Path;
use std::sync::Mutex;
use tracing::{info, warn};

/// Loader for ONNX classifiers
#[derive(Debug, Clone)]
pub struct ModelLoader {
    /// Number of threads for ONNX inference
    onnx_threads: usize,
}

impl ModelLoader {
    /// Create a new model loader with the given intra-op thread count
    pub fn with_threads(onnx_threads: usize) -> Self {
        Self {
            onnx_threads: onnx_threads.max(1),
        }
    }

    /// Load a single ONNX classifier from file.
    ///
    /// The expected width is the static feature dimension of the first input;
    /// `configured_width` is used only when that dimension is symbolic.
    pub fn load_model<P: AsRef<Path>>(
        &self,
        path: P,
        name: &str,
        configured_width: Option<usize>,
    ) -> Result<OnnxEstimator> {
        let path = path.as_ref();
        if !path.exists() {
            anyhow::bail!("Model file not found: {}", path.display());
        }

        info!(model = %name, path = %path.display(), threads = self.onnx_threads, "Loading ONNX model");

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(self.onnx_threads)?
            .commit_from_file(path)
            .context(format!("Failed to load model from {:?}", path))?;

        let input = session
            .inputs
            .first()
            .context("Model declares no inputs")?;
        let input_name = input.name.clone();

        let declared_width = match &input.input_type {
            ValueType::Tensor { shape, .. } => shape.last().copied().filter(|d| *d > 0),
            _ => None,
        }
        .map(|d| d as usize);

        let width = match (declared_width, configured_width) {
            (Some(declared), Some(configured)) if declared != configured => {
                warn!(
                    model = %name,
                    declared,
                    configured,
                    "Configured feature count disagrees with model input, using model input"
                );
                declared
            }
            (Some(declared), _) => declared,
            (None, Some(configured)) => configured,
            (None, None) => anyhow::bail!(
                "Model {} has a symbolic feature dimension and no expected_features is configured",
                name
            ),
        };

        let label_output = session
            .outputs
            .iter()
            .find(|o| o.name.contains("label"))
            .map(|o| o.name.clone());

        let probability_output = session
            .outputs
            .iter()
            .find(|o| o.name.contains("prob"))
            .map(|o| o.name.clone());

        info!(
            model = %name,
            input = %input_name,
            width,
            label = ?label_output,
            probabilities = ?probability_output,
            "Model loaded successfully"
        );

        Ok(OnnxEstimator {
            name: name.to_string(),
            session: Mutex::new(session),
            input_name,
            label_output,
            probability_output,
            width,
        })
    }
}

impl Default for ModelLoader {
    fn default() -> Self {
        Self { onnx_threads: 1 }
    }
}
