//! Estimator interface and the ONNX Runtime implementation

use anyhow::{Context, Result};
use ort::memory::Allocator;
use ort::session::{Session, SessionOutputs};
use ort::value::{DowncastableTarget, DynMapValueType, DynSequenceValueType, DynValue, Tensor};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// A loaded classifier.
///
/// Rows passed to `predict` and `predict_proba` must have `expected_width()`
/// columns; callers check this before dispatching.
pub trait Estimator: Send + Sync {
    /// Number of input features the model was fitted on
    fn expected_width(&self) -> usize;

    /// Boolean fraud flag per row
    fn predict(&self, rows: &[&[f64]]) -> Result<Vec<bool>>;

    /// Per-row class probabilities (`[p_legit, p_fraud]`), or `None` if the
    /// model exposes no probability output
    fn predict_proba(&self, rows: &[&[f64]]) -> Result<Option<Vec<Vec<f64>>>>;
}

/// A run that panicked leaves the session itself intact, so a poisoned lock
/// is recovered instead of failing every later request for the domain.
fn lock_session<T>(session: &Mutex<T>) -> MutexGuard<'_, T> {
    session.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Classifier backed by an ONNX Runtime session
pub struct OnnxEstimator {
    pub(crate) name: String,
    pub(crate) session: Mutex<Session>,
    pub(crate) input_name: String,
    pub(crate) label_output: Option<String>,
    pub(crate) probability_output: Option<String>,
    pub(crate) width: usize,
}

impl OnnxEstimator {
    /// Run the session on a batch and hand the outputs to `read`
    fn run<T>(&self, rows: &[&[f64]], read: impl FnOnce(&SessionOutputs) -> Result<T>) -> Result<T> {
        let mut data = Vec::with_capacity(rows.len() * self.width);
        for row in rows {
            if row.len() != self.width {
                anyhow::bail!(
                    "Row has {} features, model {} expects {}",
                    row.len(),
                    self.name,
                    self.width
                );
            }
            data.extend(row.iter().map(|&v| v as f32));
        }

        // Input tensor shape [batch, num_features]
        let shape = vec![rows.len() as i64, self.width as i64];
        let input_tensor =
            Tensor::from_array((shape, data)).context("Failed to create input tensor")?;

        let mut session = lock_session(&self.session);
        let outputs = session.run(ort::inputs![&self.input_name => input_tensor])?;

        read(&outputs)
    }

    /// Labels from an int64 or float label tensor
    fn extract_labels(output: &DynValue) -> Result<Vec<bool>> {
        if let Ok((_, data)) = output.try_extract_tensor::<i64>() {
            return Ok(data.iter().map(|&label| label != 0).collect());
        }
        let (_, data) = output
            .try_extract_tensor::<f32>()
            .context("Label output is neither an int64 nor a float tensor")?;
        Ok(data.iter().map(|&label| label != 0.0).collect())
    }

    /// Probabilities from a `[batch, classes]` tensor or a `seq(map(int64, float))`
    fn extract_probabilities(&self, output: &DynValue, batch: usize) -> Result<Vec<Vec<f64>>> {
        if let Ok((shape, data)) = output.try_extract_tensor::<f32>() {
            let dims: Vec<i64> = shape.iter().copied().collect();
            let classes = match dims.as_slice() {
                [_, classes] => (*classes).max(1) as usize,
                _ => (data.len() / batch.max(1)).max(1),
            };
            debug!(model = %self.name, classes, "Extracted probabilities from tensor");
            return Ok(data
                .chunks(classes)
                .map(|row| row.iter().map(|&p| p as f64).collect())
                .collect());
        }

        let dtype = output.dtype();
        if DynSequenceValueType::can_downcast(&dtype) {
            return self.extract_from_sequence_map(output);
        }

        anyhow::bail!("Unsupported probability output for model {}", self.name)
    }

    /// Exporters that apply a zipmap emit one class-id -> probability map per row
    fn extract_from_sequence_map(&self, output: &DynValue) -> Result<Vec<Vec<f64>>> {
        let allocator = Allocator::default();

        let sequence = output
            .downcast_ref::<DynSequenceValueType>()
            .map_err(|e| anyhow::anyhow!("Failed to downcast to sequence: {}", e))?;

        let maps = sequence.try_extract_sequence::<DynMapValueType>(&allocator)?;

        let mut rows = Vec::with_capacity(maps.len());
        for map_value in &maps {
            let mut kv_pairs = map_value.try_extract_key_values::<i64, f32>()?;
            kv_pairs.sort_by_key(|(class_id, _)| *class_id);
            rows.push(kv_pairs.into_iter().map(|(_, p)| p as f64).collect());
        }

        debug!(model = %self.name, rows = rows.len(), "Extracted probabilities from seq(map)");
        Ok(rows)
    }
}

impl Estimator for OnnxEstimator {
    fn expected_width(&self) -> usize {
        self.width
    }

    fn predict(&self, rows: &[&[f64]]) -> Result<Vec<bool>> {
        match &self.label_output {
            Some(label_output) => self.run(rows, |outputs| {
                let output = outputs
                    .get(label_output.as_str())
                    .with_context(|| format!("Model output {} missing", label_output))?;
                Self::extract_labels(output)
            }),
            // No label head: the fraud class wins when it has the larger probability
            None => {
                let probabilities = self
                    .predict_proba(rows)?
                    .context("Model exposes neither labels nor probabilities")?;
                Ok(probabilities
                    .iter()
                    .map(|row| row.get(1).copied().unwrap_or(0.0) > row.first().copied().unwrap_or(0.0))
                    .collect())
            }
        }
    }

    fn predict_proba(&self, rows: &[&[f64]]) -> Result<Option<Vec<Vec<f64>>>> {
        let Some(probability_output) = &self.probability_output else {
            return Ok(None);
        };

        self.run(rows, |outputs| {
            let output = outputs
                .get(probability_output.as_str())
                .with_context(|| format!("Model output {} missing", probability_output))?;
            self.extract_probabilities(output, rows.len()).map(Some)
        })
    }
}
