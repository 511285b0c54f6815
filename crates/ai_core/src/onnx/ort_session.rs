//! ONNX Runtime sessions
//!
//! Loads a written `.onnx` file through `ort` and reads the label and
//! probability outputs back into a [`SessionOutput`].

use super::runtime::SessionOutput;
use super::OnnxError;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::{Tensor, ValueType};
use std::fmt::Display;
use std::path::Path;
use tracing::debug;

fn runtime_error<E: Display>(stage: &'static str) -> impl FnOnce(E) -> OnnxError {
    move |err| OnnxError::Runtime(format!("{}: {}", stage, err))
}

/// A converted graph loaded into ONNX Runtime
pub struct OrtSession {
    session: Session,
    input_name: String,
    label_output: String,
    /// Flat `[batch, n_classes]` output; absent when the graph ends in ZipMap
    probability_output: Option<String>,
}

impl OrtSession {
    /// Load a graph with sequential execution, which keeps per-class sums in
    /// tree order
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, OnnxError> {
        let path = path.as_ref();
        let session = Session::builder()
            .map_err(runtime_error("session builder"))?
            .with_optimization_level(GraphOptimizationLevel::Level1)
            .map_err(runtime_error("optimization level"))?
            .with_intra_threads(1)
            .map_err(runtime_error("thread count"))?
            .commit_from_file(path)
            .map_err(runtime_error("load model"))?;

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .ok_or_else(|| OnnxError::InvalidModel("graph has no input".to_string()))?;
        let label_output = session
            .outputs
            .first()
            .map(|output| output.name.clone())
            .ok_or_else(|| OnnxError::InvalidModel("graph has no outputs".to_string()))?;
        let probability_output = session
            .outputs
            .get(1)
            .filter(|output| matches!(output.output_type, ValueType::Tensor { .. }))
            .map(|output| output.name.clone());

        debug!(
            "loaded {} into ONNX Runtime: input '{}', outputs {:?}",
            path.display(),
            input_name,
            session.outputs.iter().map(|o| o.name.as_str()).collect::<Vec<_>>()
        );

        Ok(Self {
            session,
            input_name,
            label_output,
            probability_output,
        })
    }

    pub fn input_name(&self) -> &str {
        &self.input_name
    }

    pub fn output_names(&self) -> Vec<&str> {
        self.session.outputs.iter().map(|o| o.name.as_str()).collect()
    }

    /// Whether the graph exposes a flat probability tensor
    pub fn has_probabilities(&self) -> bool {
        self.probability_output.is_some()
    }

    /// Labels for a row-major `[batch, n_features]` batch
    pub fn predict(&mut self, input: &[f32], n_features: usize) -> Result<Vec<String>, OnnxError> {
        let tensor = input_tensor(input, n_features)?;
        let outputs = self
            .session
            .run(ort::inputs![self.input_name.as_str() => tensor])
            .map_err(runtime_error("inference"))?;

        let (_, labels) = outputs[self.label_output.as_str()]
            .try_extract_strings()
            .map_err(runtime_error("label output"))?;
        Ok(labels)
    }

    /// Labels and class probabilities for a row-major `[batch, n_features]` batch
    pub fn run(&mut self, input: &[f32], n_features: usize) -> Result<SessionOutput, OnnxError> {
        let probability_output = self.probability_output.clone().ok_or_else(|| {
            OnnxError::Unsupported(
                "graph exposes probabilities only through ZipMap".to_string(),
            )
        })?;

        let batch = input.len() / n_features.max(1);
        let tensor = input_tensor(input, n_features)?;
        let outputs = self
            .session
            .run(ort::inputs![self.input_name.as_str() => tensor])
            .map_err(runtime_error("inference"))?;

        let (_, labels) = outputs[self.label_output.as_str()]
            .try_extract_strings()
            .map_err(runtime_error("label output"))?;
        let (shape, values) = outputs[probability_output.as_str()]
            .try_extract_tensor::<f32>()
            .map_err(runtime_error("probability output"))?;

        let dims: &[i64] = shape.as_ref();
        let n_classes = match dims {
            [rows, classes] if *rows as usize == batch => *classes as usize,
            other => {
                return Err(OnnxError::InvalidModel(format!(
                    "unexpected probability shape {:?} for {} rows",
                    other, batch
                )));
            }
        };

        Ok(SessionOutput {
            labels,
            probabilities: values.to_vec(),
            n_classes,
        })
    }

    /// Score one row
    pub fn run_row(&mut self, row: &[f32]) -> Result<(String, Vec<f32>), OnnxError> {
        let output = self.run(row, row.len())?;
        let label = output
            .labels
            .first()
            .cloned()
            .ok_or_else(|| OnnxError::InvalidModel("runtime returned no label".to_string()))?;
        Ok((label, output.row(0).to_vec()))
    }
}

fn input_tensor(input: &[f32], n_features: usize) -> Result<Tensor<f32>, OnnxError> {
    if n_features == 0 || input.is_empty() || input.len() % n_features != 0 {
        return Err(OnnxError::InvalidInput(format!(
            "input of length {} is not a non-empty multiple of {}",
            input.len(),
            n_features
        )));
    }

    let shape = vec![input.len() / n_features, n_features];
    Tensor::from_array((shape.as_slice(), input.to_vec()))
        .map_err(runtime_error("input tensor"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_runtime_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = OrtSession::open(dir.path().join("absent.onnx"));
        assert!(matches!(result, Err(OnnxError::Runtime(_))));
    }

    #[test]
    fn test_ragged_input_rejected_before_inference() {
        assert!(matches!(
            input_tensor(&[0.0; 5], 2),
            Err(OnnxError::InvalidInput(_))
        ));
        assert!(matches!(input_tensor(&[], 2), Err(OnnxError::InvalidInput(_))));
    }
}
