//! Random-forest classifier model
//!
//! Implements the fitted ensemble with:
//! - Class labels pinned to ascending order (probability column order)
//! - Soft-voting inference (mean of per-tree leaf distributions)
//! - Canonical JSON and `bincode` encodings
//! - BLAKE3 model hashing

use super::params::ForestParams;
use super::tree::Tree;
use crate::serde_canon::{hash_canonical_hex, to_canonical_json, CanonicalError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Model errors
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Model validation failed: {0}")]
    ValidationFailed(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Binary encoding error: {0}")]
    BincodeError(#[from] bincode::Error),

    #[error("Canonical serialization error: {0}")]
    CanonicalError(#[from] CanonicalError),

    #[error("Artifact hash mismatch: expected {expected}, found {actual}")]
    HashMismatch { expected: String, actual: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Current artifact layout version
pub const MODEL_VERSION: i32 = 1;

/// Fitted random-forest classifier
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ForestModel {
    /// Model format version
    pub version: i32,

    /// Distinct class labels in ascending order
    pub classes: Vec<String>,

    /// Number of input features every row must carry
    pub feature_count: usize,

    /// Decision trees in the ensemble
    pub trees: Vec<Tree>,

    /// Hyperparameters the trees were grown with
    pub params: ForestParams,
}

impl ForestModel {
    pub fn new(
        classes: Vec<String>,
        feature_count: usize,
        trees: Vec<Tree>,
        params: ForestParams,
    ) -> Self {
        Self {
            version: MODEL_VERSION,
            classes,
            feature_count,
            trees,
            params,
        }
    }

    /// Validate model structure
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.version != MODEL_VERSION {
            return Err(ModelError::ValidationFailed(format!(
                "Unsupported model version: {}",
                self.version
            )));
        }

        if self.classes.is_empty() {
            return Err(ModelError::ValidationFailed("Model has no classes".to_string()));
        }

        if self.classes.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err(ModelError::ValidationFailed(
                "Class labels must be unique and sorted".to_string(),
            ));
        }

        if self.feature_count == 0 {
            return Err(ModelError::ValidationFailed("Model has no features".to_string()));
        }

        if self.trees.is_empty() {
            return Err(ModelError::ValidationFailed("Model has no trees".to_string()));
        }

        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate(self.classes.len(), self.feature_count)
                .map_err(|e| {
                    ModelError::ValidationFailed(format!("Tree {} validation failed: {}", i, e))
                })?;
        }

        Ok(())
    }

    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn num_classes(&self) -> usize {
        self.classes.len()
    }

    /// Mean class probabilities for one feature row
    ///
    /// Each tree contributes `p / n_trees` in tree order, the same
    /// accumulation the exported ONNX graph performs.
    pub fn predict_proba_row(&self, features: &[f32]) -> Result<Vec<f32>, ModelError> {
        self.check_row(features)?;

        let n_trees = self.trees.len() as f32;
        let mut probabilities = vec![0.0f32; self.classes.len()];

        for (i, tree) in self.trees.iter().enumerate() {
            let distribution = tree.evaluate(features).ok_or_else(|| {
                ModelError::ValidationFailed(format!("Tree {} did not reach a leaf", i))
            })?;

            for (acc, p) in probabilities.iter_mut().zip(distribution) {
                *acc += p / n_trees;
            }
        }

        Ok(probabilities)
    }

    /// Index of the predicted class (first maximum wins)
    pub fn predict_index(&self, features: &[f32]) -> Result<usize, ModelError> {
        let probabilities = self.predict_proba_row(features)?;
        Ok(argmax(&probabilities))
    }

    /// Predicted label for one feature row
    pub fn predict_row(&self, features: &[f32]) -> Result<&str, ModelError> {
        let idx = self.predict_index(features)?;
        Ok(&self.classes[idx])
    }

    /// Predicted labels for a batch of rows
    pub fn predict(&self, rows: &[Vec<f32>]) -> Result<Vec<String>, ModelError> {
        rows.iter()
            .map(|row| self.predict_row(row).map(str::to_owned))
            .collect()
    }

    fn check_row(&self, features: &[f32]) -> Result<(), ModelError> {
        if features.len() != self.feature_count {
            return Err(ModelError::InvalidInput(format!(
                "expected {} features, got {}",
                self.feature_count,
                features.len()
            )));
        }
        Ok(())
    }

    /// Serialize model to canonical JSON (sorted keys, no whitespace)
    pub fn to_canonical_json(&self) -> Result<String, ModelError> {
        Ok(to_canonical_json(self)?)
    }

    /// Compute the model hash (BLAKE3 of canonical JSON) as hex
    pub fn hash_hex(&self) -> Result<String, ModelError> {
        Ok(hash_canonical_hex(self)?)
    }

    pub fn to_bincode(&self) -> Result<Vec<u8>, ModelError> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bincode(bytes: &[u8]) -> Result<Self, ModelError> {
        let model: ForestModel = bincode::deserialize(bytes)?;
        model.validate()?;
        Ok(model)
    }

    /// Save model to JSON file with canonical serialization
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<(), ModelError> {
        fs::write(path, self.to_canonical_json()?)?;
        Ok(())
    }

    /// Load model from JSON file
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self, ModelError> {
        let json = fs::read_to_string(path)?;
        let model: ForestModel = serde_json::from_str(&json)?;
        model.validate()?;
        Ok(model)
    }
}

/// Position of the first maximum; NaN never wins
pub fn argmax(values: &[f32]) -> usize {
    let mut best = 0usize;
    for (i, &value) in values.iter().enumerate().skip(1) {
        if value > values[best] {
            best = i;
        }
    }
    best
}
