//! Handsign AI Core
//!
//! Model types and portable export for the hand-sign letter classifier.
//!
//! Modules:
//! - `forest`: Random-forest model, trees and fixed hyperparameters
//! - `artifact`: Native artifact encoding with BLAKE3 integrity sidecars
//! - `onnx`: ONNX `TreeEnsembleClassifier` export, ONNX Runtime and in-process evaluation
//! - `landmarks`: Wrist-relative feature vectors from tracked landmarks
//! - `smoothing`: Confidence gate and rolling majority vote for live frames
//! - `serde_canon`: Canonical JSON and hashing helpers

pub mod artifact;
pub mod errors;
pub mod forest;
pub mod landmarks;
pub mod onnx;
pub mod serde_canon;
pub mod smoothing;

use std::path::Path;
use tracing::info;

pub use artifact::{load_artifact, save_artifact, ArtifactFormat, SavedArtifact};
pub use errors::CoreError;
pub use forest::{ForestModel, ForestParams, MaxFeatures, ModelError, Node, Tree};
pub use landmarks::{
    is_hand_open, normalize_and_flatten, Landmark, FEATURE_COUNT, LANDMARK_COUNT,
};
pub use onnx::{
    convert_forest, describe_io, load_onnx, save_onnx, ConvertOptions, GraphIo, OrtSession,
    TreeEnsembleSession,
};
pub use smoothing::{PredictionSmoother, SmoothingConfig};

/// Crate version string recorded as the ONNX producer version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Convert a native artifact on disk into an ONNX file.
///
/// Returns the I/O declaration of the graph as read back from `output`.
pub fn convert_artifact(
    input: &Path,
    output: &Path,
    options: &ConvertOptions,
) -> errors::Result<GraphIo> {
    let model = load_artifact(input)?;
    info!(
        "Loaded model: {} trees, {} classes, {} features",
        model.num_trees(),
        model.num_classes(),
        model.feature_count
    );

    let onnx = convert_forest(&model, options)?;
    let bytes = save_onnx(output, &onnx)?;
    info!("Wrote {} bytes to {}", bytes, output.display());

    let reloaded = load_onnx(output)?;
    Ok(describe_io(&reloaded)?)
}
