//! Error types for the core crate

use crate::forest::ModelError;
use crate::onnx::OnnxError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    /// Native model could not be read, written or validated
    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    /// ONNX export or evaluation failed
    #[error("ONNX error: {0}")]
    Onnx(#[from] OnnxError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
