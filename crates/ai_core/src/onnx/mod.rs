//! Portable inference graphs
//!
//! - `proto`: ONNX protobuf messages (`prost`)
//! - `convert`: forest -> `TreeEnsembleClassifier` graph, save/load, I/O listing
//! - `runtime`: in-process evaluation of the emitted graph
//! - `ort_session`: evaluation through ONNX Runtime

pub mod convert;
pub mod ort_session;
pub mod proto;
pub mod runtime;

use crate::forest::ModelError;
use thiserror::Error;

pub use convert::{
    convert_forest, describe_io, load_onnx, save_onnx, ConvertOptions, GraphIo, TensorDecl,
};
pub use ort_session::OrtSession;
pub use proto::ModelProto;
pub use runtime::{SessionOutput, TreeEnsembleSession};

#[derive(Error, Debug)]
pub enum OnnxError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Protobuf decode error: {0}")]
    Decode(#[from] prost::DecodeError),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("Invalid graph: {0}")]
    InvalidModel(String),

    #[error("Unsupported graph: {0}")]
    Unsupported(String),

    #[error("{node} is missing attribute {name}")]
    MissingAttribute { node: String, name: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("ONNX Runtime error: {0}")]
    Runtime(String),
}
