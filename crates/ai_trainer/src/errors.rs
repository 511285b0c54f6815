use handsign_ai_core::ModelError;
use thiserror::Error;

/// Errors returned by the deterministic trainer.
#[derive(Debug, Error)]
pub enum TrainerError {
    #[error("dataset error: {0}")]
    Dataset(String),

    #[error("split error: {0}")]
    Split(#[from] SplitError),

    #[error("training error: {0}")]
    Training(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("model error: {0}")]
    Model(#[from] ModelError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors from stratified train/test splitting.
#[derive(Debug, Error, PartialEq)]
pub enum SplitError {
    #[error("cannot split an empty dataset")]
    Empty,

    #[error("test size must be in (0, 1), got {0}")]
    InvalidTestSize(f64),

    #[error("class '{label}' has {count} member(s); at least 2 are needed to stratify")]
    ClassTooSmall { label: String, count: usize },

    #[error("{subset} set of {size} rows cannot hold all {classes} classes")]
    SubsetTooSmall {
        subset: &'static str,
        size: usize,
        classes: usize,
    },
}
