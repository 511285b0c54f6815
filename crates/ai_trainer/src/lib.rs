//! Handsign AI Trainer - deterministic offline random-forest trainer
//!
//! Fits the hand-sign letter classifier from a landmark CSV. The same data
//! and seeds always give byte-identical artifacts.

pub mod cart;
pub mod config;
pub mod dataset;
pub mod deterministic;
pub mod errors;
pub mod metrics;
pub mod pipeline;
pub mod split;
pub mod trainer;

use handsign_ai_core::{ForestModel, ForestParams};
use std::path::Path;

pub use config::{SplitConfig, TrainConfig};
pub use dataset::{CsvOptions, Dataset};
pub use deterministic::{derive_tree_seed, SplitTieBreaker};
pub use errors::{SplitError, TrainerError};
pub use metrics::{ClassScores, ClassificationReport};
pub use pipeline::{load_dataset, run, train_and_save, LoadedDataset, TrainOutcome};
pub use split::{stratified_split, StratifiedSplit};
pub use trainer::RandomForestTrainer;

/// Fit a forest on every row of a labeled CSV, without holding out a test set.
pub fn train_model_from_csv(
    path: &Path,
    params: ForestParams,
) -> Result<ForestModel, TrainerError> {
    let dataset =
        Dataset::from_csv(path).map_err(|err| TrainerError::Dataset(format!("{:#}", err)))?;
    RandomForestTrainer::new(params).fit(&dataset.features, &dataset.labels)
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
