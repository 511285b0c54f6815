//! End-to-end training run
//!
//! load -> stratified split -> fit -> evaluate on the held-out rows ->
//! save the native artifact and its hash sidecar.

use handsign_ai_core::serde_canon::hash_bytes_hex;
use handsign_ai_core::{save_artifact, ForestModel, SavedArtifact};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use tracing::info;

use crate::config::TrainConfig;
use crate::dataset::{CsvOptions, Dataset};
use crate::errors::TrainerError;
use crate::metrics::ClassificationReport;
use crate::split::stratified_split;
use crate::trainer::RandomForestTrainer;

/// Dataset read from disk together with the BLAKE3 digest of its bytes
#[derive(Debug, Clone)]
pub struct LoadedDataset {
    pub dataset: Dataset,
    pub hash_hex: String,
}

impl LoadedDataset {
    pub fn class_counts(&self) -> BTreeMap<String, usize> {
        self.dataset.class_counts()
    }
}

/// Summary of a finished training run
#[derive(Debug, Clone, Serialize)]
pub struct TrainOutcome {
    pub report: ClassificationReport,
    /// Hash of the model's canonical JSON form
    pub model_hash: String,
    /// Hash of the artifact bytes, as stored in the sidecar
    pub artifact_hash: String,
    pub artifact_path: String,
    pub artifact_bytes: usize,
    pub dataset_hash: String,
    pub n_train: usize,
    pub n_test: usize,
    pub classes: Vec<String>,
}

pub fn load_dataset(config: &TrainConfig) -> Result<LoadedDataset, TrainerError> {
    info!("Loading dataset from: {}", config.input.display());

    let input = config.input.display();
    let bytes = fs::read(&config.input)
        .map_err(|e| TrainerError::Dataset(format!("Failed to read {}: {}", input, e)))?;
    let content = std::str::from_utf8(&bytes)
        .map_err(|e| TrainerError::Dataset(format!("{} is not UTF-8: {}", input, e)))?;

    let options = CsvOptions {
        label_column: config.label_column.clone(),
        expected_features: config.expected_features,
        require_label: true,
    };
    let dataset = Dataset::parse(content, &options)
        .map_err(|e| TrainerError::Dataset(format!("{:#}", e)))?;

    let (rows, cols) = dataset.shape();
    info!("Loaded {} rows, {} columns", rows, cols);

    Ok(LoadedDataset {
        dataset,
        hash_hex: hash_bytes_hex(&bytes),
    })
}

/// Split, fit, evaluate and save
pub fn train_and_save(
    config: &TrainConfig,
    loaded: &LoadedDataset,
) -> Result<(ForestModel, TrainOutcome), TrainerError> {
    config.validate()?;
    let dataset = &loaded.dataset;

    let split = stratified_split(&dataset.labels, config.split.test_size, config.split.seed)?;
    info!(
        "Split {} rows into {} train / {} test (seed {})",
        dataset.len(),
        split.train.len(),
        split.test.len(),
        config.split.seed
    );

    let train = dataset.subset(&split.train);
    let test = dataset.subset(&split.test);

    let model =
        RandomForestTrainer::new(config.forest.clone()).fit(&train.features, &train.labels)?;

    let predictions = model.predict(&test.features)?;
    let report = ClassificationReport::new(&test.labels, &predictions);
    info!("Test accuracy: {:.4}", report.accuracy);

    let saved: SavedArtifact = save_artifact(&config.output, &model)?;
    info!(
        "Saved model to {} ({} bytes, blake3 {})",
        saved.path.display(),
        saved.bytes,
        saved.hash_hex
    );

    if let Some(path) = &config.report_path {
        fs::write(path, serde_json::to_string_pretty(&report)?)?;
        info!("Wrote report to {}", path.display());
    }

    let outcome = TrainOutcome {
        report,
        model_hash: model.hash_hex()?,
        artifact_hash: saved.hash_hex,
        artifact_path: saved.path.display().to_string(),
        artifact_bytes: saved.bytes,
        dataset_hash: loaded.hash_hex.clone(),
        n_train: split.train.len(),
        n_test: split.test.len(),
        classes: model.classes.clone(),
    };

    Ok((model, outcome))
}

/// Full run: load, then [`train_and_save`]
pub fn run(config: &TrainConfig) -> Result<TrainOutcome, TrainerError> {
    let loaded = load_dataset(config)?;
    let (_, outcome) = train_and_save(config, &loaded)?;
    Ok(outcome)
}
