//! Training configuration
//!
//! Every field has a default, so an empty TOML file (or none at all)
//! reproduces the stock run: `asl_static_dataset.csv` in, an 80/20 split
//! with seed 42, a 200-tree forest and `asl_model.pkl` out.

use handsign_ai_core::{ForestParams, FEATURE_COUNT};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::errors::TrainerError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SplitConfig {
    pub test_size: f64,
    pub seed: u64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            test_size: 0.2,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TrainConfig {
    /// Labeled landmark CSV
    pub input: PathBuf,
    /// Native artifact path; a `.json` extension selects canonical JSON
    pub output: PathBuf,
    pub label_column: String,
    /// `None` accepts any consistent feature count
    pub expected_features: Option<usize>,
    /// Optional JSON copy of the classification report
    pub report_path: Option<PathBuf>,
    pub split: SplitConfig,
    pub forest: ForestParams,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::from("asl_static_dataset.csv"),
            output: PathBuf::from("asl_model.pkl"),
            label_column: "label".to_string(),
            expected_features: Some(FEATURE_COUNT),
            report_path: None,
            split: SplitConfig::default(),
            forest: ForestParams::default(),
        }
    }
}

impl TrainConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, TrainerError> {
        let config: Self = toml::from_str(content)
            .map_err(|e| TrainerError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self, TrainerError> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        let content = std::fs::read_to_string(path).map_err(|e| {
            TrainerError::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn to_toml_string(&self) -> Result<String, TrainerError> {
        toml::to_string_pretty(self)
            .map_err(|e| TrainerError::Config(format!("Failed to encode config: {}", e)))
    }

    pub fn validate(&self) -> Result<(), TrainerError> {
        if !(self.split.test_size > 0.0 && self.split.test_size < 1.0) {
            return Err(TrainerError::Config(format!(
                "split.test_size must be in (0, 1), got {}",
                self.split.test_size
            )));
        }
        if self.forest.n_estimators == 0 {
            return Err(TrainerError::Config(
                "forest.n_estimators must be at least 1".to_string(),
            ));
        }
        if self.forest.min_samples_leaf == 0 {
            return Err(TrainerError::Config(
                "forest.min_samples_leaf must be at least 1".to_string(),
            ));
        }
        if self.forest.min_samples_split < 2 {
            return Err(TrainerError::Config(
                "forest.min_samples_split must be at least 2".to_string(),
            ));
        }
        if self.label_column.is_empty() {
            return Err(TrainerError::Config("label_column must not be empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use handsign_ai_core::MaxFeatures;
    use tempfile::tempdir;

    #[test]
    fn test_empty_config_is_stock_run() {
        let config = TrainConfig::from_toml_str("").unwrap();
        assert_eq!(config, TrainConfig::default());
        assert_eq!(config.forest.n_estimators, 200);
        assert_eq!(config.forest.seed, 42);
        assert_eq!(config.split.seed, 42);
        assert_eq!(config.split.test_size, 0.2);
        assert_eq!(config.output, PathBuf::from("asl_model.pkl"));
    }

    #[test]
    fn test_partial_override() {
        let config = TrainConfig::from_toml_str(
            r#"
            input = "data/train.csv"

            [forest]
            n_estimators = 25
            max_features = "log2"

            [split]
            test_size = 0.25
            "#,
        )
        .unwrap();

        assert_eq!(config.input, PathBuf::from("data/train.csv"));
        assert_eq!(config.forest.n_estimators, 25);
        assert_eq!(config.forest.max_features, MaxFeatures::Log2);
        assert_eq!(config.forest.seed, 42);
        assert_eq!(config.split.test_size, 0.25);
        assert_eq!(config.split.seed, 42);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            TrainConfig::from_toml_str("[split]\ntest_size = 1.5\n"),
            Err(TrainerError::Config(_))
        ));
        assert!(TrainConfig::from_toml_str("[forest]\nn_estimators = 0\n").is_err());
        assert!(TrainConfig::from_toml_str("[forest]\nn_estimators = \"many\"\n").is_err());
    }

    #[test]
    fn test_config_save_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("train.toml");

        let mut config = TrainConfig::default();
        config.forest.max_depth = Some(12);
        config.report_path = Some(PathBuf::from("report.json"));
        std::fs::write(&path, config.to_toml_string().unwrap()).unwrap();

        assert_eq!(TrainConfig::from_toml_file(&path).unwrap(), config);
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            TrainConfig::from_toml_file("/definitely/not/here.toml"),
            Err(TrainerError::Config(_))
        ));
    }
}
