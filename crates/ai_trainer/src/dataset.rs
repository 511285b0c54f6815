//! CSV dataset loading
//!
//! Reads the landmark dataset: a header row, float feature columns in
//! header order and one categorical label column (`label` by default).

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::Path;

/// Loader settings
#[derive(Clone, Debug)]
pub struct CsvOptions {
    pub label_column: String,
    /// Reject files whose feature count differs from this
    pub expected_features: Option<usize>,
    /// Fail when the label column is absent (prediction inputs may omit it)
    pub require_label: bool,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            label_column: "label".to_string(),
            expected_features: Some(handsign_ai_core::FEATURE_COUNT),
            require_label: true,
        }
    }
}

/// Training dataset with float features and string labels
#[derive(Clone, Debug)]
pub struct Dataset {
    pub feature_names: Vec<String>,
    pub features: Vec<Vec<f32>>,
    /// Empty when the source had no label column
    pub labels: Vec<String>,
    pub feature_count: usize,
}

impl Dataset {
    /// Load a labeled dataset with the default 63-feature schema
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_csv_with(path, &CsvOptions::default())
    }

    pub fn from_csv_with<P: AsRef<Path>>(path: P, options: &CsvOptions) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read CSV file {}", path.display()))?;
        Self::parse(&content, options)
    }

    /// Parse CSV text (header row required)
    pub fn parse(content: &str, options: &CsvOptions) -> Result<Self> {
        let mut lines = content
            .lines()
            .enumerate()
            .map(|(i, line)| (i + 1, line.trim()))
            .filter(|(_, line)| !line.is_empty());

        let (_, header) = lines.next().context("Dataset is empty")?;
        let columns: Vec<&str> = header.split(',').map(str::trim).collect();

        let label_idx = columns.iter().position(|c| *c == options.label_column);
        if label_idx.is_none() && options.require_label {
            anyhow::bail!("Missing label column '{}'", options.label_column);
        }

        let feature_names: Vec<String> = columns
            .iter()
            .enumerate()
            .filter(|(i, _)| Some(*i) != label_idx)
            .map(|(_, c)| c.to_string())
            .collect();
        let feature_count = feature_names.len();

        if feature_count == 0 {
            anyhow::bail!("Dataset has no feature columns");
        }
        if let Some(expected) = options.expected_features {
            if feature_count != expected {
                anyhow::bail!("Expected {} feature columns, found {}", expected, feature_count);
            }
        }

        let mut features = Vec::new();
        let mut labels = Vec::new();

        for (line_no, line) in lines {
            let parts: Vec<&str> = line.split(',').map(str::trim).collect();
            if parts.len() != columns.len() {
                anyhow::bail!(
                    "Line {}: expected {} columns, got {}",
                    line_no,
                    columns.len(),
                    parts.len()
                );
            }

            let mut row = Vec::with_capacity(feature_count);
            for (i, part) in parts.iter().enumerate() {
                if Some(i) == label_idx {
                    if part.is_empty() {
                        anyhow::bail!("Line {}: empty label", line_no);
                    }
                    labels.push(part.to_string());
                    continue;
                }

                let value = part.parse::<f32>().with_context(|| {
                    format!("Line {}, column '{}': invalid number '{}'", line_no, columns[i], part)
                })?;
                if !value.is_finite() {
                    anyhow::bail!("Line {}, column '{}': non-finite value", line_no, columns[i]);
                }
                row.push(value);
            }
            features.push(row);
        }

        if features.is_empty() {
            anyhow::bail!("Dataset has a header but no rows");
        }

        Ok(Self {
            feature_names,
            features,
            labels,
            feature_count,
        })
    }

    /// Get number of samples
    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn has_labels(&self) -> bool {
        !self.labels.is_empty()
    }

    /// `(rows, columns)` counting the label column, like a data frame shape
    pub fn shape(&self) -> (usize, usize) {
        let label_columns = usize::from(self.has_labels());
        (self.len(), self.feature_count + label_columns)
    }

    /// Samples per label, sorted by label
    pub fn class_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for label in &self.labels {
            *counts.entry(label.clone()).or_insert(0) += 1;
        }
        counts
    }

    /// New dataset holding the given rows, in the given order
    pub fn subset(&self, indices: &[usize]) -> Self {
        Self {
            feature_names: self.feature_names.clone(),
            features: indices.iter().map(|&i| self.features[i].clone()).collect(),
            labels: if self.has_labels() {
                indices.iter().map(|&i| self.labels[i].clone()).collect()
            } else {
                Vec::new()
            },
            feature_count: self.feature_count,
        }
    }

    /// Per-feature `(min, max)`
    pub fn feature_stats(&self) -> Vec<(f32, f32)> {
        let mut stats = vec![(f32::INFINITY, f32::NEG_INFINITY); self.feature_count];

        for row in &self.features {
            for (i, &val) in row.iter().enumerate() {
                stats[i].0 = stats[i].0.min(val);
                stats[i].1 = stats[i].1.max(val);
            }
        }

        stats
    }
}
