//! Random forest trainer
//!
//! Grows `n_estimators` Gini trees, each on its own bootstrap sample with
//! an RNG derived from the forest seed and the tree index.

use handsign_ai_core::{ForestModel, ForestParams};
use rand::Rng;
use std::collections::BTreeSet;
use tracing::{debug, info};

use crate::cart::{CartBuilder, TreeConfig};
use crate::deterministic::tree_rng;
use crate::errors::TrainerError;

pub struct RandomForestTrainer {
    params: ForestParams,
}

impl RandomForestTrainer {
    pub fn new(params: ForestParams) -> Self {
        Self { params }
    }

    /// Fit a forest on `features` with one label per row.
    ///
    /// Classes are the sorted distinct labels; every probability vector the
    /// model produces follows that order.
    pub fn fit(
        &self,
        features: &[Vec<f32>],
        labels: &[String],
    ) -> Result<ForestModel, TrainerError> {
        if features.is_empty() {
            return Err(TrainerError::Training("cannot fit on zero samples".to_string()));
        }
        if features.len() != labels.len() {
            return Err(TrainerError::Training(format!(
                "{} rows but {} labels",
                features.len(),
                labels.len()
            )));
        }
        if self.params.n_estimators == 0 {
            return Err(TrainerError::Config("n_estimators must be at least 1".to_string()));
        }

        let feature_count = features[0].len();
        if feature_count == 0 {
            return Err(TrainerError::Training("rows have no features".to_string()));
        }
        if let Some(i) = features.iter().position(|row| row.len() != feature_count) {
            return Err(TrainerError::Training(format!(
                "row {} has {} features, expected {}",
                i,
                features[i].len(),
                feature_count
            )));
        }

        let classes: Vec<String> =
            labels.iter().cloned().collect::<BTreeSet<_>>().into_iter().collect();
        let targets: Vec<usize> = labels
            .iter()
            .map(|label| classes.binary_search(label).unwrap_or_default())
            .collect();

        let tree_config = TreeConfig {
            max_depth: self.params.max_depth,
            min_samples_split: self.params.min_samples_split.max(2),
            min_samples_leaf: self.params.min_samples_leaf.max(1),
            max_features: self.params.max_features.resolve(feature_count),
        };

        info!(
            "Fitting {} trees on {} samples ({} classes, {} candidate features per split)",
            self.params.n_estimators,
            features.len(),
            classes.len(),
            tree_config.max_features
        );

        let builder = CartBuilder::new(features, &targets, classes.len(), tree_config);
        let n = features.len();
        let mut trees = Vec::with_capacity(self.params.n_estimators);

        for tree_idx in 0..self.params.n_estimators {
            let mut rng = tree_rng(self.params.seed, tree_idx);

            let samples: Vec<usize> = if self.params.bootstrap {
                (0..n).map(|_| rng.gen_range(0..n)).collect()
            } else {
                (0..n).collect()
            };

            let tree = builder.build(&samples, &mut rng);
            debug!(
                "Tree {}/{}: {} nodes, depth {}",
                tree_idx + 1,
                self.params.n_estimators,
                tree.nodes.len(),
                tree.depth()
            );
            trees.push(tree);
        }

        let model = ForestModel::new(classes, feature_count, trees, self.params.clone());
        model.validate()?;
        Ok(model)
    }
}
