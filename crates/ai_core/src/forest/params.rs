//! Fixed forest hyperparameters
//!
//! The defaults reproduce the production classifier: 200 fully grown Gini
//! trees on bootstrap samples, `sqrt(n_features)` candidates per split and
//! seed 42.

use serde::{Deserialize, Serialize};

/// Number of candidate features drawn at each split
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MaxFeatures {
    #[default]
    Sqrt,
    Log2,
    All,
    Count(usize),
}

impl MaxFeatures {
    /// Resolve the policy for a dataset with `n_features` columns (always >= 1)
    pub fn resolve(self, n_features: usize) -> usize {
        let n = n_features.max(1);
        let k = match self {
            MaxFeatures::Sqrt => (n as f64).sqrt().floor() as usize,
            MaxFeatures::Log2 => (n as f64).log2().floor() as usize,
            MaxFeatures::All => n,
            MaxFeatures::Count(k) => k,
        };
        k.clamp(1, n)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub seed: u64,
    pub max_features: MaxFeatures,
    /// `None` grows trees until leaves are pure
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub bootstrap: bool,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 200,
            seed: 42,
            max_features: MaxFeatures::Sqrt,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            bootstrap: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqrt_of_landmark_features() {
        assert_eq!(MaxFeatures::Sqrt.resolve(63), 7);
        assert_eq!(MaxFeatures::Log2.resolve(63), 5);
        assert_eq!(MaxFeatures::All.resolve(63), 63);
    }

    #[test]
    fn test_resolve_is_clamped() {
        assert_eq!(MaxFeatures::Count(0).resolve(10), 1);
        assert_eq!(MaxFeatures::Count(99).resolve(10), 10);
        assert_eq!(MaxFeatures::Sqrt.resolve(1), 1);
    }

    #[test]
    fn test_defaults_match_production_classifier() {
        let params = ForestParams::default();
        assert_eq!(params.n_estimators, 200);
        assert_eq!(params.seed, 42);
        assert_eq!(params.max_depth, None);
        assert!(params.bootstrap);
    }
}
