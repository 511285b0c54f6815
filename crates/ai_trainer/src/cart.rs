//! CART (Classification and Regression Tree) builder
//!
//! Grows a single Gini classification tree with exact-greedy splits over
//! a random subset of features at each node.

use handsign_ai_core::forest::{Node, Tree};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::deterministic::SplitTieBreaker;

/// Training parameters for a single tree
#[derive(Clone, Debug)]
pub struct TreeConfig {
    /// `None` grows until leaves are pure
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Candidate features evaluated per node (already resolved)
    pub max_features: usize,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: usize::MAX,
        }
    }
}

/// Split candidate with score and tie-breaker
#[derive(Debug, Clone)]
struct SplitCandidate {
    feature_idx: usize,
    threshold: f32,
    /// `sum(c_l^2)/n_l + sum(c_r^2)/n_r`; larger means lower weighted Gini
    score: f64,
    tie_breaker: SplitTieBreaker,
}

impl SplitCandidate {
    fn beats(&self, other: &SplitCandidate) -> bool {
        self.score > other.score
            || (self.score == other.score && self.tie_breaker < other.tie_breaker)
    }
}

/// Builds classification trees over a shared feature matrix
pub struct CartBuilder<'a> {
    config: TreeConfig,
    features: &'a [Vec<f32>],
    targets: &'a [usize],
    n_classes: usize,
    feature_count: usize,
}

impl<'a> CartBuilder<'a> {
    /// `targets[i]` is the class index of `features[i]`
    pub fn new(
        features: &'a [Vec<f32>],
        targets: &'a [usize],
        n_classes: usize,
        config: TreeConfig,
    ) -> Self {
        debug_assert_eq!(features.len(), targets.len());

        let feature_count = features.first().map_or(0, Vec::len);

        Self {
            config,
            features,
            targets,
            n_classes,
            feature_count,
        }
    }

    /// Build a tree over `samples` (row indices, repeats allowed)
    pub fn build(&self, samples: &[usize], rng: &mut StdRng) -> Tree {
        let mut nodes = Vec::new();
        self.build_node(samples, 0, &mut nodes, rng);
        Tree::new(nodes)
    }

    /// Recursively build tree nodes in pre-order
    fn build_node(
        &self,
        samples: &[usize],
        depth: usize,
        nodes: &mut Vec<Node>,
        rng: &mut StdRng,
    ) -> i32 {
        let current_idx = nodes.len() as i32;
        let counts = self.class_counts(samples);

        let pure = counts.iter().filter(|&&c| c > 0).count() <= 1;
        let depth_reached = self.config.max_depth.is_some_and(|max| depth >= max);
        if pure
            || depth_reached
            || samples.len() < self.config.min_samples_split
            || samples.len() < 2 * self.config.min_samples_leaf
        {
            nodes.push(Node::leaf(current_idx, self.distribution(&counts, samples.len())));
            return current_idx;
        }

        let split = match self.find_best_split(samples, &counts, rng) {
            Some(s) => s,
            None => {
                nodes.push(Node::leaf(current_idx, self.distribution(&counts, samples.len())));
                return current_idx;
            }
        };

        let (left, right): (Vec<usize>, Vec<usize>) = samples
            .iter()
            .partition(|&&s| self.features[s][split.feature_idx] <= split.threshold);

        // Reserve space for current node
        nodes.push(Node::internal(current_idx, split.feature_idx as i32, split.threshold, 0, 0));

        let left_idx = self.build_node(&left, depth + 1, nodes, rng);
        let right_idx = self.build_node(&right, depth + 1, nodes, rng);

        nodes[current_idx as usize].left = left_idx;
        nodes[current_idx as usize].right = right_idx;

        current_idx
    }

    /// Best split over randomly ordered features.
    ///
    /// Evaluates at least `max_features` non-constant features and keeps
    /// going past that budget only while no valid split has been found.
    fn find_best_split(
        &self,
        samples: &[usize],
        parent: &[usize],
        rng: &mut StdRng,
    ) -> Option<SplitCandidate> {
        let mut order: Vec<usize> = (0..self.feature_count).collect();
        order.shuffle(rng);

        let n = samples.len();
        let parent_sq: u64 = parent.iter().map(|&c| (c * c) as u64).sum();
        let mut best: Option<SplitCandidate> = None;
        let mut visited = 0usize;

        let mut pairs: Vec<(f32, usize)> = Vec::with_capacity(n);
        let mut left = vec![0usize; self.n_classes];
        let mut right = vec![0usize; self.n_classes];

        for feature_idx in order {
            if visited >= self.config.max_features && best.is_some() {
                break;
            }

            pairs.clear();
            pairs.extend(samples.iter().map(|&s| (self.features[s][feature_idx], self.targets[s])));
            pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

            if pairs[0].0 == pairs[n - 1].0 {
                continue; // constant here, does not count against the budget
            }
            visited += 1;

            left.iter_mut().for_each(|c| *c = 0);
            right.copy_from_slice(parent);
            let mut left_sq = 0u64;
            let mut right_sq = parent_sq;

            for i in 0..n - 1 {
                let class = pairs[i].1;
                left_sq += (2 * left[class] + 1) as u64;
                left[class] += 1;
                right_sq -= (2 * right[class] - 1) as u64;
                right[class] -= 1;

                let (lo, hi) = (pairs[i].0, pairs[i + 1].0);
                if lo == hi {
                    continue;
                }

                let n_left = i + 1;
                let n_right = n - n_left;
                if n_left < self.config.min_samples_leaf || n_right < self.config.min_samples_leaf {
                    continue;
                }

                let candidate = SplitCandidate {
                    feature_idx,
                    threshold: midpoint(lo, hi),
                    score: left_sq as f64 / n_left as f64 + right_sq as f64 / n_right as f64,
                    tie_breaker: SplitTieBreaker::new(feature_idx, i),
                };

                if best.as_ref().map_or(true, |current| candidate.beats(current)) {
                    best = Some(candidate);
                }
            }
        }

        best
    }

    fn class_counts(&self, samples: &[usize]) -> Vec<usize> {
        let mut counts = vec![0usize; self.n_classes];
        for &s in samples {
            counts[self.targets[s]] += 1;
        }
        counts
    }

    /// Class frequencies of a leaf
    fn distribution(&self, counts: &[usize], n: usize) -> Vec<f32> {
        let total = n.max(1) as f32;
        counts.iter().map(|&c| c as f32 / total).collect()
    }
}

/// Threshold between two distinct sorted values with `lo <= t < hi`
fn midpoint(lo: f32, hi: f32) -> f32 {
    let mid = lo / 2.0 + hi / 2.0;
    if mid >= lo && mid < hi {
        mid
    } else {
        lo
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(42)
    }

    #[test]
    fn test_separable_stump() {
        let features = vec![vec![0.1, 5.0], vec![0.2, 5.0], vec![0.8, 5.0], vec![0.9, 5.0]];
        let targets = vec![0, 0, 1, 1];
        let builder = CartBuilder::new(&features, &targets, 2, TreeConfig::default());
        let tree = builder.build(&[0, 1, 2, 3], &mut rng());

        // Feature 1 is constant, so the only useful split is on feature 0
        assert_eq!(tree.nodes.len(), 3);
        assert_eq!(tree.nodes[0].feature_idx, 0);
        assert!(tree.nodes[0].threshold >= 0.2 && tree.nodes[0].threshold < 0.8);
        assert_eq!(tree.evaluate(&[0.15, 5.0]), Some(&[1.0, 0.0][..]));
        assert_eq!(tree.evaluate(&[0.85, 5.0]), Some(&[0.0, 1.0][..]));
        assert!(tree.validate(2, 2).is_ok());
    }

    #[test]
    fn test_pure_node_is_leaf() {
        let features = vec![vec![0.1], vec![0.9]];
        let targets = vec![1, 1];
        let builder = CartBuilder::new(&features, &targets, 3, TreeConfig::default());
        let tree = builder.build(&[0, 1], &mut rng());

        assert_eq!(tree.nodes.len(), 1);
        assert_eq!(tree.nodes[0].leaf, Some(vec![0.0, 1.0, 0.0]));
    }

    #[test]
    fn test_duplicate_rows_weight_leaves() {
        let features = vec![vec![0.0], vec![0.0]];
        let targets = vec![0, 1];
        let builder = CartBuilder::new(&features, &targets, 2, TreeConfig::default());
        // Identical features cannot be split; bootstrap repeats weight the leaf
        let tree = builder.build(&[0, 0, 0, 1], &mut rng());

        assert_eq!(tree.nodes.len(), 1);
        assert_eq!(tree.nodes[0].leaf, Some(vec![0.75, 0.25]));
    }

    #[test]
    fn test_depth_limit() {
        let features: Vec<Vec<f32>> = (0..8).map(|i| vec![i as f32]).collect();
        let targets = vec![0, 1, 0, 1, 0, 1, 0, 1];
        let config = TreeConfig {
            max_depth: Some(1),
            ..Default::default()
        };
        let builder = CartBuilder::new(&features, &targets, 2, config);
        let samples: Vec<usize> = (0..8).collect();
        let tree = builder.build(&samples, &mut rng());

        assert_eq!(tree.depth(), 1);
    }

    #[test]
    fn test_fully_grown_tree_fits_training_data() {
        let features: Vec<Vec<f32>> = (0..8).map(|i| vec![i as f32]).collect();
        let targets = vec![0, 1, 0, 1, 0, 1, 0, 1];
        let builder = CartBuilder::new(&features, &targets, 2, TreeConfig::default());
        let samples: Vec<usize> = (0..8).collect();
        let tree = builder.build(&samples, &mut rng());

        for (row, &target) in features.iter().zip(&targets) {
            let leaf = tree.evaluate(row).unwrap();
            assert_eq!(leaf[target], 1.0);
        }
    }

    #[test]
    fn test_min_samples_leaf_respected() {
        let features: Vec<Vec<f32>> = (0..6).map(|i| vec![i as f32]).collect();
        let targets = vec![0, 0, 0, 0, 0, 1];
        let config = TreeConfig {
            min_samples_leaf: 2,
            ..Default::default()
        };
        let builder = CartBuilder::new(&features, &targets, 2, config);
        let samples: Vec<usize> = (0..6).collect();
        let tree = builder.build(&samples, &mut rng());

        // The lone class-1 row cannot be isolated in a leaf of its own
        let leaf = tree.evaluate(&[5.0]).unwrap();
        assert!(leaf[1] <= 0.5);
        assert!(tree.validate(2, 1).is_ok());
    }

    #[test]
    fn test_midpoint_bounds() {
        assert_eq!(midpoint(0.0, 1.0), 0.5);
        let lo = 1.0f32;
        let hi = f32::from_bits(lo.to_bits() + 1);
        let t = midpoint(lo, hi);
        assert!(t >= lo && t < hi);
    }
}
