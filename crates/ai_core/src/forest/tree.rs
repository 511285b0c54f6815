//! Decision tree structures for random-forest inference
//!
//! Trees are stored as flat node arrays with node 0 as the root. Internal
//! nodes send a sample left when `x[feature] <= threshold`; leaves hold the
//! class-probability vector of the training samples that reached them.

use serde::{Deserialize, Serialize};

/// A decision tree node (internal or leaf)
///
/// For internal nodes:
/// - `feature_idx >= 0`: index into feature vector
/// - `left` and `right` point to child node indices
/// - `leaf` is `None`
///
/// For leaf nodes:
/// - `feature_idx == -1`
/// - `leaf` holds one probability per class, in model class order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Node {
    /// Node ID, equal to the node's position in the tree
    pub id: i32,

    /// Left child index (-1 for leaf nodes)
    pub left: i32,

    /// Right child index (-1 for leaf nodes)
    pub right: i32,

    /// Feature index to split on (-1 for leaf nodes)
    pub feature_idx: i32,

    /// Split threshold; samples with `x <= threshold` go left
    pub threshold: f32,

    /// Class distribution for leaf nodes
    pub leaf: Option<Vec<f32>>,
}

impl Node {
    /// Create a new internal (split) node
    pub fn internal(id: i32, feature_idx: i32, threshold: f32, left: i32, right: i32) -> Self {
        Self {
            id,
            left,
            right,
            feature_idx,
            threshold,
            leaf: None,
        }
    }

    /// Create a new leaf node
    pub fn leaf(id: i32, distribution: Vec<f32>) -> Self {
        Self {
            id,
            left: -1,
            right: -1,
            feature_idx: -1,
            threshold: 0.0,
            leaf: Some(distribution),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.feature_idx == -1 || self.leaf.is_some()
    }

    pub fn distribution(&self) -> Option<&[f32]> {
        self.leaf.as_deref()
    }
}

/// A single classification tree
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tree {
    /// Tree nodes (node 0 is the root)
    pub nodes: Vec<Node>,
}

impl Tree {
    pub fn new(nodes: Vec<Node>) -> Self {
        Self { nodes }
    }

    /// Walk the tree and return the class distribution of the reached leaf.
    ///
    /// Returns `None` for structurally invalid trees or out-of-range
    /// feature indices; `validate` rules both out for loaded models.
    pub fn evaluate(&self, features: &[f32]) -> Option<&[f32]> {
        let mut idx = 0usize;

        // A valid tree never needs more steps than it has nodes.
        for _ in 0..self.nodes.len() {
            let node = self.nodes.get(idx)?;

            if node.is_leaf() {
                return node.distribution();
            }

            let value = *features.get(node.feature_idx as usize)?;
            let next = if value <= node.threshold {
                node.left
            } else {
                node.right
            };

            if next < 0 {
                return None;
            }
            idx = next as usize;
        }

        None
    }

    pub fn leaf_count(&self) -> usize {
        self.nodes.iter().filter(|node| node.is_leaf()).count()
    }

    /// Depth of the deepest leaf (a single-leaf tree has depth 0)
    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], idx: usize, depth: usize) -> usize {
            match nodes.get(idx) {
                Some(node) if !node.is_leaf() => walk(nodes, node.left as usize, depth + 1)
                    .max(walk(nodes, node.right as usize, depth + 1)),
                _ => depth,
            }
        }

        if self.nodes.is_empty() {
            0
        } else {
            walk(&self.nodes, 0, 0)
        }
    }

    /// Validate tree structure against the model's class and feature counts
    pub fn validate(&self, n_classes: usize, n_features: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("Tree has no nodes".to_string());
        }

        for (i, node) in self.nodes.iter().enumerate() {
            if node.id != i as i32 {
                return Err(format!("Node {} carries mismatched id {}", i, node.id));
            }

            if let Some(distribution) = &node.leaf {
                if distribution.len() != n_classes {
                    return Err(format!(
                        "Leaf node {} has {} class entries, expected {}",
                        i,
                        distribution.len(),
                        n_classes
                    ));
                }
                continue;
            }

            if node.feature_idx < 0 || node.feature_idx as usize >= n_features {
                return Err(format!(
                    "Internal node {} has invalid feature index: {}",
                    i, node.feature_idx
                ));
            }

            // Children always come after their parent in pre-order layout,
            // which also rules out cycles.
            for (side, child) in [("left", node.left), ("right", node.right)] {
                if child <= i as i32 || child as usize >= self.nodes.len() {
                    return Err(format!("Node {} has invalid {} child: {}", i, side, child));
                }
            }

            if !node.threshold.is_finite() {
                return Err(format!("Node {} has non-finite threshold", i));
            }
        }

        Ok(())
    }
}
