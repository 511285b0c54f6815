//! Tree-ensemble graph evaluation
//!
//! Reads the `TreeEnsembleClassifier` attributes of a graph back into node
//! tables and scores rows the way ONNX Runtime does for
//! `post_transform = NONE`: per-class sums of the reached leaves' weights,
//! label = first class with the highest score. Two-class graphs weighting
//! only class id 0 follow the binary rule: scores `[1 - s, s]`, second label
//! when `s > 0.5`.

use super::convert::{TREE_ENSEMBLE_OP, ZIPMAP_OP};
use super::proto::{AttributeProto, DataType, ModelProto, NodeProto};
use super::OnnxError;
use crate::forest::argmax;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, PartialEq)]
enum NodeMode {
    BranchLeq,
    Leaf,
}

#[derive(Debug, Clone)]
struct EnsembleNode {
    mode: NodeMode,
    feature: usize,
    value: f32,
    true_idx: usize,
    false_idx: usize,
    weights: Vec<(usize, f32)>,
}

#[derive(Debug, Clone)]
struct EnsembleTree {
    root: usize,
    nodes: Vec<EnsembleNode>,
}

/// Output of one evaluation
#[derive(Debug, Clone, PartialEq)]
pub struct SessionOutput {
    pub labels: Vec<String>,
    /// Row-major `[batch, n_classes]`
    pub probabilities: Vec<f32>,
    pub n_classes: usize,
}

impl SessionOutput {
    pub fn row(&self, i: usize) -> &[f32] {
        &self.probabilities[i * self.n_classes..(i + 1) * self.n_classes]
    }
}

/// Evaluator for graphs produced by `convert_forest`
#[derive(Debug, Clone)]
pub struct TreeEnsembleSession {
    input_name: String,
    n_features: Option<usize>,
    classes: Vec<String>,
    trees: Vec<EnsembleTree>,
    binary: bool,
    uses_zipmap: bool,
}

fn required<'a>(node: &'a NodeProto, name: &str) -> Result<&'a AttributeProto, OnnxError> {
    node.attribute(name).ok_or_else(|| OnnxError::MissingAttribute {
        node: node.op_type.clone(),
        name: name.to_string(),
    })
}

fn decode_strings(attr: &AttributeProto) -> Result<Vec<String>, OnnxError> {
    attr.strings
        .iter()
        .map(|raw| {
            String::from_utf8(raw.clone()).map_err(|_| {
                OnnxError::InvalidModel(format!("attribute {} is not UTF-8", attr.name))
            })
        })
        .collect()
}

fn index(value: i64, what: &str) -> Result<usize, OnnxError> {
    usize::try_from(value)
        .map_err(|_| OnnxError::InvalidModel(format!("negative {}: {}", what, value)))
}

impl TreeEnsembleSession {
    pub fn from_model(model: &ModelProto) -> Result<Self, OnnxError> {
        let graph = model
            .graph
            .as_ref()
            .ok_or_else(|| OnnxError::InvalidModel("model has no graph".to_string()))?;

        let node = graph
            .node
            .iter()
            .find(|n| n.op_type == TREE_ENSEMBLE_OP)
            .ok_or_else(|| {
                OnnxError::Unsupported(format!("graph has no {} node", TREE_ENSEMBLE_OP))
            })?;

        let input = graph
            .input
            .first()
            .ok_or_else(|| OnnxError::InvalidModel("graph has no input".to_string()))?;
        let n_features = input
            .r#type
            .as_ref()
            .and_then(|ty| ty.tensor_signature())
            .and_then(|(elem, dims)| {
                (elem == DataType::Float as i32)
                    .then(|| dims.get(1).copied().flatten())
                    .flatten()
            })
            .map(|d| d as usize);

        let post_transform = node
            .attribute("post_transform")
            .map(|attr| String::from_utf8_lossy(&attr.s).into_owned())
            .unwrap_or_else(|| "NONE".to_string());
        if post_transform != "NONE" {
            return Err(OnnxError::Unsupported(format!("post_transform {}", post_transform)));
        }

        let classes = decode_strings(required(node, "classlabels_strings")?)?;
        let (trees, weighted) = Self::build_trees(node, classes.len())?;

        let binary = classes.len() == 2 && weighted.len() == 1;
        if binary && !weighted.contains(&0) {
            return Err(OnnxError::Unsupported(
                "two-class graph weighting only class id 1".to_string(),
            ));
        }

        Ok(Self {
            input_name: input.name.clone(),
            n_features,
            classes,
            trees,
            binary,
            uses_zipmap: graph.node.iter().any(|n| n.op_type == ZIPMAP_OP),
        })
    }

    /// Node tables per tree, plus the set of class ids that carry weights
    fn build_trees(
        node: &NodeProto,
        n_classes: usize,
    ) -> Result<(Vec<EnsembleTree>, BTreeSet<usize>), OnnxError> {
        let tree_ids = &required(node, "nodes_treeids")?.ints;
        let node_ids = &required(node, "nodes_nodeids")?.ints;
        let feature_ids = &required(node, "nodes_featureids")?.ints;
        let values = &required(node, "nodes_values")?.floats;
        let true_ids = &required(node, "nodes_truenodeids")?.ints;
        let false_ids = &required(node, "nodes_falsenodeids")?.ints;
        let modes = decode_strings(required(node, "nodes_modes")?)?;

        let n = tree_ids.len();
        let columns = [
            node_ids.len(),
            feature_ids.len(),
            values.len(),
            true_ids.len(),
            false_ids.len(),
            modes.len(),
        ];
        if columns.iter().any(|&len| len != n) {
            return Err(OnnxError::InvalidModel("nodes_* attributes differ in length".to_string()));
        }

        // (tree id, node id) -> position inside that tree's node vector
        let mut positions: BTreeMap<i64, BTreeMap<i64, usize>> = BTreeMap::new();
        for i in 0..n {
            let tree = positions.entry(tree_ids[i]).or_default();
            let next = tree.len();
            if tree.insert(node_ids[i], next).is_some() {
                return Err(OnnxError::InvalidModel(format!(
                    "duplicate node {} in tree {}",
                    node_ids[i], tree_ids[i]
                )));
            }
        }

        let mut trees: BTreeMap<i64, Vec<EnsembleNode>> = BTreeMap::new();
        for i in 0..n {
            let lookup = |id: i64| -> Result<usize, OnnxError> {
                positions[&tree_ids[i]].get(&id).copied().ok_or_else(|| {
                    OnnxError::InvalidModel(format!("tree {} has no node {}", tree_ids[i], id))
                })
            };

            let mode = match modes[i].as_str() {
                "BRANCH_LEQ" => NodeMode::BranchLeq,
                "LEAF" => NodeMode::Leaf,
                other => return Err(OnnxError::Unsupported(format!("node mode {}", other))),
            };

            let (true_idx, false_idx) = match mode {
                NodeMode::BranchLeq => (lookup(true_ids[i])?, lookup(false_ids[i])?),
                NodeMode::Leaf => (0, 0),
            };

            trees.entry(tree_ids[i]).or_default().push(EnsembleNode {
                mode,
                feature: index(feature_ids[i], "feature id")?,
                value: values[i],
                true_idx,
                false_idx,
                weights: Vec::new(),
            });
        }

        let class_trees = &required(node, "class_treeids")?.ints;
        let class_nodes = &required(node, "class_nodeids")?.ints;
        let class_ids = &required(node, "class_ids")?.ints;
        let class_weights = &required(node, "class_weights")?.floats;
        let m = class_trees.len();
        if class_nodes.len() != m || class_ids.len() != m || class_weights.len() != m {
            return Err(OnnxError::InvalidModel("class_* attributes differ in length".to_string()));
        }

        let mut weighted = BTreeSet::new();
        for j in 0..m {
            let class_id = index(class_ids[j], "class id")?;
            if class_id >= n_classes {
                return Err(OnnxError::InvalidModel(format!(
                    "class id {} out of range",
                    class_id
                )));
            }
            weighted.insert(class_id);
            let position = positions
                .get(&class_trees[j])
                .and_then(|tree| tree.get(&class_nodes[j]))
                .copied()
                .ok_or_else(|| {
                    OnnxError::InvalidModel(format!(
                        "class weight targets missing node {} in tree {}",
                        class_nodes[j], class_trees[j]
                    ))
                })?;
            if let Some(nodes) = trees.get_mut(&class_trees[j]) {
                nodes[position].weights.push((class_id, class_weights[j]));
            }
        }

        let trees = trees
            .into_iter()
            .map(|(tree_id, nodes)| {
                let root = positions[&tree_id].get(&0).copied().unwrap_or(0);
                EnsembleTree { root, nodes }
            })
            .collect();
        Ok((trees, weighted))
    }

    pub fn input_name(&self) -> &str {
        &self.input_name
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn n_features(&self) -> Option<usize> {
        self.n_features
    }

    /// Whether the graph also carries a ZipMap stage
    pub fn uses_zipmap(&self) -> bool {
        self.uses_zipmap
    }

    /// Score one row
    pub fn run_row(&self, row: &[f32]) -> Result<(String, Vec<f32>), OnnxError> {
        if let Some(expected) = self.n_features {
            if row.len() != expected {
                return Err(OnnxError::InvalidInput(format!(
                    "expected {} features, got {}",
                    expected,
                    row.len()
                )));
            }
        }

        let mut scores = vec![0.0f32; self.classes.len()];
        for (t, tree) in self.trees.iter().enumerate() {
            let leaf = Self::walk(tree, row).ok_or_else(|| {
                OnnxError::InvalidInput(format!("tree {} did not reach a leaf", t))
            })?;
            for &(class_id, weight) in &leaf.weights {
                scores[class_id] += weight;
            }
        }

        if self.binary {
            let positive = scores[0];
            let label = if positive > 0.5 {
                &self.classes[1]
            } else {
                &self.classes[0]
            };
            return Ok((label.clone(), vec![1.0 - positive, positive]));
        }

        let label = self.classes[argmax(&scores)].clone();
        Ok((label, scores))
    }

    /// Score a row-major batch of `[batch, n_features]` values
    pub fn run(&self, input: &[f32], n_features: usize) -> Result<SessionOutput, OnnxError> {
        if n_features == 0 || input.len() % n_features != 0 {
            return Err(OnnxError::InvalidInput(format!(
                "input of length {} is not a multiple of {}",
                input.len(),
                n_features
            )));
        }

        let mut labels = Vec::with_capacity(input.len() / n_features);
        let mut probabilities = Vec::with_capacity(input.len() / n_features * self.classes.len());
        for row in input.chunks(n_features) {
            let (label, scores) = self.run_row(row)?;
            labels.push(label);
            probabilities.extend(scores);
        }

        Ok(SessionOutput {
            labels,
            probabilities,
            n_classes: self.classes.len(),
        })
    }

    fn walk<'a>(tree: &'a EnsembleTree, row: &[f32]) -> Option<&'a EnsembleNode> {
        let mut idx = tree.root;
        for _ in 0..tree.nodes.len() {
            let node = tree.nodes.get(idx)?;
            match node.mode {
                NodeMode::Leaf => return Some(node),
                NodeMode::BranchLeq => {
                    let x = *row.get(node.feature)?;
                    idx = if x <= node.value { node.true_idx } else { node.false_idx };
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forest::{ForestModel, ForestParams, Node, Tree};
    use crate::onnx::{convert_forest, ConvertOptions};

    fn model() -> ForestModel {
        let tree1 = Tree::new(vec![
            Node::internal(0, 0, 0.5, 1, 2),
            Node::leaf(1, vec![1.0, 0.0]),
            Node::internal(2, 1, -0.25, 3, 4),
            Node::leaf(3, vec![0.5, 0.5]),
            Node::leaf(4, vec![0.0, 1.0]),
        ]);
        let tree2 = Tree::new(vec![
            Node::internal(0, 1, 0.0, 1, 2),
            Node::leaf(1, vec![0.75, 0.25]),
            Node::leaf(2, vec![0.0, 1.0]),
        ]);
        ForestModel::new(
            vec!["A".into(), "B".into()],
            2,
            vec![tree1, tree2],
            ForestParams::default(),
        )
    }

    fn session() -> TreeEnsembleSession {
        TreeEnsembleSession::from_model(&convert_forest(&model(), &options()).unwrap()).unwrap()
    }

    fn options() -> ConvertOptions {
        ConvertOptions {
            n_features: 2,
            ..Default::default()
        }
    }

    #[test]
    fn test_matches_native_model() {
        let native = model();
        let session = session();

        for row in [[0.1, 0.1], [0.9, -0.5], [0.9, 0.1], [0.5, 0.0], [0.6, -0.25]] {
            let (label, scores) = session.run_row(&row).unwrap();
            assert_eq!(label, native.predict_row(&row).unwrap());
            let expected = native.predict_proba_row(&row).unwrap();
            for (a, b) in scores.iter().zip(&expected) {
                assert!((a - b).abs() < 1e-6, "{:?} vs {:?}", scores, expected);
            }
        }
    }

    #[test]
    fn test_binary_rule_keeps_ties_on_first_class() {
        // Tree 1 reaches the [0.5, 0.5] leaf, tree 2 the [0.75, 0.25] leaf
        let (label, scores) = session().run_row(&[0.9, -0.5]).unwrap();
        assert_eq!(scores, vec![0.625, 0.375]);
        assert_eq!(label, "A");

        let tie = Tree::new(vec![Node::leaf(0, vec![0.5, 0.5])]);
        let native = ForestModel::new(
            vec!["A".into(), "B".into()],
            2,
            vec![tie],
            ForestParams::default(),
        );
        let session = TreeEnsembleSession::from_model(&convert_forest(&native, &options()).unwrap())
            .unwrap();
        assert_eq!(session.run_row(&[0.0, 0.0]).unwrap().0, "A");
        assert_eq!(native.predict_row(&[0.0, 0.0]).unwrap(), "A");
    }

    #[test]
    fn test_batch_layout() {
        let session = session();
        let out = session.run(&[0.1, 0.1, 0.9, 0.1], 2).unwrap();

        assert_eq!(out.labels.len(), 2);
        assert_eq!(out.n_classes, 2);
        assert_eq!(out.probabilities.len(), 4);
        assert_eq!(out.row(1), session.run_row(&[0.9, 0.1]).unwrap().1.as_slice());
    }

    #[test]
    fn test_reads_declared_input() {
        let session = session();
        assert_eq!(session.input_name(), "float_input");
        assert_eq!(session.n_features(), Some(2));
        assert!(!session.uses_zipmap());
        assert!(matches!(session.run_row(&[0.1]), Err(OnnxError::InvalidInput(_))));
    }

    #[test]
    fn test_rejects_unknown_post_transform() {
        let mut onnx = convert_forest(&model(), &options()).unwrap();
        let node = &mut onnx.graph.as_mut().unwrap().node[0];
        for attr in node.attribute.iter_mut() {
            if attr.name == "post_transform" {
                attr.s = b"SOFTMAX".to_vec();
            }
        }
        assert!(matches!(
            TreeEnsembleSession::from_model(&onnx),
            Err(OnnxError::Unsupported(_))
        ));
    }

    #[test]
    fn test_missing_attribute_is_reported() {
        let mut onnx = convert_forest(&model(), &options()).unwrap();
        onnx.graph.as_mut().unwrap().node[0]
            .attribute
            .retain(|attr| attr.name != "nodes_modes");
        assert!(matches!(
            TreeEnsembleSession::from_model(&onnx),
            Err(OnnxError::MissingAttribute { .. })
        ));
    }
}
