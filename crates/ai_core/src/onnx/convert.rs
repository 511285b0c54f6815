//! Forest to ONNX conversion
//!
//! Emits a single `ai.onnx.ml.TreeEnsembleClassifier` node. Leaf weights are
//! `p / n_trees` with `post_transform = NONE`, so the summed class scores
//! are exactly the forest's mean probabilities.
//!
//! Two-class forests use the runtime's binary layout: each leaf carries only
//! the second class's weight, under class id 0. The runtime then reports
//! `[1 - s, s]` and labels a row with the second class when `s > 0.5`.

use super::proto::{
    AttributeProto, DataType, GraphProto, ModelProto, NodeProto, OperatorSetIdProto,
    StringStringEntryProto, TypeProto, ValueInfoProto,
};
use super::OnnxError;
use crate::forest::ForestModel;
use prost::Message;
use std::fs;
use std::path::Path;
use tracing::debug;

pub const ML_DOMAIN: &str = "ai.onnx.ml";
pub const IR_VERSION: i64 = 8;
pub const TREE_ENSEMBLE_OP: &str = "TreeEnsembleClassifier";
pub const ZIPMAP_OP: &str = "ZipMap";

/// Conversion settings
#[derive(Debug, Clone, PartialEq)]
pub struct ConvertOptions {
    /// Name of the graph input tensor
    pub input_name: String,
    /// Declared feature width of the input (`[None, n_features]`)
    pub n_features: usize,
    /// Emit a `ZipMap` per-class mapping instead of a flat probability array
    pub zipmap: bool,
    pub label_output: String,
    pub probability_output: String,
    /// Output name of the ZipMap node when `zipmap` is set
    pub zipmap_output: String,
    pub opset: i64,
    pub ml_opset: i64,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            input_name: "float_input".to_string(),
            n_features: 63,
            zipmap: false,
            label_output: "label".to_string(),
            probability_output: "probabilities".to_string(),
            zipmap_output: "output_probability".to_string(),
            opset: 15,
            ml_opset: 1,
        }
    }
}

/// Flattened `nodes_*` / `class_*` attribute columns
#[derive(Default)]
struct EnsembleTables {
    nodes_treeids: Vec<i64>,
    nodes_nodeids: Vec<i64>,
    nodes_featureids: Vec<i64>,
    nodes_values: Vec<f32>,
    nodes_hitrates: Vec<f32>,
    nodes_modes: Vec<&'static str>,
    nodes_truenodeids: Vec<i64>,
    nodes_falsenodeids: Vec<i64>,
    nodes_missing_value_tracks_true: Vec<i64>,
    class_treeids: Vec<i64>,
    class_nodeids: Vec<i64>,
    class_ids: Vec<i64>,
    class_weights: Vec<f32>,
}

impl EnsembleTables {
    fn from_model(model: &ForestModel) -> Self {
        let mut tables = Self::default();
        let n_trees = model.trees.len() as f32;
        let binary = model.classes.len() == 2;

        for (tree_id, tree) in model.trees.iter().enumerate() {
            let tree_id = tree_id as i64;

            for node in &tree.nodes {
                let node_id = node.id as i64;
                tables.nodes_treeids.push(tree_id);
                tables.nodes_nodeids.push(node_id);
                tables.nodes_hitrates.push(1.0);
                tables.nodes_missing_value_tracks_true.push(0);

                match node.distribution() {
                    Some(distribution) => {
                        tables.nodes_modes.push("LEAF");
                        tables.nodes_featureids.push(0);
                        tables.nodes_values.push(0.0);
                        tables.nodes_truenodeids.push(0);
                        tables.nodes_falsenodeids.push(0);

                        if binary {
                            tables.push_weight(tree_id, node_id, 0, distribution[1] / n_trees);
                        } else {
                            // Every class is listed, even at weight 0
                            for (class_id, p) in distribution.iter().enumerate() {
                                tables.push_weight(tree_id, node_id, class_id, p / n_trees);
                            }
                        }
                    }
                    None => {
                        tables.nodes_modes.push("BRANCH_LEQ");
                        tables.nodes_featureids.push(node.feature_idx as i64);
                        tables.nodes_values.push(node.threshold);
                        tables.nodes_truenodeids.push(node.left as i64);
                        tables.nodes_falsenodeids.push(node.right as i64);
                    }
                }
            }
        }

        tables
    }

    fn push_weight(&mut self, tree_id: i64, node_id: i64, class_id: usize, weight: f32) {
        self.class_treeids.push(tree_id);
        self.class_nodeids.push(node_id);
        self.class_ids.push(class_id as i64);
        self.class_weights.push(weight);
    }

    fn into_attributes(self, classes: &[String]) -> Vec<AttributeProto> {
        vec![
            AttributeProto::ints("class_ids", self.class_ids),
            AttributeProto::ints("class_nodeids", self.class_nodeids),
            AttributeProto::ints("class_treeids", self.class_treeids),
            AttributeProto::floats("class_weights", self.class_weights),
            AttributeProto::strings("classlabels_strings", classes),
            AttributeProto::ints("nodes_falsenodeids", self.nodes_falsenodeids),
            AttributeProto::ints("nodes_featureids", self.nodes_featureids),
            AttributeProto::floats("nodes_hitrates", self.nodes_hitrates),
            AttributeProto::ints(
                "nodes_missing_value_tracks_true",
                self.nodes_missing_value_tracks_true,
            ),
            AttributeProto::strings("nodes_modes", &self.nodes_modes),
            AttributeProto::ints("nodes_nodeids", self.nodes_nodeids),
            AttributeProto::ints("nodes_treeids", self.nodes_treeids),
            AttributeProto::ints("nodes_truenodeids", self.nodes_truenodeids),
            AttributeProto::floats("nodes_values", self.nodes_values),
            AttributeProto::string("post_transform", "NONE"),
        ]
    }
}

fn value_info(name: &str, ty: TypeProto) -> ValueInfoProto {
    ValueInfoProto {
        name: name.to_string(),
        r#type: Some(ty),
        doc_string: String::new(),
    }
}

/// Convert a fitted forest into an ONNX model
pub fn convert_forest(
    model: &ForestModel,
    options: &ConvertOptions,
) -> Result<ModelProto, OnnxError> {
    model.validate()?;

    if options.n_features != model.feature_count {
        return Err(OnnxError::InvalidModel(format!(
            "input declares {} features but the model was fit on {}",
            options.n_features, model.feature_count
        )));
    }

    let n_classes = model.classes.len() as i64;
    let tables = EnsembleTables::from_model(model);
    debug!(
        "tree ensemble: {} trees, {} nodes, {} class weights",
        model.trees.len(),
        tables.nodes_nodeids.len(),
        tables.class_weights.len()
    );

    let mut nodes = vec![NodeProto {
        input: vec![options.input_name.clone()],
        output: vec![options.label_output.clone(), options.probability_output.clone()],
        name: TREE_ENSEMBLE_OP.to_string(),
        op_type: TREE_ENSEMBLE_OP.to_string(),
        domain: ML_DOMAIN.to_string(),
        attribute: tables.into_attributes(&model.classes),
        doc_string: String::new(),
    }];

    let label_info = value_info(
        &options.label_output,
        TypeProto::tensor(DataType::String, &[None]),
    );
    let probability_type = TypeProto::tensor(DataType::Float, &[None, Some(n_classes)]);

    let (outputs, value_infos) = if options.zipmap {
        nodes.push(NodeProto {
            input: vec![options.probability_output.clone()],
            output: vec![options.zipmap_output.clone()],
            name: ZIPMAP_OP.to_string(),
            op_type: ZIPMAP_OP.to_string(),
            domain: ML_DOMAIN.to_string(),
            attribute: vec![AttributeProto::strings("classlabels_strings", &model.classes)],
            doc_string: String::new(),
        });

        let map_value = TypeProto::tensor(DataType::Float, &[]);
        let outputs = vec![
            label_info,
            value_info(
                &options.zipmap_output,
                TypeProto::sequence_of_maps(DataType::String, map_value),
            ),
        ];
        (outputs, vec![value_info(&options.probability_output, probability_type)])
    } else {
        let outputs = vec![
            label_info,
            value_info(&options.probability_output, probability_type),
        ];
        (outputs, Vec::new())
    };

    let graph = GraphProto {
        node: nodes,
        name: "HandsignForest".to_string(),
        doc_string: String::new(),
        input: vec![value_info(
            &options.input_name,
            TypeProto::tensor(DataType::Float, &[None, Some(options.n_features as i64)]),
        )],
        output: outputs,
        value_info: value_infos,
    };

    Ok(ModelProto {
        ir_version: IR_VERSION,
        opset_import: vec![
            OperatorSetIdProto {
                domain: String::new(),
                version: options.opset,
            },
            OperatorSetIdProto {
                domain: ML_DOMAIN.to_string(),
                version: options.ml_opset,
            },
        ],
        producer_name: "handsign".to_string(),
        producer_version: crate::VERSION.to_string(),
        domain: String::new(),
        model_version: 1,
        doc_string: String::new(),
        graph: Some(graph),
        metadata_props: vec![
            StringStringEntryProto {
                key: "model_hash".to_string(),
                value: model.hash_hex()?,
            },
            StringStringEntryProto {
                key: "classes".to_string(),
                value: model.classes.join(","),
            },
        ],
    })
}

pub fn save_onnx<P: AsRef<Path>>(path: P, model: &ModelProto) -> Result<usize, OnnxError> {
    let bytes = model.encode_to_vec();
    fs::write(path, &bytes)?;
    Ok(bytes.len())
}

pub fn load_onnx<P: AsRef<Path>>(path: P) -> Result<ModelProto, OnnxError> {
    let bytes = fs::read(path)?;
    Ok(ModelProto::decode(bytes.as_slice())?)
}

/// Declared tensor names and shapes of a graph
#[derive(Debug, Clone, PartialEq)]
pub struct GraphIo {
    pub inputs: Vec<TensorDecl>,
    pub outputs: Vec<TensorDecl>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TensorDecl {
    pub name: String,
    /// `None` for non-tensor values (e.g. ZipMap sequences)
    pub dims: Option<Vec<Option<i64>>>,
}

impl GraphIo {
    pub fn input_names(&self) -> Vec<&str> {
        self.inputs.iter().map(|t| t.name.as_str()).collect()
    }

    pub fn output_names(&self) -> Vec<&str> {
        self.outputs.iter().map(|t| t.name.as_str()).collect()
    }
}

pub fn describe_io(model: &ModelProto) -> Result<GraphIo, OnnxError> {
    let graph = model
        .graph
        .as_ref()
        .ok_or_else(|| OnnxError::InvalidModel("model has no graph".to_string()))?;

    let decl = |info: &ValueInfoProto| TensorDecl {
        name: info.name.clone(),
        dims: info
            .r#type
            .as_ref()
            .and_then(TypeProto::tensor_signature)
            .map(|(_, dims)| dims),
    };

    Ok(GraphIo {
        inputs: graph.input.iter().map(decl).collect(),
        outputs: graph.output.iter().map(decl).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forest::{ForestParams, Node, Tree};

    fn model(n_features: usize) -> ForestModel {
        let tree = Tree::new(vec![
            Node::internal(0, 0, 0.5, 1, 2),
            Node::leaf(1, vec![1.0, 0.0, 0.0]),
            Node::leaf(2, vec![0.0, 0.25, 0.75]),
        ]);
        ForestModel::new(
            vec!["A".into(), "B".into(), "C".into()],
            n_features,
            vec![tree.clone(), tree],
            ForestParams::default(),
        )
    }

    fn ensemble_node(onnx: &ModelProto) -> &NodeProto {
        &onnx.graph.as_ref().unwrap().node[0]
    }

    #[test]
    fn test_input_contract() {
        let onnx = convert_forest(&model(63), &ConvertOptions::default()).unwrap();
        let io = describe_io(&onnx).unwrap();

        assert_eq!(io.input_names(), vec!["float_input"]);
        assert_eq!(io.inputs[0].dims, Some(vec![None, Some(63)]));
    }

    #[test]
    fn test_flat_outputs_without_zipmap() {
        let onnx = convert_forest(&model(63), &ConvertOptions::default()).unwrap();
        let io = describe_io(&onnx).unwrap();

        assert_eq!(io.output_names(), vec!["label", "probabilities"]);
        assert_eq!(io.outputs[1].dims, Some(vec![None, Some(3)]));
        assert_eq!(onnx.graph.as_ref().unwrap().node.len(), 1);
    }

    #[test]
    fn test_zipmap_adds_mapping_output() {
        let options = ConvertOptions {
            zipmap: true,
            ..Default::default()
        };
        let onnx = convert_forest(&model(63), &options).unwrap();
        let io = describe_io(&onnx).unwrap();

        assert_eq!(io.output_names(), vec!["label", "output_probability"]);
        assert_eq!(io.outputs[1].dims, None);
        assert_eq!(onnx.graph.as_ref().unwrap().node[1].op_type, ZIPMAP_OP);
    }

    #[test]
    fn test_attribute_tables() {
        let onnx = convert_forest(&model(63), &ConvertOptions::default()).unwrap();
        let node = ensemble_node(&onnx);

        assert_eq!(node.domain, ML_DOMAIN);
        assert_eq!(node.attribute("nodes_nodeids").unwrap().ints.len(), 6);
        assert_eq!(node.attribute("class_weights").unwrap().floats.len(), 12);
        assert_eq!(
            node.attribute("classlabels_strings").unwrap().strings,
            vec![b"A".to_vec(), b"B".to_vec(), b"C".to_vec()]
        );
        assert_eq!(node.attribute("post_transform").unwrap().s, b"NONE".to_vec());

        // Two trees: each leaf weight is halved
        let weights = &node.attribute("class_weights").unwrap().floats;
        assert_eq!(&weights[..3], &[0.5, 0.0, 0.0]);
    }

    #[test]
    fn test_two_class_binary_layout() {
        let tree = Tree::new(vec![
            Node::internal(0, 0, 0.5, 1, 2),
            Node::leaf(1, vec![0.75, 0.25]),
            Node::leaf(2, vec![0.0, 1.0]),
        ]);
        let model = ForestModel::new(
            vec!["A".into(), "B".into()],
            63,
            vec![tree.clone(), tree],
            ForestParams::default(),
        );
        let onnx = convert_forest(&model, &ConvertOptions::default()).unwrap();
        let node = ensemble_node(&onnx);

        // One weight per leaf, all under class id 0, holding B's share
        assert_eq!(node.attribute("class_ids").unwrap().ints, vec![0, 0, 0, 0]);
        assert_eq!(
            node.attribute("class_weights").unwrap().floats,
            vec![0.125, 0.5, 0.125, 0.5]
        );
        assert_eq!(
            describe_io(&onnx).unwrap().outputs[1].dims,
            Some(vec![None, Some(2)])
        );
    }

    #[test]
    fn test_feature_width_mismatch_is_rejected() {
        let result = convert_forest(&model(10), &ConvertOptions::default());
        assert!(matches!(result, Err(OnnxError::InvalidModel(_))));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("asl_model.onnx");

        let onnx = convert_forest(&model(63), &ConvertOptions::default()).unwrap();
        save_onnx(&path, &onnx).unwrap();
        assert_eq!(load_onnx(&path).unwrap(), onnx);
    }
}
