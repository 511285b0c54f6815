//! Random-forest classifier model
//!
//! - `tree`: flat-array decision trees with class-distribution leaves
//! - `model`: the fitted ensemble, soft-voting inference and encodings
//! - `params`: the fixed hyperparameters the trainer grows trees with
//!
//! # Usage
//!
//! ```rust
//! use handsign_ai_core::forest::{ForestModel, ForestParams, Node, Tree};
//!
//! let tree = Tree::new(vec![
//!     Node::internal(0, 0, 0.5, 1, 2),
//!     Node::leaf(1, vec![1.0, 0.0]),
//!     Node::leaf(2, vec![0.0, 1.0]),
//! ]);
//! let model = ForestModel::new(
//!     vec!["A".into(), "B".into()],
//!     1,
//!     vec![tree],
//!     ForestParams::default(),
//! );
//!
//! assert_eq!(model.predict_row(&[0.9]).unwrap(), "B");
//! ```

pub mod model;
pub mod params;
pub mod tree;

pub use model::{argmax, ForestModel, ModelError, MODEL_VERSION};
pub use params::{ForestParams, MaxFeatures};
pub use tree::{Node, Tree};
