//! Gradient-boosted tree inference
//!
//! Evaluates regression ensembles exported at training time. Models are JSON
//! documents with one ensemble per target:
//!
//! ```json
//! {
//!   "version": 1,
//!   "name": "XGBoost",
//!   "n_features": 3,
//!   "targets": [
//!     {
//!       "name": "energy",
//!       "base_score": 12.5,
//!       "trees": [
//!         {"nodes": [
//!           {"id":0,"left":1,"right":2,"feature_idx":2,"threshold":0.25,"default_left":true,"leaf":null},
//!           {"id":1,"left":-1,"right":-1,"feature_idx":-1,"threshold":0.0,"leaf":-1.5},
//!           {"id":2,"left":-1,"right":-1,"feature_idx":-1,"threshold":0.0,"leaf":2.0}
//!         ]}
//!       ]
//!     }
//!   ]
//! }
//! ```
//!
//! Evaluation is deterministic: no random state, fixed traversal order and a
//! fixed summation order over trees.

pub mod model;
pub mod tree;

pub use model::{ModelError, MultiTargetGbdt, TargetEnsemble, MODEL_FORMAT_VERSION};
pub use tree::{Node, Tree};
