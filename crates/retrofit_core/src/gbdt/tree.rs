//! Decision tree structures for regression ensembles
//!
//! Trees are flat node arrays with node 0 as the root. A split sends a row
//! left when `value < threshold`; NaN values follow `default_left`.

use serde::{Deserialize, Serialize};

/// A decision tree node (internal or leaf)
///
/// For internal nodes `feature_idx >= 0` and `left`/`right` point to child
/// node indices. Leaves have `feature_idx == -1` and carry `leaf`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Node {
    /// Node ID (for reference, not used in traversal)
    pub id: i32,

    /// Left child index (-1 for leaf nodes)
    pub left: i32,

    /// Right child index (-1 for leaf nodes)
    pub right: i32,

    /// Feature index to split on (-1 for leaf nodes)
    #[serde(rename = "feature_idx", alias = "feature")]
    pub feature_idx: i32,

    /// Split threshold
    #[serde(default)]
    pub threshold: f64,

    /// Direction taken by missing (NaN) values
    #[serde(default)]
    pub default_left: bool,

    /// Leaf value (Some for leaf nodes, None for internal nodes)
    #[serde(default)]
    pub leaf: Option<f64>,
}

impl Node {
    /// Create a new internal (split) node
    pub fn internal(id: i32, feature_idx: i32, threshold: f64, left: i32, right: i32) -> Self {
        Self {
            id,
            left,
            right,
            feature_idx,
            threshold,
            default_left: false,
            leaf: None,
        }
    }

    /// Create a new leaf node
    pub fn leaf(id: i32, value: f64) -> Self {
        Self {
            id,
            left: -1,
            right: -1,
            feature_idx: -1,
            threshold: 0.0,
            default_left: false,
            leaf: Some(value),
        }
    }

    /// Route missing values to the left child
    pub fn with_default_left(mut self) -> Self {
        self.default_left = true;
        self
    }

    /// Check if this node is a leaf
    pub fn is_leaf(&self) -> bool {
        self.feature_idx == -1 || self.leaf.is_some()
    }
}

/// A single regression tree
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tree {
    /// Tree nodes (node 0 is the root)
    pub nodes: Vec<Node>,
}

impl Tree {
    pub fn new(nodes: Vec<Node>) -> Self {
        Self { nodes }
    }

    /// Evaluate this tree on one feature row.
    ///
    /// Assumes the tree passed [`Tree::validate`] against the row width.
    pub fn evaluate(&self, features: &[f64]) -> f64 {
        let mut idx = 0usize;

        while let Some(node) = self.nodes.get(idx) {
            if let Some(value) = node.leaf {
                return value;
            }
            if node.is_leaf() {
                return 0.0;
            }

            let value = features
                .get(node.feature_idx as usize)
                .copied()
                .unwrap_or(f64::NAN);

            let go_left = if value.is_nan() {
                node.default_left
            } else {
                value < node.threshold
            };

            let next = if go_left { node.left } else { node.right };
            idx = next as usize;
        }

        0.0
    }

    /// Highest feature index referenced by any split
    pub fn max_feature_index(&self) -> Option<usize> {
        self.nodes
            .iter()
            .filter(|node| !node.is_leaf())
            .map(|node| node.feature_idx as usize)
            .max()
    }

    /// Validate tree structure
    pub fn validate(&self) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("Tree has no nodes".to_string());
        }

        let len = self.nodes.len() as i32;
        for (i, node) in self.nodes.iter().enumerate() {
            if node.is_leaf() {
                match node.leaf {
                    Some(value) if value.is_finite() => {}
                    Some(value) => return Err(format!("Leaf node {i} has non-finite value {value}")),
                    None => return Err(format!("Leaf node {i} has no leaf value")),
                }
                continue;
            }

            // Children must come after their parent so traversal terminates.
            for (side, child) in [("left", node.left), ("right", node.right)] {
                if child <= i as i32 || child >= len {
                    return Err(format!("Node {i} has invalid {side} child: {child}"));
                }
            }

            if node.feature_idx < 0 {
                return Err(format!(
                    "Internal node {i} has invalid feature index: {}",
                    node.feature_idx
                ));
            }

            if node.threshold.is_nan() {
                return Err(format!("Internal node {i} has NaN threshold"));
            }
        }

        Ok(())
    }
}
