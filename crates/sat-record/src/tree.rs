//! Board trees
//!
//! Evidence trees, causal-map trees and hypothesis boards share one node
//! shape: an identified node with display fields, optional annotations and
//! ordered children. Keys a tool adds beyond these are carried verbatim.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;

/// Errors raised while validating a board tree
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TreeError {
    /// Body is JSON but not a node or list of nodes
    #[error("invalid tree shape: {0}")]
    Shape(String),

    /// A node has an empty id
    #[error("node with empty id (label: '{label}')")]
    EmptyId {
        /// Label of the offending node
        label: String,
    },

    /// Two nodes share an id
    #[error("duplicate node id: '{0}'")]
    DuplicateId(String),
}

/// One node of a board tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardNode {
    /// Node identity, unique within the tree
    ///
    /// Numeric ids (e.g. `Date.now()` values) are accepted and kept as text.
    #[serde(deserialize_with = "id_text")]
    pub id: String,
    /// Display text
    #[serde(default, alias = "title", alias = "name", alias = "text")]
    pub label: String,
    /// Longer annotation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Where the evidence came from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Display color
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// Creation timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    /// Last edit timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    /// Ordered child nodes
    #[serde(default)]
    pub children: Vec<BoardNode>,
    /// Tool-specific keys preserved verbatim
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl BoardNode {
    /// Create a leaf node
    #[must_use]
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            description: None,
            source: None,
            color: None,
            created_at: None,
            updated_at: None,
            children: Vec::new(),
            extra: Map::new(),
        }
    }

    /// Builder: attach a child
    #[must_use]
    pub fn with_child(mut self, child: BoardNode) -> Self {
        self.children.push(child);
        self
    }

    /// Builder: set description and source
    #[must_use]
    pub fn with_evidence(mut self, description: impl Into<String>, source: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self.source = Some(source.into());
        self
    }

    /// Number of nodes in this subtree, including self
    #[must_use]
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(BoardNode::node_count).sum::<usize>()
    }
}

fn id_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "node id must be a string or number, got {other}"
        ))),
    }
}

/// A whole board as saved by a tool
///
/// Tools save either one root node or an ordered list of roots; the
/// original shape is kept on the way back out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BoardTree {
    /// Single root
    Root(BoardNode),
    /// Ordered forest
    Forest(Vec<BoardNode>),
}

/// One root-to-leaf path through a tree
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HierarchyRow {
    /// Labels from root to leaf
    pub parts: Vec<String>,
    /// Leaf description
    #[serde(default)]
    pub description: String,
    /// Leaf source
    #[serde(default)]
    pub source: String,
}

impl BoardTree {
    /// Parse and validate a tree from a JSON value
    ///
    /// # Errors
    /// - `TreeError::Shape` if the value is not a node or a list of nodes
    /// - `TreeError::EmptyId` / `TreeError::DuplicateId` on identity problems
    pub fn from_value(value: Value) -> Result<Self, TreeError> {
        let tree: Self =
            serde_json::from_value(value).map_err(|e| TreeError::Shape(e.to_string()))?;
        tree.validate()?;
        Ok(tree)
    }

    /// Root nodes in order
    #[must_use]
    pub fn roots(&self) -> &[BoardNode] {
        match self {
            Self::Root(node) => std::slice::from_ref(node),
            Self::Forest(nodes) => nodes,
        }
    }

    /// Total node count
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.roots().iter().map(BoardNode::node_count).sum()
    }

    /// Check that every id is non-empty and unique across the tree
    ///
    /// # Errors
    /// First identity violation found in depth-first order.
    pub fn validate(&self) -> Result<(), TreeError> {
        let mut seen = HashSet::new();
        let mut stack: Vec<&BoardNode> = self.roots().iter().rev().collect();
        while let Some(node) = stack.pop() {
            if node.id.trim().is_empty() {
                return Err(TreeError::EmptyId {
                    label: node.label.clone(),
                });
            }
            if !seen.insert(node.id.as_str()) {
                return Err(TreeError::DuplicateId(node.id.clone()));
            }
            stack.extend(node.children.iter().rev());
        }
        Ok(())
    }

    /// Flatten into root-to-leaf label paths
    ///
    /// Blank labels fall back to the node id. A leaf's description and
    /// source travel with its row.
    #[must_use]
    pub fn rows(&self) -> Vec<HierarchyRow> {
        let mut rows = Vec::new();
        let mut path = Vec::new();
        for root in self.roots() {
            collect_rows(root, &mut path, &mut rows);
        }
        rows
    }
}

fn collect_rows(node: &BoardNode, path: &mut Vec<String>, rows: &mut Vec<HierarchyRow>) {
    let label = node.label.trim();
    path.push(if label.is_empty() { node.id.clone() } else { label.to_string() });

    if node.children.is_empty() {
        rows.push(HierarchyRow {
            parts: path.clone(),
            description: node.description.clone().unwrap_or_default(),
            source: node.source.clone().unwrap_or_default(),
        });
    } else {
        for child in &node.children {
            collect_rows(child, path, rows);
        }
    }

    path.pop();
}
