//! Project tree view
//!
//! The navigable hierarchy shown for a project:
//!
//! ```text
//! <project name>
//! ├── Images
//! │   └── one node per image layer, in collection order
//! └── Changes
//!     └── one node per change layer, in collection order
//! ```
//!
//! The tree is never stored. It is built on demand from the project's layer
//! collections, so its branch order is the collection order by construction.

use crate::layer::{ChangeLayer, ImageLayer};
use crate::types::LayerId;
use serde::Serialize;
use std::collections::HashMap;

pub const IMAGES_ROOT_LABEL: &str = "Images";
pub const CHANGES_ROOT_LABEL: &str = "Changes";

/// What a tree node stands for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum NodeKind {
    ProjectRoot,
    ImagesRoot,
    ChangesRoot,
    Image(LayerId),
    Change(LayerId),
}

/// A label plus ordered children
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeNode {
    pub kind: NodeKind,
    pub label: String,
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    fn leaf(kind: NodeKind, label: &str) -> Self {
        Self {
            kind,
            label: label.to_string(),
            children: Vec::new(),
        }
    }
}

/// Snapshot of a project's tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectTree {
    pub root: TreeNode,
    #[serde(skip)]
    parent_map: HashMap<NodeKind, NodeKind>,
}

impl ProjectTree {
    /// Build the tree from the project name and its two ordered collections
    pub fn build(name: &str, images: &[ImageLayer], changes: &[ChangeLayer]) -> Self {
        let images_root = TreeNode {
            kind: NodeKind::ImagesRoot,
            label: IMAGES_ROOT_LABEL.to_string(),
            children: images
                .iter()
                .map(|l| TreeNode::leaf(NodeKind::Image(l.id()), l.name()))
                .collect(),
        };
        let changes_root = TreeNode {
            kind: NodeKind::ChangesRoot,
            label: CHANGES_ROOT_LABEL.to_string(),
            children: changes
                .iter()
                .map(|l| TreeNode::leaf(NodeKind::Change(l.id()), l.name()))
                .collect(),
        };
        let root = TreeNode {
            kind: NodeKind::ProjectRoot,
            label: name.to_string(),
            children: vec![images_root, changes_root],
        };

        let mut parent_map = HashMap::new();
        index_parents(&root, &mut parent_map);
        Self { root, parent_map }
    }

    pub fn label(&self) -> &str {
        &self.root.label
    }

    pub fn images_root(&self) -> &TreeNode {
        &self.root.children[0]
    }

    pub fn changes_root(&self) -> &TreeNode {
        &self.root.children[1]
    }

    /// Find the parent of a node
    ///
    /// Returns None for the project root and for nodes not in the tree.
    pub fn find_parent(&self, kind: &NodeKind) -> Option<NodeKind> {
        self.parent_map.get(kind).copied()
    }

    /// Parent of the node for a layer id, whichever branch it sits in
    pub fn parent_of_layer(&self, layer_id: LayerId) -> Option<NodeKind> {
        self.find_parent(&NodeKind::Image(layer_id))
            .or_else(|| self.find_parent(&NodeKind::Change(layer_id)))
    }

    /// Render as indented text
    pub fn render(&self) -> String {
        let mut out = String::new();
        render_node(&self.root, 0, &mut out);
        out
    }
}

fn index_parents(node: &TreeNode, map: &mut HashMap<NodeKind, NodeKind>) {
    for child in &node.children {
        map.insert(child.kind, node.kind);
        index_parents(child, map);
    }
}

fn render_node(node: &TreeNode, depth: usize, out: &mut String) {
    out.push_str(&"  ".repeat(depth));
    out.push_str(&node.label);
    out.push('\n');
    for child in &node.children {
        render_node(child, depth + 1, out);
    }
}
