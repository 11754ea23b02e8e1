use std::cmp::Ordering;
use std::sync::Arc;

use derive_more::Display;

use crate::tree::collation::locale_compare;
use crate::tree::node::{ElementKind, Node, NodeId};

#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum Icon {
    #[display("folder")]
    Folder,
    #[display("{_0}")]
    Item(String),
}

/// Chooses the icon shown next to an element.
pub trait TypeClassifier {
    fn icon(&self, kind: &ElementKind) -> Icon;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultClassifier;

impl TypeClassifier for DefaultClassifier {
    fn icon(&self, kind: &ElementKind) -> Icon {
        match kind {
            ElementKind::Directory => Icon::Folder,
            ElementKind::Item(tag) => Icon::Item(tag.to_lowercase()),
        }
    }
}

/// Node shape handed to a tree view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewNode {
    pub id: NodeId,
    pub name: String,
    pub kind: ElementKind,
    pub icon: Icon,
    /// `None` for items, which can never be expanded.
    pub children: Option<Vec<ViewNode>>,
    pub children_count: Option<u32>,
}

impl ViewNode {
    pub fn is_directory(&self) -> bool {
        self.kind.is_directory()
    }
}

pub fn project(forest: &[Arc<Node>], classifier: &impl TypeClassifier) -> Vec<ViewNode> {
    forest
        .iter()
        .map(|node| project_node(node, classifier))
        .collect()
}

fn project_node(node: &Node, classifier: &impl TypeClassifier) -> ViewNode {
    let (children, children_count) = if node.is_directory() {
        (
            Some(project(&node.children, classifier)),
            Some(node.subdirectories_count),
        )
    } else {
        (None, None)
    };

    ViewNode {
        id: node.id.clone(),
        name: node.name.clone(),
        kind: node.kind.clone(),
        icon: classifier.icon(&node.kind),
        children,
        children_count,
    }
}

/// Directories before items, each group in name order.
pub fn directory_first(a: &ViewNode, b: &ViewNode) -> Ordering {
    b.is_directory()
        .cmp(&a.is_directory())
        .then_with(|| locale_compare(&a.name, &b.name))
}
