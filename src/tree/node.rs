use std::sync::Arc;

use derive_more::{AsRef, Display, From};
use hashlink::LinkedHashMap;

/// Opaque identifier of a directory or item, stable across fetches.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Display, From, AsRef)]
pub struct NodeId(String);

impl From<&str> for NodeId {
    fn from(value: &str) -> Self {
        NodeId(value.to_string())
    }
}

impl NodeId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

const DIRECTORY_TAG: &str = "DIRECTORY";

/// Type of an element as reported by a source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display)]
pub enum ElementKind {
    #[display("DIRECTORY")]
    Directory,
    #[display("{_0}")]
    Item(String),
}

impl ElementKind {
    pub fn is_directory(&self) -> bool {
        matches!(self, ElementKind::Directory)
    }
}

impl From<&str> for ElementKind {
    fn from(tag: &str) -> Self {
        let tag = tag.trim().to_uppercase();
        if tag == DIRECTORY_TAG {
            ElementKind::Directory
        } else {
            ElementKind::Item(tag)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AccessRights {
    pub is_private: bool,
}

/// Both absent counts as equal, one absent does not.
pub fn access_rights_equal(a: Option<AccessRights>, b: Option<AccessRights>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => a.is_private == b.is_private,
        _ => false,
    }
}

/// One record of a fetch response, before it is reconciled into the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawChild {
    pub id: NodeId,
    pub name: String,
    pub kind: ElementKind,
    pub subdirectories_count: u32,
    pub access_rights: Option<AccessRights>,
    pub metadata: LinkedHashMap<String, String>,
}

impl RawChild {
    pub fn new(id: impl Into<NodeId>, name: impl Into<String>, kind: ElementKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            subdirectories_count: 0,
            access_rights: None,
            metadata: LinkedHashMap::new(),
        }
    }

    pub fn with_subdirectories(mut self, count: u32) -> Self {
        self.subdirectories_count = count;
        self
    }

    pub fn with_access(mut self, access_rights: Option<AccessRights>) -> Self {
        self.access_rights = access_rights;
        self
    }

    pub fn with_metadata(mut self, metadata: LinkedHashMap<String, String>) -> Self {
        self.metadata = metadata;
        self
    }
}

#[cfg(test)]
impl RawChild {
    pub fn directory(id: impl Into<NodeId>, name: impl Into<String>) -> Self {
        Self::new(id, name, ElementKind::Directory)
    }

    pub fn item(id: impl Into<NodeId>, name: impl Into<String>, tag: &str) -> Self {
        Self::new(id, name, ElementKind::from(tag))
    }

    pub fn private(self, is_private: bool) -> Self {
        self.with_access(Some(AccessRights { is_private }))
    }

    pub fn described(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Cached representation of one directory or item.
///
/// Nodes are shared through `Arc` and never mutated once published: any change
/// produces a new node, so pointer identity tells a consumer whether anything
/// below it changed. `metadata` holds the last values a metadata fetch returned;
/// records fetched without metadata leave it as it was.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    pub kind: ElementKind,
    pub parent_id: Option<NodeId>,
    pub subdirectories_count: u32,
    pub access_rights: Option<AccessRights>,
    pub metadata: LinkedHashMap<String, String>,
    pub children: Vec<Arc<Node>>,
}

impl Node {
    pub(super) fn materialize(fresh: RawChild, parent_id: Option<NodeId>) -> Self {
        Self {
            id: fresh.id,
            name: fresh.name,
            kind: fresh.kind,
            parent_id,
            subdirectories_count: fresh.subdirectories_count,
            access_rights: fresh.access_rights,
            metadata: fresh.metadata,
            children: Vec::new(),
        }
    }

    /// True when the fields a fresh record can change all match. A record
    /// without metadata says nothing about it.
    pub(super) fn matches(&self, fresh: &RawChild, parent_id: Option<&NodeId>) -> bool {
        self.name == fresh.name
            && access_rights_equal(self.access_rights, fresh.access_rights)
            && self.subdirectories_count == fresh.subdirectories_count
            && self.parent_id.as_ref() == parent_id
            && (fresh.metadata.is_empty() || self.metadata == fresh.metadata)
    }

    /// Copy of this node with the fresh fields applied and its fetched children kept.
    pub(super) fn refreshed(&self, fresh: &RawChild, parent_id: Option<NodeId>) -> Self {
        let metadata = if fresh.metadata.is_empty() {
            self.metadata.clone()
        } else {
            fresh.metadata.clone()
        };
        Self {
            id: self.id.clone(),
            name: fresh.name.clone(),
            kind: self.kind.clone(),
            parent_id,
            subdirectories_count: fresh.subdirectories_count,
            access_rights: fresh.access_rights,
            metadata,
            children: self.children.clone(),
        }
    }

    pub(super) fn with_children(&self, children: Vec<Arc<Node>>) -> Self {
        Self {
            id: self.id.clone(),
            name: self.name.clone(),
            kind: self.kind.clone(),
            parent_id: self.parent_id.clone(),
            subdirectories_count: self.subdirectories_count,
            access_rights: self.access_rights,
            metadata: self.metadata.clone(),
            children,
        }
    }

    pub fn is_directory(&self) -> bool {
        self.kind.is_directory()
    }
}
