use std::path::{Component, Path, PathBuf};

use crate::tree::NodeId;

/// Absolute form of `path`, resolved through the filesystem when it exists and
/// lexically normalized otherwise.
pub fn stable_path(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }

    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|current_dir| current_dir.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };

    absolute
        .components()
        .fold(Vec::new(), |mut kept: Vec<Component<'_>>, component| {
            match component {
                Component::CurDir => {}
                Component::ParentDir => {
                    if matches!(kept.last(), Some(Component::Normal(_))) {
                        kept.pop();
                    }
                }
                other => kept.push(other),
            }
            kept
        })
        .iter()
        .collect()
}

pub trait PathIdExt {
    /// Identifier of the filesystem entry at this path.
    fn to_node_id(&self) -> NodeId;
    /// Last component, or the whole path for filesystem roots.
    fn display_name(&self) -> String;
}

impl PathIdExt for Path {
    fn to_node_id(&self) -> NodeId {
        NodeId::from(stable_path(self).to_string_lossy().into_owned())
    }

    fn display_name(&self) -> String {
        match self.file_name() {
            Some(name) => name.to_string_lossy().into_owned(),
            None => self.to_string_lossy().into_owned(),
        }
    }
}

impl PathIdExt for PathBuf {
    fn to_node_id(&self) -> NodeId {
        self.as_path().to_node_id()
    }

    fn display_name(&self) -> String {
        self.as_path().display_name()
    }
}
