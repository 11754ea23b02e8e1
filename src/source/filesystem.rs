use std::fs::{self, Metadata};
use std::path::{Path, PathBuf};

use snafu::{ResultExt, ensure};
use tracing::debug;

use crate::ext::{PathIdExt, stable_path};
use crate::source::source::{
    DirectorySource, IoSnafu, SourceError, UnknownDirectorySnafu, kind_requested,
};
use crate::tree::{AccessRights, ElementKind, NodeId, RawChild};

const FILE_TAG: &str = "FILE";

/// Serves local directories, identified by their absolute path.
#[derive(Debug, Clone)]
pub struct FilesystemSource {
    roots: Vec<PathBuf>,
}

impl FilesystemSource {
    pub fn new(roots: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            roots: roots.into_iter().map(|root| stable_path(&root)).collect(),
        }
    }

    fn read_entry(path: &Path) -> Result<RawChild, SourceError> {
        let metadata = fs::metadata(path).context(IoSnafu { path })?;
        let kind = Self::kind_of(path, &metadata);
        let subdirectories_count = if kind.is_directory() {
            Self::count_subdirectories(path)
        } else {
            0
        };

        Ok(RawChild::new(path.to_node_id(), path.display_name(), kind)
            .with_subdirectories(subdirectories_count)
            .with_access(Self::access_rights(&metadata)))
    }

    fn kind_of(path: &Path, metadata: &Metadata) -> ElementKind {
        if metadata.is_dir() {
            return ElementKind::Directory;
        }
        path.extension()
            .map(|extension| ElementKind::from(extension.to_string_lossy().as_ref()))
            .unwrap_or_else(|| ElementKind::Item(FILE_TAG.to_string()))
    }

    fn count_subdirectories(path: &Path) -> u32 {
        let Ok(entries) = fs::read_dir(path) else {
            return 0;
        };
        let count = entries
            .filter_map(Result::ok)
            .filter(|entry| entry.path().is_dir())
            .count();
        u32::try_from(count).unwrap_or(u32::MAX)
    }

    #[cfg(unix)]
    fn access_rights(metadata: &Metadata) -> Option<AccessRights> {
        use std::os::unix::fs::PermissionsExt;

        let world_readable = metadata.permissions().mode() & 0o004 != 0;
        Some(AccessRights {
            is_private: !world_readable,
        })
    }

    #[cfg(not(unix))]
    fn access_rights(_metadata: &Metadata) -> Option<AccessRights> {
        None
    }

    fn describe(path: &Path, metadata: &Metadata) -> Vec<(String, String)> {
        let extension = path
            .extension()
            .map(|extension| extension.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        vec![
            ("size".to_string(), metadata.len().to_string()),
            ("extension".to_string(), extension),
            (
                "readonly".to_string(),
                metadata.permissions().readonly().to_string(),
            ),
        ]
    }
}

impl DirectorySource for FilesystemSource {
    async fn fetch_roots(&self, types: &[ElementKind]) -> Result<Vec<RawChild>, SourceError> {
        let mut roots = Vec::with_capacity(self.roots.len());
        for root in &self.roots {
            let entry = Self::read_entry(root)?;
            if kind_requested(types, &entry.kind) {
                roots.push(entry);
            }
        }
        debug!("Found {} filesystem roots", roots.len());
        Ok(roots)
    }

    async fn fetch_children(
        &self,
        directory: &NodeId,
        types: &[ElementKind],
    ) -> Result<Vec<RawChild>, SourceError> {
        let path = PathBuf::from(directory.as_str());
        ensure!(
            path.is_dir(),
            UnknownDirectorySnafu {
                id: directory.clone()
            }
        );

        let entries = fs::read_dir(&path).context(IoSnafu { path: &path })?;
        let mut children = Vec::new();
        for entry in entries {
            let entry = entry.context(IoSnafu { path: &path })?;
            match Self::read_entry(&entry.path()) {
                Ok(child) if kind_requested(types, &child.kind) => children.push(child),
                Ok(_) => {}
                Err(e) => debug!("Skipping unreadable entry: {}", e),
            }
        }
        debug!("Read {} entries from {}", children.len(), path.display());
        Ok(children)
    }

    async fn fetch_metadata(
        &self,
        ids: &[NodeId],
        metadata_types: &[String],
    ) -> Result<Vec<RawChild>, SourceError> {
        let mut described = Vec::with_capacity(ids.len());
        for id in ids {
            let path = PathBuf::from(id.as_str());
            let Ok(metadata) = fs::metadata(&path) else {
                debug!("No metadata for '{}', skipping", id);
                continue;
            };
            let mut child = Self::read_entry(&path)?;
            for (key, value) in Self::describe(&path, &metadata) {
                if metadata_types.is_empty() || metadata_types.contains(&key) {
                    child.metadata.insert(key, value);
                }
            }
            described.push(child);
        }
        Ok(described)
    }

    fn resolve_id(&self, raw: &str) -> NodeId {
        Path::new(raw).to_node_id()
    }
}
