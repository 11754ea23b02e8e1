use std::path::PathBuf;

use snafu::Snafu;

use crate::tree::{ElementKind, NodeId, RawChild};

/// Remote side of the tree: answers root, directory-content and metadata queries.
///
/// An empty `types` slice means every kind. Directories are always returned so
/// the hierarchy stays navigable.
pub trait DirectorySource {
    async fn fetch_roots(&self, types: &[ElementKind]) -> Result<Vec<RawChild>, SourceError>;

    async fn fetch_children(
        &self,
        directory: &NodeId,
        types: &[ElementKind],
    ) -> Result<Vec<RawChild>, SourceError>;

    /// Returns the given elements with their metadata filled in. Unknown ids are skipped.
    async fn fetch_metadata(
        &self,
        ids: &[NodeId],
        metadata_types: &[String],
    ) -> Result<Vec<RawChild>, SourceError>;

    /// Turns user input into the id this source uses for it.
    fn resolve_id(&self, raw: &str) -> NodeId {
        NodeId::from(raw)
    }
}

pub(crate) fn kind_requested(types: &[ElementKind], kind: &ElementKind) -> bool {
    types.is_empty() || kind.is_directory() || types.contains(kind)
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SourceError {
    #[snafu(display("Failed to read {}", path.display()))]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("'{}' is not a known directory", id))]
    UnknownDirectory { id: NodeId },
    #[snafu(display("Directory '{}' could not be reached", id))]
    Unreachable { id: NodeId },
}
