use std::collections::HashMap;
use std::path::Path;

use compio::fs;
use hashlink::LinkedHashMap;
use saphyr::{LoadableYamlNode, Yaml};
use snafu::prelude::*;
use tracing::debug;

use crate::ext::{YamlMappingExt, scalar_bool, scalar_text};
use crate::source::source::{
    DirectorySource, SourceError, UnknownDirectorySnafu, UnreachableSnafu, kind_requested,
};
use crate::tree::{AccessRights, ElementKind, NodeId, RawChild};

#[derive(Debug, Clone)]
struct FixtureEntry {
    record: RawChild,
    children: Vec<NodeId>,
    unreachable: bool,
}

/// Hierarchy described by a YAML document, served from memory.
///
/// ```yaml
/// roots:
///   - id: a
///     name: Alpha
///     type: DIRECTORY
///     private: true
///     children:
///       - { id: s, name: Study, type: STUDY, metadata: { owner: me } }
/// ```
#[derive(Debug, Clone, Default)]
pub struct FixtureSource {
    roots: Vec<NodeId>,
    entries: HashMap<NodeId, FixtureEntry>,
}

impl FixtureSource {
    pub async fn read(path: &Path) -> Result<Self, FixtureError> {
        debug!("Reading fixture {}", path.display());
        let bytes = fs::read(path).await.context(ReadSnafu {
            file_path: path.display().to_string(),
        })?;
        let contents = String::from_utf8_lossy(&bytes);
        Self::try_from(&*contents)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    fn record(&self, id: &NodeId) -> Option<RawChild> {
        self.entries
            .get(id)
            .map(|entry| entry.record.clone().with_metadata(LinkedHashMap::new()))
    }

    fn records(&self, ids: &[NodeId], types: &[ElementKind]) -> Vec<RawChild> {
        ids.iter()
            .filter_map(|id| self.record(id))
            .filter(|record| kind_requested(types, &record.kind))
            .collect()
    }

    fn parse_entries(
        &mut self,
        entries: &Yaml,
        parent: Option<&NodeId>,
    ) -> Result<Vec<NodeId>, FixtureError> {
        let context = parent.map_or_else(|| "roots".to_string(), |id| id.to_string());
        let entries = entries
            .as_sequence()
            .context(NotSequenceSnafu { context: &context })?;

        entries
            .iter()
            .map(|entry| {
                let mapping = entry
                    .as_mapping()
                    .context(NotMappingSnafu { context: &context })?;
                self.parse_entry(mapping)
            })
            .collect()
    }

    fn parse_entry(
        &mut self,
        mapping: &LinkedHashMap<Yaml, Yaml>,
    ) -> Result<NodeId, FixtureError> {
        let id = mapping
            .field("id")
            .and_then(scalar_text)
            .map(NodeId::from)
            .context(MissingFieldSnafu {
                field: "id",
                context: "entry",
            })?;
        ensure!(
            !self.entries.contains_key(&id),
            DuplicateIdSnafu { id: id.clone() }
        );

        let name = mapping
            .field("name")
            .and_then(scalar_text)
            .unwrap_or_else(|| id.to_string());
        let kind = mapping
            .field("type")
            .and_then(scalar_text)
            .map(|tag| ElementKind::from(tag.as_str()))
            .unwrap_or(ElementKind::Directory);
        let access_rights = mapping
            .field("private")
            .and_then(scalar_bool)
            .map(|is_private| AccessRights { is_private });
        let unreachable = mapping
            .field("unreachable")
            .and_then(scalar_bool)
            .unwrap_or(false);

        let mut metadata = LinkedHashMap::new();
        if let Some(values) = mapping.field("metadata").and_then(|m| m.as_mapping()) {
            for (key, value) in values {
                match (scalar_text(key), scalar_text(value)) {
                    (Some(key), Some(value)) => {
                        metadata.insert(key, value);
                    }
                    _ => debug!("Skipping non-scalar metadata of '{}'", id),
                }
            }
        }

        let children = match mapping.field("children") {
            Some(children) => self.parse_entries(children, Some(&id))?,
            None => Vec::new(),
        };
        let subdirectories_count = children
            .iter()
            .filter(|child| {
                self.entries
                    .get(*child)
                    .is_some_and(|entry| entry.record.kind.is_directory())
            })
            .count();
        ensure!(
            !self.entries.contains_key(&id),
            DuplicateIdSnafu { id: id.clone() }
        );

        let record = RawChild::new(id.clone(), name, kind)
            .with_subdirectories(u32::try_from(subdirectories_count).unwrap_or(u32::MAX))
            .with_access(access_rights)
            .with_metadata(metadata);
        self.entries.insert(
            id.clone(),
            FixtureEntry {
                record,
                children,
                unreachable,
            },
        );
        Ok(id)
    }
}

impl TryFrom<&str> for FixtureSource {
    type Error = FixtureError;

    fn try_from(contents: &str) -> Result<Self, Self::Error> {
        let documents = Yaml::load_from_str(contents).context(ParseSnafu)?;
        let document = documents.first().context(MalformedFixtureSnafu)?;
        let top_level = document.as_mapping().context(MalformedFixtureSnafu)?;
        let roots = top_level.field("roots").context(MissingFieldSnafu {
            field: "roots",
            context: "fixture",
        })?;

        let mut source = FixtureSource::default();
        source.roots = source.parse_entries(roots, None)?;
        debug!(
            "Loaded fixture with {} roots and {} entries",
            source.roots.len(),
            source.entries.len()
        );
        Ok(source)
    }
}

impl DirectorySource for FixtureSource {
    async fn fetch_roots(&self, types: &[ElementKind]) -> Result<Vec<RawChild>, SourceError> {
        Ok(self.records(&self.roots, types))
    }

    async fn fetch_children(
        &self,
        directory: &NodeId,
        types: &[ElementKind],
    ) -> Result<Vec<RawChild>, SourceError> {
        let entry = self.entries.get(directory).context(UnknownDirectorySnafu {
            id: directory.clone(),
        })?;
        ensure!(
            !entry.unreachable,
            UnreachableSnafu {
                id: directory.clone()
            }
        );
        Ok(self.records(&entry.children, types))
    }

    async fn fetch_metadata(
        &self,
        ids: &[NodeId],
        metadata_types: &[String],
    ) -> Result<Vec<RawChild>, SourceError> {
        let described = ids
            .iter()
            .filter_map(|id| self.entries.get(id))
            .map(|entry| {
                let mut record = entry.record.clone();
                if !metadata_types.is_empty() {
                    record.metadata.retain(|key, _| metadata_types.contains(key));
                }
                record
            })
            .collect();
        Ok(described)
    }
}

#[derive(Debug, Snafu)]
pub enum FixtureError {
    #[snafu(display("Failed to read the fixture file: {}", file_path))]
    ReadError {
        file_path: String,
        source: std::io::Error,
    },
    #[snafu(display("Failed to parse the fixture file"))]
    ParseError { source: saphyr::ScanError },
    #[snafu(display("Fixture should be a map with a 'roots' list"))]
    MalformedFixture,
    #[snafu(display("Missing '{}' in {}", field, context))]
    MissingField {
        field: &'static str,
        context: &'static str,
    },
    #[snafu(display("Children of {} should be a list", context))]
    NotSequence { context: String },
    #[snafu(display("Entries under {} should be maps", context))]
    NotMapping { context: String },
    #[snafu(display("Id '{}' is used more than once", id))]
    DuplicateId { id: NodeId },
}
