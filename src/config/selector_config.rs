use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use compio::fs;
use hashlink::LinkedHashMap;
use saphyr::{LoadableYamlNode, Yaml};
use snafu::prelude::*;
use tracing::{debug, info};

use crate::ext::{YamlMappingExt, scalar_list, scalar_text};
use crate::selector::{ItemFilter, SelectionFilter};
use crate::tree::ElementKind;

const CONFIG_FILE_NAME: &str = "treecache.yaml";

fn get_config_file_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE_NAME)
}

/// Settings read from `treecache.yaml` in the project root.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SelectorConfig {
    pub types: Vec<ElementKind>,
    pub roots: Vec<PathBuf>,
    pub fixture: Option<PathBuf>,
    pub metadata_types: Vec<String>,
    pub required_metadata: Vec<(String, String)>,
}

impl SelectorConfig {
    /// Reads the config of `root`; a missing file yields the defaults.
    pub async fn read(root: &Path) -> Result<Self, SelectorConfigError> {
        let path = get_config_file_path(root);
        debug!("Opening config file: {}", path.display());

        let config = match fs::read(&path).await {
            Ok(bytes) => {
                debug!("Successfully read config file: {} bytes", bytes.len());
                let contents = String::from_utf8_lossy(&bytes);
                Self::try_from(&*contents)?
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("No {} found, using defaults", CONFIG_FILE_NAME);
                Self::default()
            }
            Err(e) => {
                return Err(e).context(ReadSnafu {
                    file_path: path.display().to_string(),
                });
            }
        };
        Ok(config.anchored_at(root))
    }

    /// Resolves relative paths against `root` and falls back to `root` itself
    /// when no roots are configured.
    pub fn anchored_at(mut self, root: &Path) -> Self {
        if self.roots.is_empty() {
            self.roots.push(PathBuf::new());
        }
        self.roots = self.roots.iter().map(|path| root.join(path)).collect();
        self.fixture = self.fixture.map(|path| root.join(path));
        self
    }

    pub fn selection_filter(&self) -> SelectionFilter {
        let item_filter = if self.required_metadata.is_empty() {
            None
        } else {
            Some(ItemFilter::requiring(self.required_metadata.clone()))
        };
        SelectionFilter {
            types: self.types.clone(),
            metadata_types: self.metadata_types.clone(),
            item_filter,
        }
    }

    fn list_field(
        top_level: &LinkedHashMap<Yaml, Yaml>,
        field: &'static str,
    ) -> Result<Vec<String>, SelectorConfigError> {
        match top_level.field(field) {
            None => Ok(Vec::new()),
            Some(value) => scalar_list(value).context(InvalidFieldSnafu { field }),
        }
    }

    fn parse_required_metadata(
        top_level: &LinkedHashMap<Yaml, Yaml>,
    ) -> Result<Vec<(String, String)>, SelectorConfigError> {
        let field = "require_metadata";
        let Some(value) = top_level.field(field) else {
            return Ok(Vec::new());
        };
        value
            .as_mapping()
            .context(InvalidFieldSnafu { field })?
            .iter()
            .map(|(key, value)| {
                scalar_text(key)
                    .zip(scalar_text(value))
                    .context(InvalidFieldSnafu { field })
            })
            .collect()
    }
}

impl TryFrom<&str> for SelectorConfig {
    type Error = SelectorConfigError;

    fn try_from(contents: &str) -> Result<Self, Self::Error> {
        let contents_vec = Yaml::load_from_str(contents).context(ParseSnafu)?;
        let contents = contents_vec
            .first()
            .ok_or(SelectorConfigError::MalformedConfig)?;
        let top_level = contents
            .as_mapping()
            .ok_or(SelectorConfigError::TopLevelNotMap)?;

        let fixture = match top_level.field("fixture") {
            None => None,
            Some(value) => Some(
                scalar_text(value)
                    .map(PathBuf::from)
                    .context(InvalidFieldSnafu { field: "fixture" })?,
            ),
        };

        Ok(SelectorConfig {
            types: Self::list_field(top_level, "types")?
                .iter()
                .map(|tag| ElementKind::from(tag.as_str()))
                .collect(),
            roots: Self::list_field(top_level, "roots")?
                .into_iter()
                .map(PathBuf::from)
                .collect(),
            fixture,
            metadata_types: Self::list_field(top_level, "metadata_types")?,
            required_metadata: Self::parse_required_metadata(top_level)?,
        })
    }
}

#[derive(Debug, Snafu)]
pub enum SelectorConfigError {
    #[snafu(display("Failed to read the config file: {}", file_path))]
    ReadError {
        file_path: String,
        source: std::io::Error,
    },
    #[snafu(display("Failed to parse the config file"))]
    ParseError { source: saphyr::ScanError },
    #[snafu(display("Improperly formatted config file"))]
    MalformedConfig,
    #[snafu(display("Top level of config should be a map"))]
    TopLevelNotMap,
    #[snafu(display("Config field '{}' has an unexpected shape", field))]
    InvalidField { field: &'static str },
}
