use std::path::PathBuf;

use crate::cli::{Cli, stdout_supports_color};

#[derive(Debug, Clone, Default)]
pub struct RuntimeConfig {
    pub targets: Vec<String>,
    pub root: PathBuf,
    pub fixture: Option<PathBuf>,
    pub depth: usize,
    pub color: bool,
}

impl From<Cli> for RuntimeConfig {
    fn from(cli: Cli) -> Self {
        Self {
            color: stdout_supports_color(cli.no_color),
            targets: cli.targets,
            root: cli.root,
            fixture: cli.fixture,
            depth: cli.depth,
        }
    }
}
