use futures::StreamExt;
use snafu::Snafu;
use snafu::prelude::*;
use tracing::{debug, info};

use crate::application::RuntimeConfig;
use crate::cli::render_tree;
use crate::config::{SelectorConfig, SelectorConfigError};
use crate::selector::{DirectorySelector, SelectionFilter, SelectorError, TracingNotifier};
use crate::source::{DirectorySource, FilesystemSource, FixtureError, FixtureSource};
use crate::tree::{MergeOutcome, NodeId};

type Selector<S> = DirectorySelector<S, TracingNotifier>;

pub struct Application;

impl Application {
    pub async fn run(runtime_config: impl Into<RuntimeConfig>) -> Result<(), ApplicationError> {
        let runtime_config: RuntimeConfig = runtime_config.into();
        colored::control::set_override(runtime_config.color);

        let rendered = Self::render(&runtime_config).await?;
        print!("{rendered}");
        Ok(())
    }

    /// Loads the hierarchy described by the config and returns it as a printable tree.
    pub async fn render(runtime_config: &RuntimeConfig) -> Result<String, ApplicationError> {
        let config = SelectorConfig::read(&runtime_config.root)
            .await
            .context(SelectorConfigSnafu)?;
        debug!("Loaded config: {:?}", config);

        let filter = config.selection_filter();
        match runtime_config.fixture.as_ref().or(config.fixture.as_ref()) {
            Some(path) => {
                let source = FixtureSource::read(path).await.context(FixtureLoadSnafu)?;
                info!("Serving {} entries from {}", source.len(), path.display());
                Self::browse(source, filter, runtime_config).await
            }
            None => {
                let source = FilesystemSource::new(config.roots.iter().cloned());
                Self::browse(source, filter, runtime_config).await
            }
        }
    }

    async fn browse<S: DirectorySource>(
        source: S,
        filter: SelectionFilter,
        runtime_config: &RuntimeConfig,
    ) -> Result<String, ApplicationError> {
        let mut selector = DirectorySelector::new(source, TracingNotifier, filter);
        let updates = selector.subscribe();

        selector.load_roots().await.context(LoadRootsSnafu)?;
        Self::expand_levels(&mut selector, runtime_config.depth).await;

        for target in &runtime_config.targets {
            let id = selector.resolve_id(target);
            match selector.on_expand(&id).await {
                Ok(report) if report.outcome == MergeOutcome::StaleTarget => {
                    info!("'{}' is not loaded, nothing to expand", target);
                }
                Ok(_) => {}
                Err(e) => debug!("Skipping '{}': {}", target, e),
            }
        }

        info!("{} nodes cached", selector.snapshot().index().len());
        let rendered = render_tree(&selector.view(), runtime_config.color);
        drop(selector);
        let published = updates.count().await;
        debug!("Published {} snapshots", published);
        Ok(rendered)
    }

    /// Expands every loaded directory, one level at a time, `depth` levels deep.
    async fn expand_levels<S: DirectorySource>(selector: &mut Selector<S>, depth: usize) {
        let mut frontier = selector
            .snapshot()
            .forest()
            .iter()
            .filter(|node| node.is_directory())
            .map(|node| node.id.clone())
            .collect::<Vec<NodeId>>();

        for level in 1..=depth {
            let mut next = Vec::new();
            for id in frontier {
                if let Err(e) = selector.on_expand(&id).await {
                    debug!("Skipping '{}': {}", id, e);
                    continue;
                }
                if let Some(node) = selector.node(&id) {
                    next.extend(
                        node.children
                            .iter()
                            .filter(|child| child.is_directory())
                            .map(|child| child.id.clone()),
                    );
                }
            }
            debug!("Expanded level {}, {} directories below", level, next.len());
            frontier = next;
        }
    }
}

#[derive(Debug, Snafu)]
pub enum ApplicationError {
    #[snafu(display("Critical failure encountered during configuration stage"))]
    SelectorConfigError { source: SelectorConfigError },
    #[snafu(display("Critical failure encountered while loading the fixture"))]
    FixtureLoadError { source: FixtureError },
    #[snafu(display("Critical failure encountered while loading the roots"))]
    LoadRootsError { source: SelectorError },
}
