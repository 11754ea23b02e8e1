use std::sync::Arc;

use futures_channel::mpsc::UnboundedReceiver;
use snafu::{ResultExt, Snafu};
use tracing::{debug, info};

use crate::selector::filter::SelectionFilter;
use crate::selector::notifier::Notifier;
use crate::source::{DirectorySource, SourceError};
use crate::tree::{
    DefaultClassifier, MergeReport, Node, NodeId, RawChild, TreeCache, TreeSnapshot, ViewNode,
    project,
};

/// Browses a [`DirectorySource`] one directory at a time, keeping what was
/// fetched in a [`TreeCache`].
pub struct DirectorySelector<S, N> {
    source: S,
    notifier: N,
    filter: SelectionFilter,
    cache: TreeCache,
}

impl<S, N> DirectorySelector<S, N>
where
    S: DirectorySource,
    N: Notifier,
{
    pub fn new(source: S, notifier: N, filter: SelectionFilter) -> Self {
        Self {
            source,
            notifier,
            filter,
            cache: TreeCache::new(),
        }
    }

    pub async fn load_roots(&mut self) -> Result<MergeReport, SelectorError> {
        debug!("Fetching root directories");
        let roots = match self.source.fetch_roots(self.filter.server_types()).await {
            Ok(roots) => roots,
            Err(e) => return Err(self.report_failure(e)).context(RootsSnafu),
        };

        let roots = roots
            .into_iter()
            .filter(|root| self.filter.accepts_kind(&root.kind))
            .collect();
        let report = self.cache.merge(None, roots);
        info!("Loaded {} roots", self.cache.forest().len());
        Ok(report)
    }

    /// Fetches the content of `id` and merges it. Failures leave the cache untouched.
    pub async fn on_expand(&mut self, id: &NodeId) -> Result<MergeReport, SelectorError> {
        debug!("Expanding '{}'", id);
        let children = match self.fetch_content(id).await {
            Ok(children) => children,
            Err(e) => {
                return Err(self.report_failure(e)).context(ExpandSnafu { id: id.clone() });
            }
        };

        let report = self.cache.merge(Some(id), children);
        debug!("Expanded '{}': {:?}", id, report.outcome);
        Ok(report)
    }

    async fn fetch_content(&self, id: &NodeId) -> Result<Vec<RawChild>, SourceError> {
        let children = self
            .source
            .fetch_children(id, self.filter.server_types())
            .await?;
        let (directories, items): (Vec<_>, Vec<_>) = children
            .into_iter()
            .filter(|child| self.filter.accepts_kind(&child.kind))
            .partition(|child| child.kind.is_directory());

        let items = if self.filter.needs_metadata() && !items.is_empty() {
            let ids = items.iter().map(|item| item.id.clone()).collect::<Vec<_>>();
            self.source
                .fetch_metadata(&ids, &self.filter.metadata_types)
                .await?
        } else {
            items
        };

        Ok(directories
            .into_iter()
            .chain(items.into_iter().filter(|item| self.filter.accepts_item(item)))
            .collect())
    }

    fn report_failure(&self, error: SourceError) -> SourceError {
        self.notifier.notify_error(&error.to_string());
        error
    }

    pub fn view(&self) -> Vec<ViewNode> {
        project(self.cache.forest(), &DefaultClassifier)
    }

    pub fn node(&self, id: &NodeId) -> Option<&Arc<Node>> {
        self.cache.get(id)
    }

    pub fn snapshot(&self) -> &TreeSnapshot {
        self.cache.snapshot()
    }

    pub fn subscribe(&mut self) -> UnboundedReceiver<TreeSnapshot> {
        self.cache.subscribe()
    }

    pub fn resolve_id(&self, raw: &str) -> NodeId {
        self.source.resolve_id(raw)
    }

    #[cfg(test)]
    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }
}

#[derive(Debug, Snafu)]
pub enum SelectorError {
    #[snafu(display("Failed to fetch root directories"))]
    RootsError { source: SourceError },
    #[snafu(display("Failed to expand '{}'", id))]
    ExpandError { id: NodeId, source: SourceError },
}
