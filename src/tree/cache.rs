use std::sync::Arc;

use futures_channel::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::debug;

use crate::tree::node::{Node, NodeId, RawChild};
use crate::tree::reconcile::{MergeOutcome, MergeReport, TreeSnapshot, reconcile};

/// Owner of the current tree snapshot.
///
/// The snapshot only changes through [`TreeCache::merge`], which swaps it for a
/// new one and hands that to every subscriber.
#[derive(Debug, Default)]
pub struct TreeCache {
    snapshot: TreeSnapshot,
    subscribers: Vec<UnboundedSender<TreeSnapshot>>,
}

impl TreeCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> &TreeSnapshot {
        &self.snapshot
    }

    pub fn forest(&self) -> &[Arc<Node>] {
        self.snapshot.forest()
    }

    pub fn get(&self, id: &NodeId) -> Option<&Arc<Node>> {
        self.snapshot.get(id)
    }

    /// Receives every snapshot published from now on.
    pub fn subscribe(&mut self) -> UnboundedReceiver<TreeSnapshot> {
        let (sender, receiver) = mpsc::unbounded();
        self.subscribers.push(sender);
        receiver
    }

    pub fn merge(&mut self, target: Option<&NodeId>, fresh: Vec<RawChild>) -> MergeReport {
        let (snapshot, report) = reconcile(&self.snapshot, target, fresh);
        if report.outcome == MergeOutcome::Updated {
            self.snapshot = snapshot;
            self.publish();
        }
        report
    }

    fn publish(&mut self) {
        let snapshot = &self.snapshot;
        self.subscribers
            .retain(|subscriber| subscriber.unbounded_send(snapshot.clone()).is_ok());
        debug!("Published snapshot to {} subscribers", self.subscribers.len());
    }
}
