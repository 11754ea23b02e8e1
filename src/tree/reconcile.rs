//! Reconciliation of a fetch response into an immutable tree snapshot.
//!
//! A merge targets one node (or the root level) and replaces its children with
//! the freshly fetched ones. Nodes whose relevant fields did not change keep
//! their `Arc` identity, removed subtrees are pruned from the index, and every
//! ancestor of the target is rebuilt so no stale child reference survives above
//! the point of change. A child that was cached under another parent is detached
//! from it first, so every node stays reachable through exactly one path.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use snafu::location;
use tracing::{debug, error, warn};

use crate::tree::collation::locale_compare;
use crate::tree::node::{Node, NodeId, RawChild};

pub type Forest = Arc<Vec<Arc<Node>>>;
pub type Index = Arc<HashMap<NodeId, Arc<Node>>>;

/// Forest of root nodes plus the flat id lookup covering every cached node.
///
/// Cloning is cheap and a clone stays valid after the cache moves on.
#[derive(Debug, Clone, Default)]
pub struct TreeSnapshot {
    forest: Forest,
    index: Index,
}

impl TreeSnapshot {
    pub fn forest(&self) -> &[Arc<Node>] {
        &self.forest
    }

    pub fn index(&self) -> &HashMap<NodeId, Arc<Node>> {
        &self.index
    }

    pub fn get(&self, id: &NodeId) -> Option<&Arc<Node>> {
        self.index.get(id)
    }

    /// True when both snapshots share the same forest and index allocations.
    pub fn same_as(&self, other: &TreeSnapshot) -> bool {
        Arc::ptr_eq(&self.forest, &other.forest) && Arc::ptr_eq(&self.index, &other.index)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// A new snapshot was produced.
    Updated,
    /// The fresh children are identical to the cached ones.
    Unchanged,
    /// The target is no longer cached; the response was dropped.
    StaleTarget,
}

/// A fetched child already cached under a different parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reparenting {
    pub id: NodeId,
    pub previous_parent: Option<NodeId>,
    pub new_parent: Option<NodeId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeReport {
    pub outcome: MergeOutcome,
    pub reparented: Vec<Reparenting>,
    pub pruned: Vec<NodeId>,
}

impl MergeReport {
    fn empty(outcome: MergeOutcome) -> Self {
        Self {
            outcome,
            reparented: Vec::new(),
            pruned: Vec::new(),
        }
    }
}

/// Index and roots of the snapshot being assembled by one merge.
struct Workspace {
    index: HashMap<NodeId, Arc<Node>>,
    roots: Vec<Arc<Node>>,
}

impl Workspace {
    fn of(prev: &TreeSnapshot) -> Self {
        Self {
            index: (*prev.index).clone(),
            roots: (*prev.forest).clone(),
        }
    }

    fn children_of(&self, target: Option<&NodeId>) -> Vec<Arc<Node>> {
        match target.and_then(|id| self.index.get(id)) {
            Some(node) => node.children.clone(),
            None => self.roots.clone(),
        }
    }

    /// Removes a moved node from the children of its previous parent, or from
    /// the roots when it had none.
    fn detach(&mut self, moved: &Reparenting) {
        let Some(parent_id) = &moved.previous_parent else {
            self.roots.retain(|root| root.id != moved.id);
            return;
        };
        let Some(parent) = self.index.get(parent_id) else {
            debug!("Previous parent '{}' of '{}' is gone", parent_id, moved.id);
            return;
        };
        let children = parent
            .children
            .iter()
            .filter(|child| child.id != moved.id)
            .cloned()
            .collect();
        let detached = Arc::new(parent.with_children(children));
        self.replace_upward(detached);
    }

    /// Stores `node` and rebuilds the chain of ancestors above it, each copy
    /// holding the updated child in place of the old one.
    fn replace_upward(&mut self, node: Arc<Node>) {
        let bound = self.index.len() + 1;
        let mut current = node;

        for _ in 0..=bound {
            self.index.insert(current.id.clone(), current.clone());
            let Some(parent_id) = current.parent_id.clone() else {
                if let Some(slot) = self.roots.iter_mut().find(|root| root.id == current.id) {
                    *slot = current;
                }
                return;
            };
            let Some(parent) = self.index.get(&parent_id) else {
                error!(
                    "Assumption that parent '{}' of '{}' is cached failed {}",
                    parent_id,
                    current.id,
                    location!()
                );
                return;
            };

            let children = parent
                .children
                .iter()
                .map(|child| {
                    if child.id == current.id {
                        current.clone()
                    } else {
                        child.clone()
                    }
                })
                .collect();
            current = Arc::new(parent.with_children(children));
        }

        error!(
            "Ancestor chain is longer than the cache, tree is not acyclic {}",
            location!()
        );
    }

    /// Drops the given nodes from the index, skipping any id whose entry has
    /// since been replaced by another node.
    fn prune(&mut self, stale: &HashMap<NodeId, Arc<Node>>) -> Vec<NodeId> {
        let mut pruned = stale
            .iter()
            .filter(|(id, node)| {
                self.index
                    .get(*id)
                    .is_some_and(|indexed| Arc::ptr_eq(indexed, node))
            })
            .map(|(id, _)| id.clone())
            .collect::<Vec<_>>();
        for id in &pruned {
            self.index.remove(id);
        }
        pruned.sort();
        pruned
    }

    fn into_snapshot(self) -> TreeSnapshot {
        TreeSnapshot {
            forest: Arc::new(self.roots),
            index: Arc::new(self.index),
        }
    }
}

/// Merges `fresh` as the new children of `target` (`None` for the root level).
pub fn reconcile(
    prev: &TreeSnapshot,
    target: Option<&NodeId>,
    fresh: Vec<RawChild>,
) -> (TreeSnapshot, MergeReport) {
    if let Some(id) = target
        && !prev.index.contains_key(id)
    {
        warn!("Dropping response for '{}': node is no longer cached", id);
        return (prev.clone(), MergeReport::empty(MergeOutcome::StaleTarget));
    }

    let fresh = without_lineage(prev, target, sorted_unique(fresh));
    let reparented = fresh
        .iter()
        .filter_map(|child| moved_child(prev, target, child))
        .collect::<Vec<_>>();

    let mut workspace = Workspace::of(prev);
    for moved in &reparented {
        workspace.detach(moved);
    }

    let next_children = fresh
        .into_iter()
        .map(|child| reconcile_child(&workspace.index, target, child))
        .collect::<Vec<_>>();

    let prev_children: &[Arc<Node>] = match target.and_then(|id| prev.index.get(id)) {
        Some(node) => node.children.as_slice(),
        None => prev.forest.as_slice(),
    };
    if same_children(prev_children, &next_children) {
        debug!("Merge into {} changed nothing", describe(target));
        return (prev.clone(), MergeReport::empty(MergeOutcome::Unchanged));
    }

    let stale = stale_descendants(
        &workspace.children_of(target),
        &next_children,
        target,
        workspace.index.len(),
    );
    let pruned = workspace.prune(&stale);
    for child in &next_children {
        workspace.index.insert(child.id.clone(), child.clone());
    }

    match target {
        None => workspace.roots = next_children,
        Some(id) => {
            let node = workspace.index.get(id).cloned();
            if let Some(node) = node {
                let count = u32::try_from(next_children.len()).unwrap_or(u32::MAX);
                let mut rebuilt = node.with_children(next_children);
                rebuilt.subdirectories_count = count;
                workspace.replace_upward(Arc::new(rebuilt));
            } else {
                error!(
                    "Assumption that target '{}' stays cached during its merge failed {}",
                    id,
                    location!()
                );
            }
        }
    }

    debug!(
        "Merged into {}: {} nodes cached, {} pruned",
        describe(target),
        workspace.index.len(),
        pruned.len()
    );

    let report = MergeReport {
        outcome: MergeOutcome::Updated,
        reparented,
        pruned,
    };
    (workspace.into_snapshot(), report)
}

fn describe(target: Option<&NodeId>) -> String {
    match target {
        Some(id) => format!("'{id}'"),
        None => "root level".to_string(),
    }
}

/// Sorts by name, using the id to break ties, and keeps the first of any duplicate ids.
fn sorted_unique(mut fresh: Vec<RawChild>) -> Vec<RawChild> {
    fresh.sort_by(|a, b| locale_compare(&a.name, &b.name).then_with(|| a.id.cmp(&b.id)));
    let mut seen = HashSet::new();
    fresh.retain(|child| {
        let first = seen.insert(child.id.clone());
        if !first {
            warn!("Ignoring duplicate entry '{}' in fetch response", child.id);
        }
        first
    });
    fresh
}

/// Drops the target and its ancestors from its own children, which would close a cycle.
fn without_lineage(
    prev: &TreeSnapshot,
    target: Option<&NodeId>,
    mut fresh: Vec<RawChild>,
) -> Vec<RawChild> {
    let mut lineage = HashSet::new();
    let mut current = target.and_then(|id| prev.index.get(id));
    while let Some(node) = current {
        if !lineage.insert(node.id.clone()) {
            break;
        }
        current = node.parent_id.as_ref().and_then(|id| prev.index.get(id));
    }

    fresh.retain(|child| {
        let allowed = !lineage.contains(&child.id);
        if !allowed {
            warn!(
                "Ignoring '{}' under {}: it is an ancestor of its new parent",
                child.id,
                describe(target)
            );
        }
        allowed
    });
    fresh
}

/// Reports a fresh child that is cached under another parent.
fn moved_child(
    prev: &TreeSnapshot,
    target: Option<&NodeId>,
    fresh: &RawChild,
) -> Option<Reparenting> {
    let existing = prev.index.get(&fresh.id)?;
    if existing.parent_id.as_ref() == target {
        return None;
    }
    warn!(
        "Node '{}' moved from {} to {}",
        existing.id,
        describe(existing.parent_id.as_ref()),
        describe(target)
    );
    Some(Reparenting {
        id: existing.id.clone(),
        previous_parent: existing.parent_id.clone(),
        new_parent: target.cloned(),
    })
}

fn reconcile_child(
    index: &HashMap<NodeId, Arc<Node>>,
    target: Option<&NodeId>,
    fresh: RawChild,
) -> Arc<Node> {
    let Some(existing) = index.get(&fresh.id) else {
        return Arc::new(Node::materialize(fresh, target.cloned()));
    };
    if existing.matches(&fresh, target) {
        return existing.clone();
    }
    Arc::new(existing.refreshed(&fresh, target.cloned()))
}

fn same_children(prev: &[Arc<Node>], next: &[Arc<Node>]) -> bool {
    prev.len() == next.len() && prev.iter().zip(next).all(|(a, b)| Arc::ptr_eq(a, b))
}

/// Nodes to drop from the index: every previous child missing from the response,
/// with all its cached descendants, minus whatever the new children still carry.
fn stale_descendants(
    prev_children: &[Arc<Node>],
    next_children: &[Arc<Node>],
    target: Option<&NodeId>,
    bound: usize,
) -> HashMap<NodeId, Arc<Node>> {
    let next_ids = next_children
        .iter()
        .map(|child| child.id.clone())
        .collect::<HashSet<_>>();
    let removed = prev_children
        .iter()
        .filter(|child| !next_ids.contains(&child.id))
        .cloned()
        .collect::<Vec<_>>();
    if removed.is_empty() {
        return HashMap::new();
    }

    let mut stale = flatten_down(removed, bound);
    let retained = flatten_down(next_children.to_vec(), bound);
    stale.retain(|id, _| !retained.contains_key(id) && Some(id) != target);
    stale
}

/// The given nodes and all their descendants, by id.
fn flatten_down(nodes: Vec<Arc<Node>>, bound: usize) -> HashMap<NodeId, Arc<Node>> {
    let bound = bound + nodes.len();
    let mut visited = HashMap::new();
    let mut stack = nodes;

    while let Some(node) = stack.pop() {
        if visited.contains_key(&node.id) {
            continue;
        }
        if visited.len() >= bound {
            error!(
                "Descendant walk visited more nodes than are cached, tree is not acyclic {}",
                location!()
            );
            break;
        }
        stack.extend(node.children.iter().cloned());
        visited.insert(node.id.clone(), node);
    }

    visited
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::*;

    fn id(value: &str) -> NodeId {
        NodeId::from(value)
    }

    fn merge(prev: &TreeSnapshot, target: Option<&str>, fresh: Vec<RawChild>) -> TreeSnapshot {
        let target = target.map(id);
        reconcile(prev, target.as_ref(), fresh).0
    }

    fn names(nodes: &[Arc<Node>]) -> Vec<&str> {
        nodes.iter().map(|node| node.name.as_str()).collect()
    }

    /// Roots A and B, with A expanded to C and D, and D expanded to E and F.
    #[fixture]
    fn populated() -> TreeSnapshot {
        let tree = TreeSnapshot::default();
        let tree = merge(
            &tree,
            None,
            vec![
                RawChild::directory("B", "Bravo"),
                RawChild::directory("A", "Alpha"),
            ],
        );
        let tree = merge(
            &tree,
            Some("A"),
            vec![
                RawChild::directory("C", "Charlie"),
                RawChild::directory("D", "Delta"),
            ],
        );
        merge(
            &tree,
            Some("D"),
            vec![
                RawChild::item("E", "Echo", "study"),
                RawChild::directory("F", "Foxtrot"),
            ],
        )
    }

    fn assert_consistent(tree: &TreeSnapshot) {
        let mut reachable = HashSet::new();
        let mut stack = tree.forest().iter().cloned().collect::<Vec<_>>();
        for root in tree.forest() {
            assert_eq!(root.parent_id, None, "root {} has a parent", root.id);
        }
        while let Some(node) = stack.pop() {
            assert!(reachable.insert(node.id.clone()));
            let indexed = tree.get(&node.id).expect("reachable node is indexed");
            assert!(Arc::ptr_eq(indexed, &node), "index holds stale {}", node.id);
            for child in &node.children {
                assert_eq!(child.parent_id.as_ref(), Some(&node.id));
                stack.push(child.clone());
            }
        }
        let indexed = tree.index().keys().cloned().collect::<HashSet<_>>();
        assert_eq!(indexed, reachable);
    }

    #[test]
    fn root_fetch_is_sorted_by_name() {
        let tree = merge(
            &TreeSnapshot::default(),
            None,
            vec![
                RawChild::directory("B", "Bravo"),
                RawChild::directory("A", "Alpha"),
            ],
        );
        assert_eq!(names(tree.forest()), vec!["Alpha", "Bravo"]);
        assert_consistent(&tree);
    }

    #[rstest]
    #[case(vec!["Charlie", "alpha", "Bravo"])]
    #[case(vec!["Bravo", "Charlie", "alpha"])]
    #[case(vec!["alpha", "Bravo", "Charlie"])]
    fn children_are_sorted_regardless_of_response_order(
        populated: TreeSnapshot,
        #[case] order: Vec<&str>,
    ) {
        let fresh = order
            .iter()
            .map(|name| RawChild::directory(name.to_lowercase().as_str(), *name))
            .collect();
        let tree = merge(&populated, Some("B"), fresh);
        let bravo = tree.get(&id("B")).unwrap();
        assert_eq!(names(&bravo.children), vec!["alpha", "Bravo", "Charlie"]);
    }

    #[test]
    fn duplicate_names_are_ordered_by_id() {
        let tree = merge(
            &TreeSnapshot::default(),
            None,
            vec![
                RawChild::directory("z", "Same"),
                RawChild::directory("a", "Same"),
            ],
        );
        let ids = tree.forest().iter().map(|n| n.id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["a", "z"]);
    }

    #[test]
    fn duplicate_ids_keep_first_sorted_entry() {
        let tree = merge(
            &TreeSnapshot::default(),
            None,
            vec![
                RawChild::directory("x", "Zulu"),
                RawChild::directory("x", "Alpha"),
            ],
        );
        assert_eq!(names(tree.forest()), vec!["Alpha"]);
        assert_consistent(&tree);
    }

    #[rstest]
    fn nested_merges_keep_the_tree_consistent(populated: TreeSnapshot) {
        assert_consistent(&populated);
        let alpha = &populated.forest()[0];
        assert_eq!(names(&alpha.children), vec!["Charlie", "Delta"]);
        assert_eq!(names(&alpha.children[1].children), vec!["Echo", "Foxtrot"]);
    }

    #[rstest]
    fn identical_response_is_a_no_op(populated: TreeSnapshot) {
        let target = id("D");
        let (next, report) = reconcile(
            &populated,
            Some(&target),
            vec![
                RawChild::directory("F", "Foxtrot"),
                RawChild::item("E", "Echo", "study"),
            ],
        );
        assert_eq!(report.outcome, MergeOutcome::Unchanged);
        assert!(next.same_as(&populated));
    }

    #[rstest]
    fn identical_root_response_is_a_no_op(populated: TreeSnapshot) {
        let (next, report) = reconcile(
            &populated,
            None,
            vec![
                RawChild::directory("A", "Alpha").with_subdirectories(2),
                RawChild::directory("B", "Bravo"),
            ],
        );
        assert_eq!(report.outcome, MergeOutcome::Unchanged);
        assert!(next.same_as(&populated));
    }

    #[rstest]
    fn repeating_a_merge_is_idempotent(populated: TreeSnapshot) {
        let fresh = vec![RawChild::directory("G", "Golf")];
        let target = id("C");
        let (first, report) = reconcile(&populated, Some(&target), fresh.clone());
        assert_eq!(report.outcome, MergeOutcome::Updated);

        let (second, report) = reconcile(&first, Some(&target), fresh);
        assert_eq!(report.outcome, MergeOutcome::Unchanged);
        assert!(second.same_as(&first));
        assert_eq!(*second.index(), *first.index());
    }

    #[rstest]
    fn merge_rebuilds_ancestors_and_keeps_siblings(populated: TreeSnapshot) {
        let next = merge(&populated, Some("F"), vec![RawChild::directory("G", "Golf")]);

        for ancestor in ["A", "D", "F"] {
            let before = populated.get(&id(ancestor)).unwrap();
            let after = next.get(&id(ancestor)).unwrap();
            assert!(!Arc::ptr_eq(before, after), "{ancestor} was not rebuilt");
        }
        for untouched in ["B", "C", "E"] {
            let before = populated.get(&id(untouched)).unwrap();
            let after = next.get(&id(untouched)).unwrap();
            assert!(Arc::ptr_eq(before, after), "{untouched} lost its identity");
        }

        let alpha = &next.forest()[0];
        let delta = &alpha.children[1];
        let foxtrot = &delta.children[1];
        assert!(Arc::ptr_eq(foxtrot, next.get(&id("F")).unwrap()));
        assert_eq!(names(&foxtrot.children), vec!["Golf"]);
        assert!(Arc::ptr_eq(&next.forest()[1], &populated.forest()[1]));
        assert_consistent(&next);
    }

    #[rstest]
    fn rebuilt_target_counts_its_fetched_children(populated: TreeSnapshot) {
        let next = merge(
            &populated,
            Some("C"),
            vec![
                RawChild::directory("G", "Golf"),
                RawChild::directory("H", "Hotel"),
                RawChild::item("I", "India", "csv"),
            ],
        );
        assert_eq!(next.get(&id("C")).unwrap().subdirectories_count, 3);
    }

    #[rstest]
    fn removed_child_is_pruned_with_its_descendants(populated: TreeSnapshot) {
        let charlie_before = populated.get(&id("C")).unwrap().clone();
        let target = id("A");
        let (next, report) = reconcile(
            &populated,
            Some(&target),
            vec![RawChild::directory("C", "Charlie")],
        );

        assert_eq!(report.pruned, vec![id("D"), id("E"), id("F")]);
        for gone in ["D", "E", "F"] {
            assert!(next.get(&id(gone)).is_none(), "{gone} survived");
        }
        assert!(Arc::ptr_eq(next.get(&id("C")).unwrap(), &charlie_before));
        assert_consistent(&next);
    }

    #[rstest]
    fn removed_root_is_pruned_with_its_descendants(populated: TreeSnapshot) {
        let next = merge(&populated, None, vec![RawChild::directory("B", "Bravo")]);
        assert_eq!(names(next.forest()), vec!["Bravo"]);
        assert_eq!(next.index().len(), 1);
        assert_consistent(&next);
    }

    #[rstest]
    fn descendant_moved_up_survives_pruning(populated: TreeSnapshot) {
        let target = id("A");
        let (next, report) = reconcile(
            &populated,
            Some(&target),
            vec![
                RawChild::directory("C", "Charlie"),
                RawChild::directory("F", "Foxtrot"),
            ],
        );
        assert_eq!(report.pruned, vec![id("D"), id("E")]);
        assert_eq!(report.reparented.len(), 1);
        assert_eq!(report.reparented[0].previous_parent, Some(id("D")));
        assert_eq!(report.reparented[0].new_parent, Some(id("A")));
        assert_eq!(next.get(&id("F")).unwrap().parent_id, Some(id("A")));
        assert_consistent(&next);
    }

    #[rstest]
    fn moved_directory_keeps_its_fetched_subtree(populated: TreeSnapshot) {
        let tree = merge(&populated, Some("F"), vec![RawChild::directory("G", "Golf")]);
        let target = id("A");
        let (next, report) = reconcile(
            &tree,
            Some(&target),
            vec![
                RawChild::directory("C", "Charlie"),
                RawChild::directory("F", "Foxtrot").with_subdirectories(1),
            ],
        );
        assert_eq!(report.pruned, vec![id("D"), id("E")]);
        let foxtrot = next.get(&id("F")).unwrap();
        assert_eq!(names(&foxtrot.children), vec!["Golf"]);
        assert!(Arc::ptr_eq(next.get(&id("G")).unwrap(), tree.get(&id("G")).unwrap()));
        assert_consistent(&next);
    }

    #[rstest]
    fn node_moved_between_subtrees_leaves_its_old_parent(populated: TreeSnapshot) {
        let foxtrot = populated.get(&id("F")).unwrap().clone();
        let target = id("B");
        let (moved, report) = reconcile(
            &populated,
            Some(&target),
            vec![RawChild::directory("F", "Foxtrot")],
        );
        assert_eq!(
            report.reparented,
            vec![Reparenting {
                id: id("F"),
                previous_parent: Some(id("D")),
                new_parent: Some(id("B")),
            }]
        );
        assert!(report.pruned.is_empty());
        assert_eq!(names(&moved.get(&id("D")).unwrap().children), vec!["Echo"]);
        assert_eq!(names(&moved.get(&id("B")).unwrap().children), vec!["Foxtrot"]);
        assert!(!Arc::ptr_eq(moved.get(&id("F")).unwrap(), &foxtrot));
        assert_consistent(&moved);

        let target = id("D");
        let (refreshed, report) = reconcile(
            &moved,
            Some(&target),
            vec![RawChild::item("E", "Echo", "study")],
        );
        assert_eq!(report.outcome, MergeOutcome::Unchanged);
        assert!(refreshed.same_as(&moved));

        let (emptied, report) = reconcile(&moved, Some(&target), Vec::new());
        assert_eq!(report.pruned, vec![id("E")]);
        assert_eq!(emptied.get(&id("F")).unwrap().parent_id, Some(id("B")));
        assert_consistent(&emptied);

        let target = id("F");
        let (expanded, report) = reconcile(
            &emptied,
            Some(&target),
            vec![RawChild::directory("G", "Golf")],
        );
        assert_eq!(report.outcome, MergeOutcome::Updated);
        assert!(expanded.get(&id("G")).is_some());
        assert_consistent(&expanded);
    }

    #[rstest]
    fn root_moved_under_another_root_leaves_the_forest(populated: TreeSnapshot) {
        let target = id("A");
        let (next, report) = reconcile(
            &populated,
            Some(&target),
            vec![
                RawChild::directory("B", "Bravo"),
                RawChild::directory("C", "Charlie"),
                RawChild::directory("D", "Delta").with_subdirectories(2),
            ],
        );
        assert_eq!(report.reparented.len(), 1);
        assert_eq!(report.reparented[0].previous_parent, None);
        assert_eq!(names(next.forest()), vec!["Alpha"]);
        assert_eq!(
            names(&next.forest()[0].children),
            vec!["Bravo", "Charlie", "Delta"]
        );
        assert_eq!(next.get(&id("B")).unwrap().parent_id, Some(id("A")));
        assert_consistent(&next);
    }

    #[rstest]
    fn nested_node_promoted_to_root_leaves_its_old_parent(populated: TreeSnapshot) {
        let (next, report) = reconcile(
            &populated,
            None,
            vec![
                RawChild::directory("A", "Alpha").with_subdirectories(2),
                RawChild::directory("B", "Bravo"),
                RawChild::directory("F", "Foxtrot"),
            ],
        );
        assert_eq!(report.reparented[0].new_parent, None);
        assert_eq!(names(next.forest()), vec!["Alpha", "Bravo", "Foxtrot"]);
        assert_eq!(names(&next.get(&id("D")).unwrap().children), vec!["Echo"]);
        assert_consistent(&next);
    }

    #[rstest]
    fn ancestor_listed_under_its_descendant_is_ignored(populated: TreeSnapshot) {
        let target = id("D");
        let (next, report) = reconcile(
            &populated,
            Some(&target),
            vec![
                RawChild::directory("A", "Alpha"),
                RawChild::directory("D", "Delta"),
                RawChild::item("E", "Echo", "study"),
                RawChild::directory("F", "Foxtrot"),
            ],
        );
        assert_eq!(report.outcome, MergeOutcome::Unchanged);
        assert!(report.reparented.is_empty());
        assert!(next.same_as(&populated));
    }

    #[rstest]
    fn pruning_skips_entries_replaced_by_another_node(populated: TreeSnapshot) {
        let mut workspace = Workspace::of(&populated);
        let old = populated.get(&id("F")).unwrap().clone();
        let replacement = Arc::new(old.with_children(Vec::new()));
        workspace.index.insert(id("F"), replacement.clone());

        let echo = populated.get(&id("E")).unwrap().clone();
        let stale = HashMap::from([(id("F"), old), (id("E"), echo)]);
        assert_eq!(workspace.prune(&stale), vec![id("E")]);
        assert!(Arc::ptr_eq(workspace.index.get(&id("F")).unwrap(), &replacement));
    }

    #[rstest]
    fn fetched_metadata_replaces_cached_metadata(populated: TreeSnapshot) {
        let target = id("D");
        let described = merge(
            &populated,
            Some("D"),
            vec![
                RawChild::item("E", "Echo", "study").described("owner", "me"),
                RawChild::directory("F", "Foxtrot"),
            ],
        );
        let echo = described.get(&id("E")).unwrap().clone();
        assert_eq!(echo.metadata.get("owner").map(String::as_str), Some("me"));

        let (plain, report) = reconcile(
            &described,
            Some(&target),
            vec![
                RawChild::item("E", "Echo", "study"),
                RawChild::directory("F", "Foxtrot"),
            ],
        );
        assert_eq!(report.outcome, MergeOutcome::Unchanged);
        assert!(plain.same_as(&described));

        let redescribed = merge(
            &described,
            Some("D"),
            vec![
                RawChild::item("E", "Echo", "study").described("owner", "lab"),
                RawChild::directory("F", "Foxtrot"),
            ],
        );
        let echo = redescribed.get(&id("E")).unwrap();
        assert_eq!(echo.metadata.get("owner").map(String::as_str), Some("lab"));
        assert_consistent(&redescribed);
    }

    #[rstest]
    fn renamed_directory_keeps_fetched_children(populated: TreeSnapshot) {
        let delta_before = populated.get(&id("D")).unwrap().clone();
        let target = id("A");
        let (next, report) = reconcile(
            &populated,
            Some(&target),
            vec![
                RawChild::directory("C", "Charlie"),
                RawChild::directory("D", "Aardvark").with_subdirectories(2),
            ],
        );
        assert!(report.reparented.is_empty());

        let delta = next.get(&id("D")).unwrap();
        assert!(!Arc::ptr_eq(delta, &delta_before));
        assert_eq!(delta.name, "Aardvark");
        assert_eq!(names(&delta.children), vec!["Echo", "Foxtrot"]);
        assert!(Arc::ptr_eq(&delta.children[0], &delta_before.children[0]));
        assert_eq!(names(&next.forest()[0].children), vec!["Aardvark", "Charlie"]);
        assert_consistent(&next);
    }

    #[rstest]
    #[case(RawChild::directory("C", "Charlie").private(true))]
    #[case(RawChild::directory("C", "Charlie").with_subdirectories(4))]
    #[case(RawChild::directory("C", "Charles"))]
    fn changed_field_produces_new_identity(populated: TreeSnapshot, #[case] fresh: RawChild) {
        let before = populated.get(&id("C")).unwrap().clone();
        let next = merge(
            &populated,
            Some("A"),
            vec![fresh, RawChild::directory("D", "Delta").with_subdirectories(2)],
        );
        assert!(!Arc::ptr_eq(next.get(&id("C")).unwrap(), &before));
        assert!(Arc::ptr_eq(
            next.get(&id("D")).unwrap(),
            populated.get(&id("D")).unwrap()
        ));
    }

    #[rstest]
    fn stale_target_is_dropped(populated: TreeSnapshot) {
        let pruned = merge(&populated, Some("A"), vec![RawChild::directory("C", "Charlie")]);
        let late = id("D");
        let (next, report) = reconcile(
            &pruned,
            Some(&late),
            vec![RawChild::directory("Z", "Zulu")],
        );
        assert_eq!(report.outcome, MergeOutcome::StaleTarget);
        assert!(next.same_as(&pruned));
        assert!(next.get(&id("Z")).is_none());
    }

    #[rstest]
    fn empty_response_clears_children(populated: TreeSnapshot) {
        let next = merge(&populated, Some("D"), Vec::new());
        let delta = next.get(&id("D")).unwrap();
        assert!(delta.children.is_empty());
        assert_eq!(delta.subdirectories_count, 0);
        assert!(next.get(&id("E")).is_none());
        assert_consistent(&next);
    }

    #[test]
    fn stale_snapshot_stays_valid_after_merge() {
        let first = merge(
            &TreeSnapshot::default(),
            None,
            vec![RawChild::directory("A", "Alpha")],
        );
        let second = merge(&first, Some("A"), vec![RawChild::directory("B", "Bravo")]);
        assert!(first.get(&id("B")).is_none());
        assert!(first.forest()[0].children.is_empty());
        assert_eq!(names(&second.forest()[0].children), vec!["Bravo"]);
    }
}
