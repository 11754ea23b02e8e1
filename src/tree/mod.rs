//! Client-side cache of a remote directory hierarchy.
//!
//! The hierarchy is only partially known: roots are fetched first and each
//! directory's content is fetched when it is expanded. Every fetch result is
//! reconciled into an immutable snapshot that shares all unchanged nodes with
//! the previous one.

mod cache;
mod collation;
mod node;
mod project;
mod reconcile;

pub use cache::TreeCache;
pub use collation::locale_compare;
pub use node::{AccessRights, ElementKind, Node, NodeId, RawChild};
pub use project::{DefaultClassifier, Icon, TypeClassifier, ViewNode, directory_first, project};
pub use reconcile::{MergeOutcome, MergeReport, Reparenting, TreeSnapshot, reconcile};
