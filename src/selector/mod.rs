//! Directory browsing on top of the tree cache: fetch on expand, filter, merge.

mod filter;
mod notifier;
mod selector;

pub use filter::{ItemFilter, SelectionFilter};
pub use notifier::{Notifier, TracingNotifier};
pub use selector::{DirectorySelector, SelectorError};
