//! Sources of directory content: the remote side the tree cache mirrors.

mod filesystem;
mod fixture;
mod source;

pub use filesystem::FilesystemSource;
pub use fixture::{FixtureError, FixtureSource};
pub use source::{DirectorySource, SourceError};
