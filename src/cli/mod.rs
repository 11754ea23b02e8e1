mod cli;
mod render;

pub use cli::Cli;
pub use render::{render_tree, stdout_supports_color};
