mod path_ext;
mod yaml_ext;

pub use path_ext::{PathIdExt, stable_path};
pub use yaml_ext::{YamlMappingExt, scalar_bool, scalar_list, scalar_text};
