mod selector_config;

pub use selector_config::{SelectorConfig, SelectorConfigError};
