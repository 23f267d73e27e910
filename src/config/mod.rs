//! Configuration system
//!
//! Sections are declared with [`config_struct!`](crate::config_struct) in
//! `schemas`, loaded from TOML (defaults when the file is missing), then
//! overridden from the environment. The result is an immutable [`Config`]
//! handed to each component.

#[macro_use]
mod macros;
mod schemas;
mod utils;

pub use schemas::{
    BackfillConfig, Config, DatabaseConfig, GeckoTerminalConfig, InterpolationConfig,
    ValidationConfig,
};
pub use utils::{
    apply_env_overrides, apply_overrides_from, load_config_from_path, validate_config,
    CONFIG_FILE_PATH,
};
