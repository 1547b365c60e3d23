//! Run configuration.
//!
//! A [`RunConfig`] comes from an optional `rconf.toml`, is overlaid with
//! command-line flags and is validated once before anything runs.

pub mod parser;
pub mod schema;

pub use parser::{parse_config_file, parse_config_str, to_toml};
pub use schema::{DEFAULT_CONFIG_FILE, DEFAULT_LOG_FILE, RunConfig, expand_home};
