//! Configuration types for avops.
//!
//! `AvopsConfig` is the top-level `config.toml` inside the data directory.

use serde::{Deserialize, Serialize};

use crate::bundle::MergePolicy;

/// Top-level configuration.
///
/// Loaded from `{data_dir}/config.toml`. All fields have sensible defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvopsConfig {
    /// SQLite file name, relative to the data directory.
    #[serde(default = "default_database_file")]
    pub database_file: String,

    /// Directory holding recipe YAML files, relative to the data directory.
    #[serde(default = "default_recipes_dir")]
    pub recipes_dir: String,

    /// Merge policy used by `bundle import` when none is given.
    #[serde(default)]
    pub default_merge_policy: MergePolicy,

    /// Default row limit for run listings.
    #[serde(default = "default_latest_runs_limit")]
    pub latest_runs_limit: u32,

    /// Seconds between ticks in `tick --watch`.
    #[serde(default = "default_tick_interval_secs")]
    pub tick_interval_secs: u64,
}

fn default_database_file() -> String {
    "avops.db".to_string()
}

fn default_recipes_dir() -> String {
    "recipes".to_string()
}

fn default_latest_runs_limit() -> u32 {
    50
}

fn default_tick_interval_secs() -> u64 {
    60
}

impl Default for AvopsConfig {
    fn default() -> Self {
        Self {
            database_file: default_database_file(),
            recipes_dir: default_recipes_dir(),
            default_merge_policy: MergePolicy::default(),
            latest_runs_limit: default_latest_runs_limit(),
            tick_interval_secs: default_tick_interval_secs(),
        }
    }
}
