//! Configuration loader for avops.
//!
//! Reads `config.toml` from the data directory and deserializes it into
//! [`AvopsConfig`]. Falls back to defaults when the file is missing or
//! malformed.

use std::path::{Path, PathBuf};

use avops_types::config::AvopsConfig;

use crate::filesystem::resolve_under;

/// Load configuration from `{data_dir}/config.toml`.
///
/// - Missing file: [`AvopsConfig::default()`].
/// - Unreadable or unparsable file: logs a warning, returns the default.
pub async fn load_config(data_dir: &Path) -> AvopsConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return AvopsConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return AvopsConfig::default();
        }
    };

    match toml::from_str::<AvopsConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            AvopsConfig::default()
        }
    }
}

/// Absolute paths derived from the data directory and the loaded config.
#[derive(Debug, Clone, PartialEq)]
pub struct DataLayout {
    pub data_dir: PathBuf,
    pub database_path: PathBuf,
    pub recipes_dir: PathBuf,
}

impl DataLayout {
    pub fn new(data_dir: &Path, config: &AvopsConfig) -> Self {
        Self {
            data_dir: data_dir.to_path_buf(),
            database_path: resolve_under(data_dir, &config.database_file),
            recipes_dir: resolve_under(data_dir, &config.recipes_dir),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use avops_types::bundle::MergePolicy;
    use tempfile::TempDir;

    #[tokio::test]
    async fn load_config_missing_file_returns_default() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(tmp.path()).await;
        assert_eq!(config, AvopsConfig::default());
    }

    #[tokio::test]
    async fn load_config_valid_toml_returns_parsed() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(
            tmp.path().join("config.toml"),
            r#"
recipes_dir = "playbooks"
default_merge_policy = "rename"
tick_interval_secs = 15
"#,
        )
        .await
        .unwrap();

        let config = load_config(tmp.path()).await;
        assert_eq!(config.recipes_dir, "playbooks");
        assert_eq!(config.default_merge_policy, MergePolicy::Rename);
        assert_eq!(config.tick_interval_secs, 15);
        assert_eq!(config.database_file, "avops.db");
    }

    #[tokio::test]
    async fn load_config_invalid_toml_returns_default() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(tmp.path().join("config.toml"), "this is not { valid toml !!!")
            .await
            .unwrap();

        let config = load_config(tmp.path()).await;
        assert_eq!(config, AvopsConfig::default());
    }

    #[test]
    fn data_layout_joins_relative_paths() {
        let layout = DataLayout::new(Path::new("/srv/avops"), &AvopsConfig::default());
        assert_eq!(layout.database_path, PathBuf::from("/srv/avops/avops.db"));
        assert_eq!(layout.recipes_dir, PathBuf::from("/srv/avops/recipes"));
    }
}
