//! Filesystem adapter for avops.
//!
//! Implements the `FileSystem` trait from `avops-core` for real filesystem
//! I/O, and resolves the data directory layout (database, recipes,
//! `config.toml`).

use std::path::{Path, PathBuf};

use avops_core::service::fs::FileSystem;

/// Local filesystem implementation of the `FileSystem` trait.
///
/// All operations go through `tokio::fs` for async I/O.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileSystem;

impl LocalFileSystem {
    pub fn new() -> Self {
        Self
    }
}

impl FileSystem for LocalFileSystem {
    async fn write_file(&self, path: &Path, content: &str) -> Result<(), std::io::Error> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, content).await
    }

    async fn read_file(&self, path: &Path) -> Result<String, std::io::Error> {
        tokio::fs::read_to_string(path).await
    }

    async fn create_dir_all(&self, path: &Path) -> Result<(), std::io::Error> {
        tokio::fs::create_dir_all(path).await
    }

    async fn exists(&self, path: &Path) -> bool {
        tokio::fs::try_exists(path).await.unwrap_or(false)
    }
}

/// Resolve the data directory from environment or platform defaults.
///
/// Priority:
/// 1. `AVOPS_DATA_DIR` environment variable
/// 2. `~/.avops`
/// 3. `./.avops`
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("AVOPS_DATA_DIR") {
        if !dir.trim().is_empty() {
            return PathBuf::from(dir);
        }
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".avops");
    }

    PathBuf::from(".avops")
}

/// Join `relative` onto `data_dir` unless it is already absolute, then make
/// the result absolute so stored recipe paths do not depend on the cwd.
pub fn resolve_under(data_dir: &Path, relative: &str) -> PathBuf {
    let joined = data_dir.join(relative);
    std::path::absolute(&joined).unwrap_or(joined)
}
