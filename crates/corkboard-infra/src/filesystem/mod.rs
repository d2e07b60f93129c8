//! Data directory layout for Corkboard.
//!
//! Everything a local installation persists lives under one directory:
//!
//! ```text
//! {data_dir}/
//!   config.toml     optional, see corkboard_types::config
//!   corkboard.db    SQLite documents, accounts and sessions
//!   session.token   CLI bearer token (0600)
//! ```

use std::path::{Path, PathBuf};

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "CORKBOARD_DATA_DIR";

/// Resolve the data directory.
///
/// Priority:
/// 1. `CORKBOARD_DATA_DIR` environment variable
/// 2. `~/.corkboard`
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        if !dir.trim().is_empty() {
            return PathBuf::from(dir);
        }
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".corkboard");
    }

    // Last resort: current directory
    PathBuf::from(".corkboard")
}

/// Create the data directory if it does not exist yet.
pub async fn ensure_data_dir(data_dir: &Path) -> Result<(), std::io::Error> {
    if tokio::fs::try_exists(data_dir).await? {
        return Ok(());
    }
    tokio::fs::create_dir_all(data_dir).await?;
    tracing::info!("created data directory {}", data_dir.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_ensure_data_dir_creates_nested() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        ensure_data_dir(&nested).await.unwrap();
        assert!(nested.is_dir());
        // Second call is a no-op.
        ensure_data_dir(&nested).await.unwrap();
    }

    #[test]
    fn test_resolve_data_dir_from_env() {
        // SAFETY: This test is single-threaded and restores the env var immediately.
        unsafe {
            std::env::set_var(DATA_DIR_ENV, "/tmp/test-corkboard");
        }
        let dir = resolve_data_dir();
        assert_eq!(dir, PathBuf::from("/tmp/test-corkboard"));
        unsafe {
            std::env::remove_var(DATA_DIR_ENV);
        }
        assert!(resolve_data_dir().ends_with(".corkboard"));
    }
}
