//! Data directory and configuration handling.

use anyhow::{Context, Result};
use campus_session_client::SessionConfig;
use std::path::{Path, PathBuf};

/// Configuration file name inside the data directory.
pub const CONFIG_FILE: &str = "session.toml";

/// Get the default data directory for campus-session.
pub fn default_data_dir() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("edu", "campus", "campus-session")
        .context("Could not determine home directory")?;
    Ok(dirs.data_dir().to_path_buf())
}

/// Create the data directory (owner-only on Unix).
pub async fn prepare_data_dir(data_dir: &Path) -> Result<()> {
    tokio::fs::create_dir_all(data_dir)
        .await
        .context("Failed to create data directory")?;
    set_dir_permissions_0700(data_dir)
        .await
        .context("Failed to set directory permissions")?;
    Ok(())
}

/// Load `session.toml` from the data directory, or defaults when absent.
pub fn load_session_config(data_dir: &Path) -> Result<SessionConfig> {
    let path = data_dir.join(CONFIG_FILE);
    if !path.exists() {
        return Ok(SessionConfig::default());
    }
    let config = SessionConfig::from_file(&path)
        .with_context(|| format!("Failed to load {}", path.display()))?;
    tracing::debug!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Set file permissions to 0600 (owner read/write only) on Unix.
/// No-op on non-Unix platforms.
pub async fn set_file_permissions_0600(path: &Path) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).await?;
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
    Ok(())
}

/// Set directory permissions to 0700 (owner only) on Unix.
/// No-op on non-Unix platforms.
pub async fn set_dir_permissions_0700(path: &Path) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700)).await?;
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
    Ok(())
}
