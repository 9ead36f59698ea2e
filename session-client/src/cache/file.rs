//! File-backed snapshot cache.

use super::{CacheError, LocalCache};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Default snapshot file name inside a data directory.
pub const SNAPSHOT_FILE: &str = "session_snapshot.json";

/// Snapshot cache stored as a single owner-only file.
///
/// Writes go to a sibling temp file which is then renamed over the target, so
/// a crash mid-write leaves either the old or the new snapshot.
#[derive(Debug, Clone)]
pub struct FileCache {
    path: PathBuf,
}

impl FileCache {
    /// Cache stored at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Cache stored as `session_snapshot.json` inside `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self::new(dir.as_ref().join(SNAPSHOT_FILE))
    }

    /// Path of the snapshot file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl LocalCache for FileCache {
    async fn read_snapshot(&self) -> Result<Option<String>, CacheError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_snapshot(&self, payload: &str) -> Result<(), CacheError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let tmp = self.temp_path();
        tokio::fs::write(&tmp, payload).await?;
        set_file_permissions_0600(&tmp).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    async fn clear(&self) -> Result<(), CacheError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Set file permissions to 0600 (owner read/write only) on Unix.
/// No-op on non-Unix platforms.
async fn set_file_permissions_0600(path: &Path) -> Result<(), CacheError> {
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
