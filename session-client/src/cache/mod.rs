//! Local snapshot cache.
//!
//! The cache holds at most one serialized snapshot and survives restarts. It
//! is never authoritative: the synchronizer only reads it once at start and
//! treats every failure as "no snapshot".

mod file;

pub use file::FileCache;

use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

/// Local cache errors.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Filesystem failure.
    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Backing storage is not available.
    #[error("cache unavailable: {0}")]
    Unavailable(String),
}

/// Persistent key/value cache holding the session snapshot.
#[async_trait]
pub trait LocalCache: Send + Sync {
    /// Read the stored snapshot payload, if any.
    async fn read_snapshot(&self) -> Result<Option<String>, CacheError>;

    /// Replace the stored snapshot payload.
    async fn write_snapshot(&self, payload: &str) -> Result<(), CacheError>;

    /// Remove the stored snapshot. Clearing an empty cache succeeds.
    async fn clear(&self) -> Result<(), CacheError>;
}

/// In-memory cache for tests and ephemeral sessions.
///
/// Clones share the same slot.
#[derive(Debug, Clone, Default)]
pub struct MemoryCache {
    inner: Arc<Mutex<MemoryCacheInner>>,
}

#[derive(Debug, Default)]
struct MemoryCacheInner {
    payload: Option<String>,
    writes: usize,
    clears: usize,
    fail_next_write: bool,
    fail_next_read: bool,
}

impl MemoryCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a cache that already holds `payload`.
    pub fn with_snapshot(payload: impl Into<String>) -> Self {
        let cache = Self::new();
        cache.inner().payload = Some(payload.into());
        cache
    }

    fn inner(&self) -> MutexGuard<'_, MemoryCacheInner> {
        self.inner.lock().expect("memory cache lock poisoned")
    }

    /// The stored payload.
    pub fn snapshot(&self) -> Option<String> {
        self.inner().payload.clone()
    }

    /// Number of successful writes.
    pub fn write_count(&self) -> usize {
        self.inner().writes
    }

    /// Number of clears.
    pub fn clear_count(&self) -> usize {
        self.inner().clears
    }

    /// Cause the next write to fail.
    pub fn fail_next_write(&self) {
        self.inner().fail_next_write = true;
    }

    /// Cause the next read to fail.
    pub fn fail_next_read(&self) {
        self.inner().fail_next_read = true;
    }
}

#[async_trait]
impl LocalCache for MemoryCache {
    async fn read_snapshot(&self) -> Result<Option<String>, CacheError> {
        let mut inner = self.inner();
        if std::mem::take(&mut inner.fail_next_read) {
            return Err(CacheError::Unavailable("forced read failure".into()));
        }
        Ok(inner.payload.clone())
    }

    async fn write_snapshot(&self, payload: &str) -> Result<(), CacheError> {
        let mut inner = self.inner();
        if std::mem::take(&mut inner.fail_next_write) {
            return Err(CacheError::Unavailable("forced write failure".into()));
        }
        inner.payload = Some(payload.to_string());
        inner.writes += 1;
        Ok(())
    }

    async fn clear(&self) -> Result<(), CacheError> {
        let mut inner = self.inner();
        inner.payload = None;
        inner.clears += 1;
        Ok(())
    }
}
