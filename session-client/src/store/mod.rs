//! Profile store abstraction.
//!
//! The profile store is the remote document database holding one
//! [`ProfileRecord`] per identity. Reads immediately after a write from the
//! same client may not observe that write.

mod mock;

pub use mock::MockProfileStore;

use async_trait::async_trait;
use campus_session_types::{IdentityId, ProfilePatch, ProfileRecord};
use thiserror::Error;

/// Profile store errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// No record for the identity.
    #[error("profile not found")]
    NotFound,

    /// The store refused the request.
    #[error("permission denied")]
    PermissionDenied,

    /// Network or service failure.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The stored document could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Profile store trait.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Fetch the record for `id`. `Ok(None)` means the record does not exist.
    async fn get(&self, id: &IdentityId) -> Result<Option<ProfileRecord>, StoreError>;

    /// Create the record for `record.id`, replacing any existing one.
    async fn create(&self, record: &ProfileRecord) -> Result<(), StoreError>;

    /// Merge `patch` into the existing record for `id`.
    ///
    /// Fails with [`StoreError::NotFound`] when there is no record.
    async fn update(&self, id: &IdentityId, patch: &ProfilePatch) -> Result<(), StoreError>;
}
