//! Classification of collaborator errors into [`SessionError`].
//!
//! Provider and store errors never cross the session boundary as-is; every
//! code lands in one variant of the closed taxonomy.

use crate::provider::ProviderError;
use crate::store::StoreError;
use campus_session_types::SessionError;

impl From<ProviderError> for SessionError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::InvalidCredential
            | ProviderError::UserNotFound
            | ProviderError::WrongPassword
            | ProviderError::InvalidEmail
            | ProviderError::WeakPassword
            | ProviderError::UserDisabled => SessionError::InvalidCredentials,
            ProviderError::EmailAlreadyInUse => SessionError::AccountAlreadyExists,
            ProviderError::TooManyRequests => SessionError::RateLimited,
            ProviderError::Network(_) | ProviderError::Other { .. } => SessionError::Unavailable,
        }
    }
}

impl From<StoreError> for SessionError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => SessionError::ProfileMissing,
            StoreError::PermissionDenied
            | StoreError::Unavailable(_)
            | StoreError::Serialization(_) => SessionError::Unavailable,
        }
    }
}
