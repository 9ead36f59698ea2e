//! Error taxonomy surfaced to callers of session operations.

use thiserror::Error;

/// Errors returned by session mutation operations.
///
/// This set is closed: provider and store error codes are classified into one
/// of these variants before they leave the session layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// Identifier or secret rejected by the identity provider.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Sign-up identifier is already registered.
    #[error("account already exists")]
    AccountAlreadyExists,

    /// Identity authenticated but no profile record exists.
    #[error("account profile is missing")]
    ProfileMissing,

    /// Operation requires a signed-in session.
    #[error("not authenticated")]
    NotAuthenticated,

    /// Too many attempts in a short window.
    #[error("rate limit exceeded")]
    RateLimited,

    /// Transient network or service failure.
    #[error("service unavailable")]
    Unavailable,

    /// A remote call did not complete in time.
    #[error("operation timed out")]
    Timeout,
}

impl SessionError {
    /// Whether retrying with the same input may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SessionError::Unavailable | SessionError::Timeout | SessionError::RateLimited
        )
    }

    /// Whether the failure is transient infrastructure trouble rather than a
    /// verdict about the request.
    pub fn is_transient(&self) -> bool {
        matches!(self, SessionError::Unavailable | SessionError::Timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        assert_eq!(
            SessionError::InvalidCredentials.to_string(),
            "invalid credentials"
        );
        assert_eq!(SessionError::Timeout.to_string(), "operation timed out");
    }

    #[test]
    fn retryable_kinds() {
        assert!(SessionError::Unavailable.is_retryable());
        assert!(SessionError::Timeout.is_retryable());
        assert!(SessionError::RateLimited.is_retryable());
        assert!(!SessionError::InvalidCredentials.is_retryable());
        assert!(!SessionError::ProfileMissing.is_retryable());
        assert!(!SessionError::RateLimited.is_transient());
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SessionError>();
    }
}
