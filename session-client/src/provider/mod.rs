//! Identity provider abstraction.
//!
//! The identity provider is the external authentication service. It verifies
//! credentials, registers new ones, signs out, and reports its current
//! signed-in identity to observers.
//!
//! # Design
//!
//! The change stream is a `tokio::sync::watch` channel of [`IdentityStatus`]:
//! observers only ever need the provider's *latest* verdict, so intermediate
//! reports may be coalesced. The channel starts at [`IdentityStatus::Pending`]
//! until the provider has checked its persisted login.

mod mock;

pub use mock::MockIdentityProvider;

use async_trait::async_trait;
use campus_session_types::IdentityId;
use thiserror::Error;
use tokio::sync::watch;

/// The provider's view of who is signed in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityStatus {
    /// The provider has not reported yet.
    Pending,
    /// An identity is signed in.
    SignedIn(IdentityId),
    /// No identity is signed in.
    SignedOut,
}

/// Identity provider errors, one variant per provider error code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// Credential pair rejected.
    #[error("auth/invalid-credential")]
    InvalidCredential,

    /// No account for the identifier.
    #[error("auth/user-not-found")]
    UserNotFound,

    /// Wrong secret for an existing account.
    #[error("auth/wrong-password")]
    WrongPassword,

    /// Identifier is not a well-formed email.
    #[error("auth/invalid-email")]
    InvalidEmail,

    /// Secret rejected by the provider's strength rules.
    #[error("auth/weak-password")]
    WeakPassword,

    /// Account disabled by an administrator.
    #[error("auth/user-disabled")]
    UserDisabled,

    /// Identifier is already registered.
    #[error("auth/email-already-in-use")]
    EmailAlreadyInUse,

    /// Too many failed attempts.
    #[error("auth/too-many-requests")]
    TooManyRequests,

    /// Network failure reaching the provider.
    #[error("auth/network-request-failed: {0}")]
    Network(String),

    /// Any other provider code.
    #[error("{code}: {message}")]
    Other {
        /// Provider error code.
        code: String,
        /// Provider error message.
        message: String,
    },
}

impl ProviderError {
    /// Parse a provider error code such as `auth/user-not-found`.
    pub fn from_code(code: &str, message: &str) -> Self {
        match code {
            "auth/invalid-credential" | "auth/invalid-login-credentials" => {
                ProviderError::InvalidCredential
            }
            "auth/user-not-found" => ProviderError::UserNotFound,
            "auth/wrong-password" => ProviderError::WrongPassword,
            "auth/invalid-email" => ProviderError::InvalidEmail,
            "auth/weak-password" => ProviderError::WeakPassword,
            "auth/user-disabled" => ProviderError::UserDisabled,
            "auth/email-already-in-use" => ProviderError::EmailAlreadyInUse,
            "auth/too-many-requests" => ProviderError::TooManyRequests,
            "auth/network-request-failed" => ProviderError::Network(message.to_string()),
            _ => ProviderError::Other {
                code: code.to_string(),
                message: message.to_string(),
            },
        }
    }
}

/// Identity provider trait.
///
/// Implementations wrap a hosted auth SDK, a local emulator, or a mock.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Verify a credential pair and sign in.
    ///
    /// On success the provider also reports `SignedIn` on its change stream.
    async fn authenticate(&self, identifier: &str, secret: &str)
        -> Result<IdentityId, ProviderError>;

    /// Register a new credential pair and sign in as the new identity.
    async fn register(&self, identifier: &str, secret: &str) -> Result<IdentityId, ProviderError>;

    /// Sign out the current identity. Signing out while signed out succeeds.
    async fn sign_out(&self) -> Result<(), ProviderError>;

    /// Observe the provider's signed-in identity.
    fn subscribe(&self) -> watch::Receiver<IdentityStatus>;
}
