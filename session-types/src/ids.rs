//! Identity types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identity id issued by the identity provider.
///
/// Opaque to the session layer: it is only ever compared and used as the key
/// for the profile store.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentityId(String);

impl IdentityId {
    /// Wrap a provider-issued id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Create a new random IdentityId (UUID v4, simple form).
    ///
    /// Used by in-process providers; hosted providers issue their own ids.
    pub fn random() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    /// Borrow the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for IdentityId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl fmt::Display for IdentityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for IdentityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IdentityId({})", self.0)
    }
}
