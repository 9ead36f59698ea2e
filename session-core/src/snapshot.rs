//! Codec for the cached session snapshot.
//!
//! The local cache holds at most one serialized profile. The payload is a
//! small JSON envelope carrying a format version, so a snapshot written by an
//! incompatible build is discarded instead of misread.

use campus_session_types::ProfileRecord;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Snapshot codec errors.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// Payload is not a valid snapshot document.
    #[error("malformed snapshot: {0}")]
    Malformed(String),

    /// Snapshot was written with a format this build does not read.
    #[error("unsupported snapshot version: {0}")]
    UnsupportedVersion(u32),
}

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    version: u32,
    profile: &'a ProfileRecord,
}

#[derive(Deserialize)]
struct Envelope {
    version: u32,
    profile: serde_json::Value,
}

/// Serialize a profile into a snapshot payload.
pub fn encode(profile: &ProfileRecord) -> Result<String, SnapshotError> {
    serde_json::to_string(&EnvelopeRef {
        version: SNAPSHOT_VERSION,
        profile,
    })
    .map_err(|e| SnapshotError::Malformed(e.to_string()))
}

/// Parse a snapshot payload back into a profile.
pub fn decode(raw: &str) -> Result<ProfileRecord, SnapshotError> {
    let envelope: Envelope =
        serde_json::from_str(raw).map_err(|e| SnapshotError::Malformed(e.to_string()))?;

    if envelope.version != SNAPSHOT_VERSION {
        return Err(SnapshotError::UnsupportedVersion(envelope.version));
    }

    serde_json::from_value(envelope.profile).map_err(|e| SnapshotError::Malformed(e.to_string()))
}
