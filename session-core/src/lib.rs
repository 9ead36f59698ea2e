//! # session-core
//!
//! Pure logic for the campus session synchronizer (no I/O, instant tests).
//!
//! This crate implements the session state machine, the lookup retry policy
//! and the cached-snapshot codec without any network or disk I/O.
//!
//! ## Design Philosophy
//!
//! All modules in this crate are **pure** - they take input and produce output
//! without side effects. The state machine returns [`Action`] values
//! (write the snapshot, clear it, force a sign-out, navigate somewhere) instead
//! of performing them. `session-client` owns the collaborators and interprets
//! those actions.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backoff;
pub mod snapshot;
pub mod state;

pub use backoff::RetryPolicy;
pub use snapshot::{SnapshotError, SNAPSHOT_VERSION};
pub use state::{Action, Event, SessionState};
