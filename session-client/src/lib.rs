//! # session-client
//!
//! Session synchronizer for the campus app.
//!
//! This is the library the UI layer talks to. It reconciles the identity
//! provider's change stream, the remote profile store and the local snapshot
//! cache, and emits navigation intents as the session changes.
//!
//! ## Features
//!
//! - **Single writer**: all transitions are serialized behind one lock
//! - **Fail closed**: a provider identity without a readable profile ends up signed out
//! - **Optimistic start**: a cached snapshot is shown before the provider reports
//! - **Pluggable collaborators**: provider, store, cache and navigator are traits with mocks
//! - **Pure State Machine**: Uses session-core for side-effect-free logic
//!
//! ## Example
//!
//! ```ignore
//! use campus_session_client::{SessionSynchronizer, SessionConfig, FileCache};
//!
//! let sync = SessionSynchronizer::start(provider, store, FileCache::in_dir(dir), navigator,
//!     SessionConfig::default()).await;
//!
//! sync.sign_in("a@b.com", "secret1").await?;
//! let state = sync.state();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cache;
pub mod config;
pub mod error;
pub mod navigator;
pub mod provider;
pub mod store;
pub mod synchronizer;

pub use cache::{CacheError, FileCache, LocalCache, MemoryCache};
pub use config::{ConfigError, SessionConfig};
pub use navigator::{ChannelNavigator, Navigator, RecordingNavigator};
pub use provider::{IdentityProvider, IdentityStatus, MockIdentityProvider, ProviderError};
pub use store::{MockProfileStore, ProfileStore, StoreError};
pub use synchronizer::SessionSynchronizer;

pub use campus_session_core::{RetryPolicy, SessionState};
pub use campus_session_types::{
    IdentityId, ProfilePatch, ProfileRecord, Role, RoleAttributes, Route, SessionError,
};
