//! Session state machine.
//!
//! This module provides a pure, side-effect-free state machine for the
//! session lifecycle. It takes events as input and produces a new state plus
//! a list of actions to execute.
//!
//! The actual I/O (cache writes, provider sign-out, navigation) is performed
//! by session-client, not by this module.

use campus_session_types::{IdentityId, ProfilePatch, ProfileRecord, Route};

/// Session state machine - NO I/O, just state transitions.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    /// The identity provider has not reported yet.
    Unresolved,
    /// A user is signed in.
    Authenticated {
        /// The signed-in user's profile.
        profile: ProfileRecord,
        /// False while the profile only comes from the cached snapshot and the
        /// provider has not confirmed it.
        confirmed: bool,
        /// The route most recently dispatched for this session. Not always
        /// the role route: fresh registrations land on the shared home.
        route: Route,
    },
    /// Nobody is signed in.
    Anonymous,
}

impl SessionState {
    /// Create a new state machine in the Unresolved state.
    pub fn new() -> Self {
        Self::Unresolved
    }

    /// Process an event and return the new state plus actions to execute.
    ///
    /// This is a pure function - no side effects. The caller (session-client)
    /// is responsible for executing the returned actions.
    ///
    /// Explicit sign-in and registration always navigate. Provider reports
    /// for the identity already signed in only navigate when the role route
    /// differs from the route last dispatched.
    pub fn on_event(self, event: Event) -> (Self, Vec<Action>) {
        match (self, event) {
            // Optimistic restore, only before the provider has spoken
            (Self::Unresolved, Event::SnapshotRestored { profile }) => {
                let route = Route::for_role(&profile.role);
                (
                    Self::Authenticated {
                        profile,
                        confirmed: false,
                        route,
                    },
                    vec![Action::Navigate(route)],
                )
            }
            (state, Event::SnapshotRestored { .. }) => (state, vec![]),

            // Provider echo for the identity already signed in
            (
                Self::Authenticated {
                    profile: current,
                    route: previous,
                    ..
                },
                Event::ProfileLoaded { profile },
            ) if current.id == profile.id => {
                if current == profile {
                    return (
                        Self::Authenticated {
                            profile: current,
                            confirmed: true,
                            route: previous,
                        },
                        vec![],
                    );
                }
                let route = Route::for_role(&profile.role);
                let mut actions = vec![Action::WriteSnapshot {
                    profile: profile.clone(),
                }];
                if route != previous {
                    actions.push(Action::Navigate(route));
                }
                (
                    Self::Authenticated {
                        profile,
                        confirmed: true,
                        route,
                    },
                    actions,
                )
            }

            // Explicit sign-in, or the provider reporting a different identity
            (_, Event::ProfileLoaded { profile } | Event::SignedIn { profile }) => {
                let route = Route::for_role(&profile.role);
                signed_in(profile, route)
            }

            // Fresh registrations always land on the shared home
            (_, Event::Registered { profile }) => signed_in(profile, Route::SharedHome),

            // Orphaned identity: never recoverable
            (_, Event::ProfileMissing) => (
                Self::Anonymous,
                vec![
                    Action::ForceSignOut,
                    Action::ClearSnapshot,
                    Action::Navigate(Route::SignIn),
                ],
            ),

            // Already signed out: nothing to undo
            (Self::Anonymous, Event::LookupFailed { .. } | Event::SignedOut) => {
                (Self::Anonymous, vec![])
            }
            (_, Event::LookupFailed { .. } | Event::SignedOut) => (
                Self::Anonymous,
                vec![Action::ClearSnapshot, Action::Navigate(Route::SignIn)],
            ),

            // Local merge after a successful remote update
            (
                Self::Authenticated {
                    profile,
                    confirmed,
                    route,
                },
                Event::ProfileUpdated { patch },
            ) => {
                let profile = profile.merged(&patch);
                (
                    Self::Authenticated {
                        profile: profile.clone(),
                        confirmed,
                        route,
                    },
                    vec![Action::WriteSnapshot { profile }],
                )
            }
            (state, Event::ProfileUpdated { .. }) => (state, vec![]),
        }
    }

    /// Check if a user is signed in (confirmed or not).
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated { .. })
    }

    /// Check if the provider (or the cache) has produced a verdict yet.
    pub fn is_resolved(&self) -> bool {
        !matches!(self, Self::Unresolved)
    }

    /// The signed-in profile, if any.
    pub fn profile(&self) -> Option<&ProfileRecord> {
        match self {
            Self::Authenticated { profile, .. } => Some(profile),
            _ => None,
        }
    }

    /// The identity the session is confirmed for.
    ///
    /// None for optimistic (cache-only) sessions.
    pub fn confirmed_identity(&self) -> Option<&IdentityId> {
        match self {
            Self::Authenticated {
                profile,
                confirmed: true,
                ..
            } => Some(&profile.id),
            _ => None,
        }
    }

    /// The route last dispatched for this state, or None while unresolved.
    pub fn route(&self) -> Option<Route> {
        match self {
            Self::Unresolved => None,
            Self::Authenticated { route, .. } => Some(*route),
            Self::Anonymous => Some(Route::SignIn),
        }
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

/// Confirmed session for `profile`: cache it and navigate to `route`.
fn signed_in(profile: ProfileRecord, route: Route) -> (SessionState, Vec<Action>) {
    let actions = vec![
        Action::WriteSnapshot {
            profile: profile.clone(),
        },
        Action::Navigate(route),
    ];
    (
        SessionState::Authenticated {
            profile,
            confirmed: true,
            route,
        },
        actions,
    )
}

/// Events that drive the session lifecycle.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// A snapshot was found in the local cache at process start.
    SnapshotRestored {
        /// The cached profile.
        profile: ProfileRecord,
    },
    /// The profile for a provider-reported identity was fetched from the
    /// store.
    ProfileLoaded {
        /// The fetched profile.
        profile: ProfileRecord,
    },
    /// An explicit sign-in succeeded and its profile was fetched.
    SignedIn {
        /// The fetched profile.
        profile: ProfileRecord,
    },
    /// A new account and its profile were created.
    Registered {
        /// The created profile.
        profile: ProfileRecord,
    },
    /// The provider authenticated an identity that has no profile record.
    ProfileMissing,
    /// The profile lookup for a provider-reported identity failed.
    LookupFailed {
        /// Error message describing the failure.
        error: String,
    },
    /// The provider reports no signed-in identity, or the user logged out.
    SignedOut,
    /// The remote profile was updated with `patch`.
    ProfileUpdated {
        /// Fields written to the store.
        patch: ProfilePatch,
    },
}

/// Actions to be executed by session-client.
///
/// These are instructions, not side effects.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Persist `profile` as the cached snapshot.
    WriteSnapshot {
        /// Profile to cache.
        profile: ProfileRecord,
    },
    /// Remove the cached snapshot.
    ClearSnapshot,
    /// Sign out at the identity provider.
    ForceSignOut,
    /// Ask the navigation dispatcher to show a route.
    Navigate(Route),
}
