//! SessionSynchronizer - the single writer of session state.
//!
//! This module provides [`SessionSynchronizer`], which reconciles the identity
//! provider, the profile store and the local snapshot cache, and emits
//! navigation intents as the session changes.
//!
//! # Architecture
//!
//! The synchronizer uses the pure state machine from session-core and
//! interprets its actions against the collaborator traits.
//!
//! ```text
//! UI ──► SessionSynchronizer ──► IdentityProvider / ProfileStore / LocalCache
//!              ▲      │
//!   provider   │      ▼
//!   status ────┘   session-core (pure state machine) ──► Navigator
//! ```
//!
//! Every transition, whether triggered by a provider report or by a mutation,
//! runs under one async mutex held for the whole operation. Provider reports
//! are consumed by a background listener task through a `watch` channel, and
//! the listener always acts on the provider's *latest* status, read under the
//! lock.
//!
//! # Example
//!
//! ```ignore
//! let sync = SessionSynchronizer::start(provider, store, cache, navigator,
//!     SessionConfig::default()).await;
//! sync.settled().await;
//!
//! let profile = sync.sign_in("a@b.com", "secret1").await?;
//! sync.update_profile(ProfilePatch::new().with_phone("555")).await?;
//! sync.log_out().await?;
//! ```

use std::future::Future;
use std::sync::Arc;

use campus_session_core::{snapshot, Action, Event, SessionState};
use campus_session_types::{IdentityId, ProfilePatch, ProfileRecord, Role, SessionError};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

use crate::cache::LocalCache;
use crate::config::SessionConfig;
use crate::navigator::Navigator;
use crate::provider::{IdentityProvider, IdentityStatus};
use crate::store::ProfileStore;

/// The session synchronizer.
///
/// Owns the collaborators and the in-memory session state. Dropping it stops
/// the provider listener.
pub struct SessionSynchronizer<P, S, C, N> {
    inner: Arc<Inner<P, S, C, N>>,
    listener: Option<JoinHandle<()>>,
}

struct Inner<P, S, C, N> {
    provider: P,
    store: S,
    cache: C,
    navigator: N,
    config: SessionConfig,
    state: Mutex<SessionState>,
    provider_status: watch::Receiver<IdentityStatus>,
    observers: watch::Sender<SessionState>,
    reconciled: watch::Sender<u64>,
}

impl<P, S, C, N> SessionSynchronizer<P, S, C, N>
where
    P: IdentityProvider + 'static,
    S: ProfileStore + 'static,
    C: LocalCache + 'static,
    N: Navigator + 'static,
{
    /// Build the synchronizer and start listening to the provider.
    ///
    /// A cached snapshot, if present, is restored before the listener is
    /// spawned, so the optimistic state is always applied before the first
    /// provider report. Must be called from within a tokio runtime.
    pub async fn start(provider: P, store: S, cache: C, navigator: N, config: SessionConfig) -> Self {
        let provider_status = provider.subscribe();
        let (observers, _) = watch::channel(SessionState::new());
        let (reconciled, _) = watch::channel(0u64);

        let inner = Arc::new(Inner {
            provider,
            store,
            cache,
            navigator,
            config,
            state: Mutex::new(SessionState::new()),
            provider_status: provider_status.clone(),
            observers,
            reconciled,
        });

        inner.restore_snapshot().await;

        let listener = tokio::spawn(listen(inner.clone(), provider_status));

        Self {
            inner,
            listener: Some(listener),
        }
    }

    /// Sign in with an identifier and secret.
    ///
    /// On success the session is Authenticated with the stored profile. When
    /// the identity has no profile the session is forced out and
    /// [`SessionError::ProfileMissing`] is returned.
    pub async fn sign_in(&self, identifier: &str, secret: &str) -> Result<ProfileRecord, SessionError> {
        let inner = &self.inner;
        let mut state = inner.state.lock().await;

        let id = inner
            .remote("authenticate", inner.provider.authenticate(identifier, secret))
            .await?;
        tracing::debug!("Provider accepted credentials for {}", id);

        match inner.remote("profile lookup", inner.store.get(&id)).await {
            Ok(Some(profile)) => {
                tracing::info!("Signed in as {} ({})", profile.id, profile.role);
                inner
                    .apply(&mut state, Event::SignedIn {
                        profile: profile.clone(),
                    })
                    .await;
                Ok(profile)
            }
            Ok(None) | Err(SessionError::ProfileMissing) => {
                tracing::warn!("Identity {} has no profile, forcing sign-out", id);
                inner.apply(&mut state, Event::ProfileMissing).await;
                Err(SessionError::ProfileMissing)
            }
            Err(e) => {
                tracing::warn!("Profile lookup for {} failed: {}, rolling back sign-in", id, e);
                inner.force_sign_out().await;
                Err(e)
            }
        }
    }

    /// Register a new account and create its profile.
    ///
    /// Fresh accounts always land on the shared home route. If the profile
    /// cannot be created the error is returned and the orphaned identity is
    /// signed out by the next provider reconciliation.
    pub async fn sign_up(
        &self,
        identifier: &str,
        secret: &str,
        display_name: &str,
        role: Role,
    ) -> Result<ProfileRecord, SessionError> {
        if role.is_administrative() {
            tracing::warn!("Sign-up is self-assigning the {} role", role);
        }

        let inner = &self.inner;
        let mut state = inner.state.lock().await;

        let id = inner
            .remote("register", inner.provider.register(identifier, secret))
            .await?;

        let profile = ProfileRecord::new(id, identifier, display_name, role);
        if let Err(e) = inner
            .remote("profile create", inner.store.create(&profile))
            .await
        {
            tracing::warn!(
                "Profile creation for new identity {} failed: {}",
                profile.id,
                e
            );
            return Err(e);
        }

        tracing::info!("Registered {} ({})", profile.id, profile.role);
        inner
            .apply(&mut state, Event::Registered {
                profile: profile.clone(),
            })
            .await;
        Ok(profile)
    }

    /// Sign out. Succeeds without a remote call when nobody is signed in.
    ///
    /// If the provider refuses the sign-out the session is left unchanged.
    pub async fn log_out(&self) -> Result<(), SessionError> {
        let inner = &self.inner;
        let mut state = inner.state.lock().await;

        if matches!(*state, SessionState::Anonymous) {
            tracing::debug!("Log-out while anonymous, nothing to do");
            return Ok(());
        }

        inner.remote("sign-out", inner.provider.sign_out()).await?;
        tracing::info!("Signed out");
        inner.apply(&mut state, Event::SignedOut).await;
        Ok(())
    }

    /// Write `patch` to the signed-in user's profile.
    ///
    /// The store is updated first; the in-memory profile and the cached
    /// snapshot follow only on success. An empty patch succeeds without a
    /// remote call.
    pub async fn update_profile(&self, patch: ProfilePatch) -> Result<ProfileRecord, SessionError> {
        let inner = &self.inner;
        let mut state = inner.state.lock().await;

        let current = state.profile().cloned().ok_or(SessionError::NotAuthenticated)?;
        if patch.is_empty() {
            return Ok(current);
        }

        inner
            .remote("profile update", inner.store.update(&current.id, &patch))
            .await?;
        tracing::debug!("Profile {} updated", current.id);

        inner.apply(&mut state, Event::ProfileUpdated { patch }).await;
        state.profile().cloned().ok_or(SessionError::NotAuthenticated)
    }

    /// Current session state.
    pub fn state(&self) -> SessionState {
        self.inner.observers.borrow().clone()
    }

    /// Observe session state changes.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.observers.subscribe()
    }

    /// Wait until the first provider report has been reconciled.
    pub async fn settled(&self) {
        self.wait_reconciled(1).await;
    }

    /// Wait until at least `count` provider reports have been reconciled.
    pub async fn wait_reconciled(&self, count: u64) {
        let mut rx = self.inner.reconciled.subscribe();
        // The sender lives in `inner`, which outlives this borrow.
        let _ = rx.wait_for(|reconciled| *reconciled >= count).await;
    }

    /// Number of provider reports reconciled so far.
    pub fn reports_reconciled(&self) -> u64 {
        *self.inner.reconciled.borrow()
    }

    /// Stop the provider listener and wait for it to finish.
    pub async fn shutdown(mut self) {
        if let Some(handle) = self.listener.take() {
            handle.abort();
            let _ = handle.await;
        }
        tracing::debug!("Session synchronizer shut down");
    }

    /// The identity provider.
    pub fn provider(&self) -> &P {
        &self.inner.provider
    }

    /// The profile store.
    pub fn store(&self) -> &S {
        &self.inner.store
    }

    /// The local cache.
    pub fn cache(&self) -> &C {
        &self.inner.cache
    }

    /// The navigator.
    pub fn navigator(&self) -> &N {
        &self.inner.navigator
    }
}

impl<P, S, C, N> Drop for SessionSynchronizer<P, S, C, N> {
    fn drop(&mut self) {
        if let Some(handle) = self.listener.take() {
            handle.abort();
        }
    }
}

async fn listen<P, S, C, N>(inner: Arc<Inner<P, S, C, N>>, mut status: watch::Receiver<IdentityStatus>)
where
    P: IdentityProvider,
    S: ProfileStore,
    C: LocalCache,
    N: Navigator,
{
    loop {
        let reported = status.borrow_and_update().clone();
        if reported != IdentityStatus::Pending {
            inner.reconcile().await;
            inner.reconciled.send_modify(|count| *count += 1);
        }

        if status.changed().await.is_err() {
            tracing::debug!("Identity provider closed its status channel");
            break;
        }
    }
}

impl<P, S, C, N> Inner<P, S, C, N>
where
    P: IdentityProvider,
    S: ProfileStore,
    C: LocalCache,
    N: Navigator,
{
    async fn restore_snapshot(&self) {
        let raw = match self.cache.read_snapshot().await {
            Ok(Some(raw)) => raw,
            Ok(None) => return,
            Err(e) => {
                tracing::warn!("Failed to read session snapshot: {}", e);
                return;
            }
        };

        match snapshot::decode(&raw) {
            Ok(profile) => {
                tracing::debug!("Restoring cached session for {}", profile.id);
                let mut state = self.state.lock().await;
                self.apply(&mut state, Event::SnapshotRestored { profile })
                    .await;
            }
            Err(e) => {
                tracing::warn!("Discarding unreadable session snapshot: {}", e);
                self.clear_snapshot().await;
            }
        }
    }

    /// Reconcile the session against the provider's latest status.
    async fn reconcile(&self) {
        let mut state = self.state.lock().await;

        loop {
            let status = self.provider_status.borrow().clone();
            let id = match status {
                IdentityStatus::Pending => return,
                IdentityStatus::SignedOut => {
                    self.apply(&mut state, Event::SignedOut).await;
                    return;
                }
                IdentityStatus::SignedIn(id) => id,
            };

            if state.confirmed_identity() == Some(&id) {
                tracing::debug!("Session already confirmed for {}, skipping lookup", id);
                return;
            }

            let event = match self.lookup_with_retry(&id).await {
                Ok(Some(profile)) => Event::ProfileLoaded { profile },
                Ok(None) => {
                    tracing::warn!("Identity {} has no profile, forcing sign-out", id);
                    Event::ProfileMissing
                }
                Err(e) => {
                    tracing::warn!("Profile lookup for {} failed, signing out locally: {}", id, e);
                    Event::LookupFailed {
                        error: e.to_string(),
                    }
                }
            };

            // The provider may have moved on while the lookup was in flight
            if *self.provider_status.borrow() != IdentityStatus::SignedIn(id.clone()) {
                tracing::debug!("Provider status changed during lookup for {}, re-reading", id);
                continue;
            }

            self.apply(&mut state, event).await;
            return;
        }
    }

    async fn lookup_with_retry(&self, id: &IdentityId) -> Result<Option<ProfileRecord>, SessionError> {
        let policy = &self.config.lookup_retry;
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.remote("profile lookup", self.store.get(id)).await {
                Err(SessionError::ProfileMissing) => return Ok(None),
                Err(e) if e.is_transient() && policy.should_retry(attempt) => {
                    let delay = policy.delay_for(attempt);
                    tracing::warn!(
                        "Profile lookup attempt {} for {} failed: {}, retrying in {:?}",
                        attempt,
                        id,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                result => return result,
            }
        }
    }

    /// Run one transition and execute its actions.
    ///
    /// Side effects run first, then observers see the new state, then the
    /// navigator is told where to go.
    async fn apply(&self, state: &mut SessionState, event: Event) {
        let (next, actions) = state.clone().on_event(event);
        *state = next;

        let mut routes = Vec::new();
        for action in actions {
            match action {
                Action::WriteSnapshot { profile } => self.write_snapshot(&profile).await,
                Action::ClearSnapshot => self.clear_snapshot().await,
                Action::ForceSignOut => self.force_sign_out().await,
                Action::Navigate(route) => routes.push(route),
            }
        }

        self.observers.send_replace(state.clone());

        for route in routes {
            tracing::debug!("Navigating to {}", route);
            self.navigator.navigate_to(route);
        }
    }

    async fn write_snapshot(&self, profile: &ProfileRecord) {
        let payload = match snapshot::encode(profile) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!("Failed to encode session snapshot: {}", e);
                return;
            }
        };
        if let Err(e) = self.cache.write_snapshot(&payload).await {
            tracing::warn!("Failed to write session snapshot: {}", e);
        }
    }

    async fn clear_snapshot(&self) {
        if let Err(e) = self.cache.clear().await {
            tracing::warn!("Failed to clear session snapshot: {}", e);
        }
    }

    async fn force_sign_out(&self) {
        if let Err(e) = self.remote("forced sign-out", self.provider.sign_out()).await {
            tracing::warn!("Forced sign-out failed: {}", e);
        }
    }

    /// Await a collaborator call under the operation timeout and classify
    /// its error.
    async fn remote<T, E>(
        &self,
        what: &str,
        call: impl Future<Output = Result<T, E>>,
    ) -> Result<T, SessionError>
    where
        E: Into<SessionError> + std::fmt::Display,
    {
        match tokio::time::timeout(self.config.operation_timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                tracing::debug!("{} failed: {}", what, e);
                Err(e.into())
            }
            Err(_) => {
                tracing::warn!(
                    "{} timed out after {:?}",
                    what,
                    self.config.operation_timeout
                );
                Err(SessionError::Timeout)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::navigator::{ChannelNavigator, RecordingNavigator};
    use crate::provider::{MockIdentityProvider, ProviderError};
    use crate::store::{MockProfileStore, StoreError};
    use campus_session_core::RetryPolicy;
    use campus_session_types::Route;
    use std::time::Duration;

    type TestSync =
        SessionSynchronizer<MockIdentityProvider, MockProfileStore, MemoryCache, RecordingNavigator>;

    const WAIT: Duration = Duration::from_secs(5);

    struct Harness {
        provider: MockIdentityProvider,
        store: MockProfileStore,
        cache: MemoryCache,
        nav: RecordingNavigator,
        config: SessionConfig,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                provider: MockIdentityProvider::new(),
                store: MockProfileStore::new(),
                cache: MemoryCache::new(),
                nav: RecordingNavigator::new(),
                config: SessionConfig::default()
                    .with_operation_timeout(Duration::from_millis(200))
                    .with_lookup_retry(RetryPolicy {
                        max_attempts: 3,
                        base_delay: Duration::from_millis(1),
                        max_delay: Duration::from_millis(5),
                        jitter: Duration::ZERO,
                    }),
            }
        }

        fn with_cache(mut self, cache: MemoryCache) -> Self {
            self.cache = cache;
            self
        }

        fn with_config(mut self, config: SessionConfig) -> Self {
            self.config = config;
            self
        }

        /// Account in the provider plus its profile in the store.
        fn seed(&self, email: &str, id: &str, role: Role) -> ProfileRecord {
            let id = self
                .provider
                .add_account_with_id(email, "secret1", IdentityId::new(id));
            let profile = ProfileRecord::new(id, email, "Test User", role);
            self.store.insert(profile.clone());
            profile
        }

        async fn start(&self) -> TestSync {
            SessionSynchronizer::start(
                self.provider.clone(),
                self.store.clone(),
                self.cache.clone(),
                self.nav.clone(),
                self.config.clone(),
            )
            .await
        }

        /// Start with the provider already reporting nobody signed in.
        async fn start_anonymous(&self) -> TestSync {
            self.provider.report(IdentityStatus::SignedOut);
            let sync = self.start().await;
            wait(&sync, 1).await;
            sync
        }
    }

    async fn wait(sync: &TestSync, count: u64) {
        tokio::time::timeout(WAIT, sync.wait_reconciled(count))
            .await
            .expect("provider report was not reconciled in time");
    }

    fn cached_profile(cache: &MemoryCache) -> Option<ProfileRecord> {
        cache
            .snapshot()
            .map(|raw| snapshot::decode(&raw).expect("snapshot should decode"))
    }

    // ===========================================
    // Startup and restore
    // ===========================================

    #[tokio::test]
    async fn starts_unresolved_without_snapshot() {
        let h = Harness::new();
        let sync = h.start().await;

        assert_eq!(sync.state(), SessionState::Unresolved);
        assert!(h.nav.routes().is_empty());
        assert_eq!(sync.reports_reconciled(), 0);
    }

    #[tokio::test]
    async fn restores_snapshot_before_provider_reports() {
        let profile = ProfileRecord::new(IdentityId::new("u1"), "a@b.com", "Ann", Role::Student);
        let h = Harness::new()
            .with_cache(MemoryCache::with_snapshot(snapshot::encode(&profile).unwrap()));

        let sync = h.start().await;

        assert_eq!(
            sync.state(),
            SessionState::Authenticated {
                profile,
                confirmed: false,
                route: Route::SharedHome,
            }
        );
        assert_eq!(h.nav.routes(), vec![Route::SharedHome]);
        assert_eq!(sync.reports_reconciled(), 0);
    }

    #[tokio::test]
    async fn corrupt_snapshot_is_discarded() {
        let h = Harness::new().with_cache(MemoryCache::with_snapshot("{not json"));

        let sync = h.start().await;

        assert_eq!(sync.state(), SessionState::Unresolved);
        assert!(h.cache.snapshot().is_none());
        assert!(h.nav.routes().is_empty());
    }

    #[tokio::test]
    async fn unreadable_cache_is_not_fatal() {
        let h = Harness::new();
        h.cache.fail_next_read();

        let sync = h.start().await;

        assert_eq!(sync.state(), SessionState::Unresolved);
    }

    // ===========================================
    // Provider-driven reconciliation
    // ===========================================

    #[tokio::test]
    async fn confirmation_of_restored_profile_navigates_once() {
        let h = Harness::new();
        let profile = h.seed("a@b.com", "u1", Role::Student);
        h.cache
            .write_snapshot(&snapshot::encode(&profile).unwrap())
            .await
            .unwrap();
        let writes_before = h.cache.write_count();

        let sync = h.start().await;
        h.provider.report(IdentityStatus::SignedIn(IdentityId::new("u1")));
        wait(&sync, 1).await;

        assert_eq!(
            sync.state(),
            SessionState::Authenticated {
                profile,
                confirmed: true,
                route: Route::SharedHome,
            }
        );
        assert_eq!(h.nav.routes(), vec![Route::SharedHome]);
        assert_eq!(h.cache.write_count(), writes_before);
    }

    #[tokio::test]
    async fn provider_sign_in_loads_profile() {
        let h = Harness::new();
        let profile = h.seed("root@b.com", "a1", Role::Admin);

        let sync = h.start().await;
        h.provider.report(IdentityStatus::SignedIn(IdentityId::new("a1")));
        wait(&sync, 1).await;

        assert_eq!(sync.state().profile(), Some(&profile));
        assert_eq!(h.nav.routes(), vec![Route::AdminHome]);
        assert_eq!(cached_profile(&h.cache), Some(profile));
    }

    #[tokio::test]
    async fn provider_sign_out_clears_restored_session() {
        let profile = ProfileRecord::new(IdentityId::new("u1"), "a@b.com", "Ann", Role::Faculty);
        let h = Harness::new()
            .with_cache(MemoryCache::with_snapshot(snapshot::encode(&profile).unwrap()));

        let sync = h.start().await;
        h.provider.report(IdentityStatus::SignedOut);
        wait(&sync, 1).await;

        assert_eq!(sync.state(), SessionState::Anonymous);
        assert!(h.cache.snapshot().is_none());
        assert_eq!(h.nav.routes(), vec![Route::SharedHome, Route::SignIn]);
    }

    #[tokio::test]
    async fn orphaned_identity_is_forced_out() {
        let h = Harness::new();
        h.provider
            .add_account_with_id("x@y.z", "secret1", IdentityId::new("u1"));

        let sync = h.start().await;
        h.provider.report(IdentityStatus::SignedIn(IdentityId::new("u1")));
        wait(&sync, 1).await;

        assert_eq!(sync.state(), SessionState::Anonymous);
        assert_eq!(h.provider.sign_out_calls(), 1);
        assert_eq!(h.provider.status(), IdentityStatus::SignedOut);
        assert!(h.cache.snapshot().is_none());
        assert_eq!(h.nav.last(), Some(Route::SignIn));
    }

    #[tokio::test]
    async fn transient_lookup_failures_are_retried() {
        let h = Harness::new();
        let profile = h.seed("a@b.com", "u1", Role::Student);
        h.store.fail_next_get(StoreError::Unavailable("503".into()));
        h.store.fail_next_get(StoreError::Unavailable("503".into()));

        let sync = h.start().await;
        h.provider.report(IdentityStatus::SignedIn(IdentityId::new("u1")));
        wait(&sync, 1).await;

        assert_eq!(sync.state().profile(), Some(&profile));
        assert_eq!(h.store.get_calls(), 3);
    }

    #[tokio::test]
    async fn exhausted_lookup_fails_closed() {
        let h = Harness::new();
        h.seed("a@b.com", "u1", Role::Student);
        for _ in 0..3 {
            h.store.fail_next_get(StoreError::Unavailable("503".into()));
        }

        let sync = h.start().await;
        h.provider.report(IdentityStatus::SignedIn(IdentityId::new("u1")));
        wait(&sync, 1).await;

        assert_eq!(sync.state(), SessionState::Anonymous);
        assert_eq!(h.store.get_calls(), 3);
        // A failed lookup is not proof of an orphan
        assert_eq!(h.provider.sign_out_calls(), 0);
        assert_eq!(h.nav.routes(), vec![Route::SignIn]);
    }

    #[tokio::test]
    async fn fail_closed_policy_does_not_retry() {
        let h = Harness::new().with_config(
            SessionConfig::default()
                .with_operation_timeout(Duration::from_millis(200))
                .with_lookup_retry(RetryPolicy::fail_closed()),
        );
        h.seed("a@b.com", "u1", Role::Student);
        h.store.fail_next_get(StoreError::Unavailable("503".into()));

        let sync = h.start().await;
        h.provider.report(IdentityStatus::SignedIn(IdentityId::new("u1")));
        wait(&sync, 1).await;

        assert_eq!(sync.state(), SessionState::Anonymous);
        assert_eq!(h.store.get_calls(), 1);
    }

    #[tokio::test]
    async fn lookup_timeout_fails_closed() {
        let h = Harness::new().with_config(
            SessionConfig::default()
                .with_operation_timeout(Duration::from_millis(20))
                .with_lookup_retry(RetryPolicy::fail_closed()),
        );
        h.seed("a@b.com", "u1", Role::Student);
        h.store.set_delay(Duration::from_millis(500));

        let sync = h.start().await;
        h.provider.report(IdentityStatus::SignedIn(IdentityId::new("u1")));
        wait(&sync, 1).await;

        assert_eq!(sync.state(), SessionState::Anonymous);
        assert_eq!(h.nav.last(), Some(Route::SignIn));
    }

    #[tokio::test]
    async fn never_returns_to_unresolved() {
        let h = Harness::new();
        h.seed("a@b.com", "u1", Role::Student);
        let sync = h.start_anonymous().await;
        let mut rx = sync.subscribe();

        sync.sign_in("a@b.com", "secret1").await.unwrap();
        sync.log_out().await.unwrap();
        sync.log_out().await.unwrap();

        assert!(sync.state().is_resolved());
        assert!(rx.borrow_and_update().is_resolved());
    }

    // ===========================================
    // Sign-in
    // ===========================================

    #[tokio::test]
    async fn sign_in_with_unknown_identifier() {
        let h = Harness::new();
        let sync = h.start_anonymous().await;

        let result = sync.sign_in("nobody@x.com", "whatever").await;

        assert_eq!(result, Err(SessionError::InvalidCredentials));
        assert_eq!(sync.state(), SessionState::Anonymous);
        assert_eq!(h.nav.routes(), vec![Route::SignIn]);
    }

    #[tokio::test]
    async fn sign_in_with_wrong_secret() {
        let h = Harness::new();
        h.seed("a@b.com", "u1", Role::Student);
        let sync = h.start_anonymous().await;

        let result = sync.sign_in("a@b.com", "wrong").await;

        assert_eq!(result, Err(SessionError::InvalidCredentials));
        assert_eq!(h.store.get_calls(), 0);
    }

    #[tokio::test]
    async fn sign_in_rate_limited() {
        let h = Harness::new();
        h.seed("a@b.com", "u1", Role::Student);
        h.provider.fail_next_authenticate(ProviderError::TooManyRequests);
        let sync = h.start_anonymous().await;

        let result = sync.sign_in("a@b.com", "secret1").await;

        assert_eq!(result, Err(SessionError::RateLimited));
        assert_eq!(sync.state(), SessionState::Anonymous);
    }

    #[tokio::test]
    async fn sign_in_loads_profile_and_navigates() {
        let h = Harness::new();
        let profile = h.seed("a@b.com", "u1", Role::Student);
        let sync = h.start_anonymous().await;

        let signed_in = sync.sign_in("a@b.com", "secret1").await.unwrap();

        assert_eq!(signed_in, profile);
        assert_eq!(
            sync.state(),
            SessionState::Authenticated {
                profile: profile.clone(),
                confirmed: true,
                route: Route::SharedHome,
            }
        );
        assert_eq!(h.cache.write_count(), 1);
        assert_eq!(cached_profile(&h.cache), Some(profile));
        assert_eq!(h.nav.routes(), vec![Route::SignIn, Route::SharedHome]);
    }

    #[tokio::test]
    async fn provider_echo_after_sign_in_skips_lookup() {
        let h = Harness::new();
        h.seed("a@b.com", "u1", Role::Student);
        let sync = h.start_anonymous().await;

        sync.sign_in("a@b.com", "secret1").await.unwrap();
        wait(&sync, 2).await;

        assert_eq!(h.store.get_calls(), 1);
        assert_eq!(h.cache.write_count(), 1);
        assert_eq!(h.nav.routes(), vec![Route::SignIn, Route::SharedHome]);
    }

    #[tokio::test]
    async fn sign_in_without_profile_forces_sign_out() {
        let h = Harness::new();
        h.provider
            .add_account_with_id("a@b.com", "secret1", IdentityId::new("u1"));
        let sync = h.start_anonymous().await;

        let result = sync.sign_in("a@b.com", "secret1").await;

        assert_eq!(result, Err(SessionError::ProfileMissing));
        assert_eq!(sync.state(), SessionState::Anonymous);
        assert_eq!(h.provider.sign_out_calls(), 1);
        assert_eq!(h.provider.status(), IdentityStatus::SignedOut);
        assert!(h.cache.snapshot().is_none());
    }

    #[tokio::test]
    async fn sign_in_lookup_failure_rolls_back() {
        let h = Harness::new();
        h.seed("a@b.com", "u1", Role::Student);
        let sync = h.start_anonymous().await;
        h.store.fail_next_get(StoreError::Unavailable("503".into()));

        let result = sync.sign_in("a@b.com", "secret1").await;

        assert_eq!(result, Err(SessionError::Unavailable));
        assert_eq!(sync.state(), SessionState::Anonymous);
        assert_eq!(h.provider.status(), IdentityStatus::SignedOut);
        assert_eq!(h.provider.sign_out_calls(), 1);
        assert_eq!(h.cache.write_count(), 0);
    }

    #[tokio::test]
    async fn sign_in_times_out() {
        let h = Harness::new();
        h.seed("a@b.com", "u1", Role::Student);
        let sync = h.start_anonymous().await;
        h.provider.set_delay(Duration::from_millis(500));

        let result = sync.sign_in("a@b.com", "secret1").await;

        assert_eq!(result, Err(SessionError::Timeout));
        assert_eq!(sync.state(), SessionState::Anonymous);
    }

    #[tokio::test]
    async fn cache_write_failure_does_not_fail_sign_in() {
        let h = Harness::new();
        let profile = h.seed("a@b.com", "u1", Role::Student);
        let sync = h.start_anonymous().await;
        h.cache.fail_next_write();

        let result = sync.sign_in("a@b.com", "secret1").await;

        assert_eq!(result, Ok(profile.clone()));
        assert_eq!(sync.state().profile(), Some(&profile));
        assert!(h.cache.snapshot().is_none());
    }

    // ===========================================
    // Sign-up
    // ===========================================

    #[tokio::test]
    async fn sign_up_student_lands_on_shared_home() {
        let h = Harness::new();
        let sync = h.start_anonymous().await;

        let profile = sync
            .sign_up("s@campus.edu", "secret1", "Sam", Role::Student)
            .await
            .unwrap();

        assert_eq!(profile.email, "s@campus.edu");
        assert_eq!(profile.display_name, "Sam");
        assert_eq!(profile.role, Role::Student);
        assert_eq!(h.store.record(&profile.id), Some(profile.clone()));
        assert_eq!(sync.state().confirmed_identity(), Some(&profile.id));
        assert_eq!(cached_profile(&h.cache), Some(profile));
        assert_eq!(h.nav.last(), Some(Route::SharedHome));
    }

    #[tokio::test]
    async fn sign_up_admin_still_lands_on_shared_home() {
        let h = Harness::new();
        let sync = h.start_anonymous().await;

        let profile = sync
            .sign_up("root@campus.edu", "secret1", "Root", Role::Admin)
            .await
            .unwrap();

        assert_eq!(profile.role, Role::Admin);
        assert_eq!(h.nav.routes(), vec![Route::SignIn, Route::SharedHome]);
    }

    #[tokio::test]
    async fn admin_sign_in_after_sign_up_reaches_admin_home() {
        let h = Harness::new();
        let sync = h.start_anonymous().await;

        sync.sign_up("root@campus.edu", "secret1", "Root", Role::Admin)
            .await
            .unwrap();
        wait(&sync, 2).await;
        assert_eq!(sync.state().route(), Some(Route::SharedHome));

        sync.sign_in("root@campus.edu", "secret1").await.unwrap();

        assert_eq!(sync.state().route(), Some(Route::AdminHome));
        assert_eq!(
            h.nav.routes(),
            vec![Route::SignIn, Route::SharedHome, Route::AdminHome]
        );
    }

    #[tokio::test]
    async fn repeated_sign_in_caches_and_navigates_each_time() {
        let h = Harness::new();
        h.seed("a@b.com", "u1", Role::Student);
        let sync = h.start_anonymous().await;

        sync.sign_in("a@b.com", "secret1").await.unwrap();
        sync.sign_in("a@b.com", "secret1").await.unwrap();

        assert_eq!(h.cache.write_count(), 2);
        assert_eq!(
            h.nav.routes(),
            vec![Route::SignIn, Route::SharedHome, Route::SharedHome]
        );
    }

    #[tokio::test]
    async fn provider_switch_to_another_user_navigates() {
        let h = Harness::new();
        h.seed("a@b.com", "u1", Role::Student);
        h.seed("c@d.com", "u2", Role::Faculty);
        let sync = h.start_anonymous().await;
        sync.sign_in("a@b.com", "secret1").await.unwrap();
        wait(&sync, 2).await;

        h.provider.report(IdentityStatus::SignedIn(IdentityId::new("u2")));
        wait(&sync, 3).await;

        assert_eq!(
            sync.state().profile().map(|p| p.id.as_str()),
            Some("u2")
        );
        assert_eq!(
            h.nav.routes(),
            vec![Route::SignIn, Route::SharedHome, Route::SharedHome]
        );
    }

    #[tokio::test]
    async fn sign_up_existing_account() {
        let h = Harness::new();
        h.seed("a@b.com", "u1", Role::Student);
        let sync = h.start_anonymous().await;

        let result = sync.sign_up("a@b.com", "secret2", "Dup", Role::Student).await;

        assert_eq!(result, Err(SessionError::AccountAlreadyExists));
        assert_eq!(h.store.create_calls(), 0);
        assert_eq!(sync.state(), SessionState::Anonymous);
    }

    #[tokio::test]
    async fn sign_up_profile_failure_heals_orphan() {
        let h = Harness::new();
        let sync = h.start_anonymous().await;
        h.store.fail_next_create(StoreError::Unavailable("503".into()));

        let result = sync
            .sign_up("s@campus.edu", "secret1", "Sam", Role::Student)
            .await;

        assert_eq!(result, Err(SessionError::Unavailable));
        assert!(!sync.state().is_authenticated());

        // The provider still reports the new identity; its missing profile
        // forces it out
        wait(&sync, 2).await;
        assert_eq!(sync.state(), SessionState::Anonymous);
        assert_eq!(h.provider.sign_out_calls(), 1);
        assert_eq!(h.provider.status(), IdentityStatus::SignedOut);
    }

    // ===========================================
    // Log-out
    // ===========================================

    #[tokio::test]
    async fn log_out_clears_session() {
        let h = Harness::new();
        h.seed("a@b.com", "u1", Role::Student);
        let sync = h.start_anonymous().await;
        sync.sign_in("a@b.com", "secret1").await.unwrap();

        sync.log_out().await.unwrap();

        assert_eq!(sync.state(), SessionState::Anonymous);
        assert!(h.cache.snapshot().is_none());
        assert_eq!(h.provider.status(), IdentityStatus::SignedOut);
        assert_eq!(
            h.nav.routes(),
            vec![Route::SignIn, Route::SharedHome, Route::SignIn]
        );
    }

    #[tokio::test]
    async fn log_out_is_idempotent() {
        let h = Harness::new();
        h.seed("a@b.com", "u1", Role::Student);
        let sync = h.start_anonymous().await;
        sync.sign_in("a@b.com", "secret1").await.unwrap();

        sync.log_out().await.unwrap();
        sync.log_out().await.unwrap();

        assert_eq!(h.provider.sign_out_calls(), 1);
        assert_eq!(sync.state(), SessionState::Anonymous);
        assert_eq!(h.nav.routes().len(), 3);
    }

    #[tokio::test]
    async fn log_out_failure_keeps_session() {
        let h = Harness::new();
        let profile = h.seed("a@b.com", "u1", Role::Student);
        let sync = h.start_anonymous().await;
        sync.sign_in("a@b.com", "secret1").await.unwrap();
        h.provider
            .fail_next_sign_out(ProviderError::Network("offline".into()));

        let result = sync.log_out().await;

        assert_eq!(result, Err(SessionError::Unavailable));
        assert_eq!(sync.state().profile(), Some(&profile));
        assert_eq!(cached_profile(&h.cache), Some(profile));
    }

    #[tokio::test]
    async fn stale_sign_in_report_does_not_resurrect_session() {
        let h = Harness::new();
        h.seed("a@b.com", "u1", Role::Student);
        let sync = h.start_anonymous().await;

        sync.sign_in("a@b.com", "secret1").await.unwrap();
        sync.log_out().await.unwrap();
        wait(&sync, 2).await;
        tokio::task::yield_now().await;

        assert_eq!(sync.state(), SessionState::Anonymous);
        assert_eq!(h.store.get_calls(), 1);
        assert!(h.cache.snapshot().is_none());
    }

    // ===========================================
    // Profile update
    // ===========================================

    #[tokio::test]
    async fn update_profile_round_trip() {
        let h = Harness::new();
        h.seed("a@b.com", "u1", Role::Student);
        let sync = h.start_anonymous().await;
        sync.sign_in("a@b.com", "secret1").await.unwrap();
        let routes_before = h.nav.routes();

        let updated = sync
            .update_profile(ProfilePatch::new().with_phone("555-0100"))
            .await
            .unwrap();

        assert_eq!(updated.phone.as_deref(), Some("555-0100"));
        assert_eq!(sync.state().profile(), Some(&updated));
        assert_eq!(cached_profile(&h.cache), Some(updated.clone()));
        assert_eq!(h.store.record(&updated.id), Some(updated));
        assert_eq!(h.nav.routes(), routes_before);
    }

    #[tokio::test]
    async fn update_requires_authentication() {
        let h = Harness::new();
        let sync = h.start().await;

        let patch = ProfilePatch::new().with_display_name("X");
        assert_eq!(
            sync.update_profile(patch.clone()).await,
            Err(SessionError::NotAuthenticated)
        );

        h.provider.report(IdentityStatus::SignedOut);
        wait(&sync, 1).await;
        assert_eq!(
            sync.update_profile(patch).await,
            Err(SessionError::NotAuthenticated)
        );
        assert_eq!(h.store.update_calls(), 0);
    }

    #[tokio::test]
    async fn empty_patch_makes_no_remote_call() {
        let h = Harness::new();
        let profile = h.seed("a@b.com", "u1", Role::Student);
        let sync = h.start_anonymous().await;
        sync.sign_in("a@b.com", "secret1").await.unwrap();

        let result = sync.update_profile(ProfilePatch::new()).await;

        assert_eq!(result, Ok(profile));
        assert_eq!(h.store.update_calls(), 0);
        assert_eq!(h.cache.write_count(), 1);
    }

    #[tokio::test]
    async fn failed_update_leaves_profile_unchanged() {
        let h = Harness::new();
        let profile = h.seed("a@b.com", "u1", Role::Student);
        let sync = h.start_anonymous().await;
        sync.sign_in("a@b.com", "secret1").await.unwrap();
        h.store.fail_next_update(StoreError::Unavailable("503".into()));

        let result = sync
            .update_profile(ProfilePatch::new().with_display_name("New"))
            .await;

        assert_eq!(result, Err(SessionError::Unavailable));
        assert_eq!(sync.state().profile(), Some(&profile));
        assert_eq!(cached_profile(&h.cache), Some(profile));
    }

    #[tokio::test]
    async fn update_of_missing_record_reports_profile_missing() {
        let h = Harness::new();
        h.seed("a@b.com", "u1", Role::Student);
        let sync = h.start_anonymous().await;
        sync.sign_in("a@b.com", "secret1").await.unwrap();
        h.store.remove(&IdentityId::new("u1"));

        let result = sync
            .update_profile(ProfilePatch::new().with_display_name("New"))
            .await;

        assert_eq!(result, Err(SessionError::ProfileMissing));
    }

    // ===========================================
    // Observers and lifecycle
    // ===========================================

    #[tokio::test]
    async fn observers_see_transitions() {
        let h = Harness::new();
        h.seed("a@b.com", "u1", Role::Student);
        let sync = h.start_anonymous().await;
        let mut rx = sync.subscribe();
        rx.borrow_and_update();

        sync.sign_in("a@b.com", "secret1").await.unwrap();

        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().is_authenticated());
    }

    #[tokio::test]
    async fn concurrent_mutations_are_serialized() {
        let h = Harness::new();
        h.seed("a@b.com", "u1", Role::Student);
        h.seed("c@d.com", "u2", Role::Faculty);
        let sync = h.start_anonymous().await;

        let (a, b) = tokio::join!(
            sync.sign_in("a@b.com", "secret1"),
            sync.sign_in("c@d.com", "secret1")
        );

        assert!(a.is_ok());
        assert!(b.is_ok());
        assert!(sync.state().is_authenticated());
        assert_eq!(h.cache.write_count(), 2);
        assert_eq!(cached_profile(&h.cache).as_ref(), sync.state().profile());
    }

    #[tokio::test]
    async fn channel_navigator_receives_intents() {
        let provider = MockIdentityProvider::new();
        let store = MockProfileStore::new();
        let id = provider.add_account("a@b.com", "secret1");
        store.insert(ProfileRecord::new(id, "a@b.com", "Ann", Role::Admin));
        provider.report(IdentityStatus::SignedOut);
        let (nav, mut routes) = ChannelNavigator::new();

        let sync = SessionSynchronizer::start(
            provider,
            store,
            MemoryCache::new(),
            nav,
            SessionConfig::default(),
        )
        .await;
        tokio::time::timeout(WAIT, sync.settled()).await.unwrap();
        sync.sign_in("a@b.com", "secret1").await.unwrap();

        assert_eq!(routes.recv().await, Some(Route::SignIn));
        assert_eq!(routes.recv().await, Some(Route::AdminHome));
    }

    #[tokio::test]
    async fn shutdown_stops_listening() {
        let h = Harness::new();
        h.seed("a@b.com", "u1", Role::Student);
        let sync = h.start_anonymous().await;

        sync.shutdown().await;
        h.provider.report(IdentityStatus::SignedIn(IdentityId::new("u1")));
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(h.store.get_calls(), 0);
        assert_eq!(h.nav.routes(), vec![Route::SignIn]);
    }
}
