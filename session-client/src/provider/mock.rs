//! Mock identity provider for testing.
//!
//! Keeps accounts in memory, allows queueing failures and simulating
//! provider-side status changes (expired or revoked logins).

use super::{IdentityProvider, IdentityStatus, ProviderError};
use async_trait::async_trait;
use campus_session_types::IdentityId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;

/// Mock identity provider for testing.
///
/// Clones share state, so a test can keep one handle while the synchronizer
/// owns another.
#[derive(Debug, Clone)]
pub struct MockIdentityProvider {
    inner: Arc<Mutex<MockProviderInner>>,
    status: Arc<watch::Sender<IdentityStatus>>,
}

#[derive(Debug, Default)]
struct MockProviderInner {
    accounts: HashMap<String, MockAccount>,
    fail_next_authenticate: Option<ProviderError>,
    fail_next_register: Option<ProviderError>,
    fail_next_sign_out: Option<ProviderError>,
    sign_out_calls: usize,
    delay: Duration,
}

#[derive(Debug)]
struct MockAccount {
    secret: String,
    id: IdentityId,
}

impl MockIdentityProvider {
    /// Create a mock provider that has not reported a status yet.
    pub fn new() -> Self {
        let (status, _) = watch::channel(IdentityStatus::Pending);
        Self {
            inner: Arc::new(Mutex::new(MockProviderInner::default())),
            status: Arc::new(status),
        }
    }

    fn inner(&self) -> MutexGuard<'_, MockProviderInner> {
        self.inner.lock().expect("mock provider lock poisoned")
    }

    /// Register an account without signing in. Returns its identity id.
    pub fn add_account(&self, identifier: &str, secret: &str) -> IdentityId {
        self.add_account_with_id(identifier, secret, IdentityId::random())
    }

    /// Register an account with a fixed identity id, without signing in.
    pub fn add_account_with_id(&self, identifier: &str, secret: &str, id: IdentityId) -> IdentityId {
        self.inner().accounts.insert(
            identifier.to_string(),
            MockAccount {
                secret: secret.to_string(),
                id: id.clone(),
            },
        );
        id
    }

    /// Push a status onto the change stream, as the real provider would.
    pub fn report(&self, status: IdentityStatus) {
        self.status.send_replace(status);
    }

    /// The status most recently reported.
    pub fn status(&self) -> IdentityStatus {
        self.status.borrow().clone()
    }

    /// Number of `sign_out()` calls received.
    pub fn sign_out_calls(&self) -> usize {
        self.inner().sign_out_calls
    }

    /// Cause the next authenticate() to fail with the given error.
    pub fn fail_next_authenticate(&self, error: ProviderError) {
        self.inner().fail_next_authenticate = Some(error);
    }

    /// Cause the next register() to fail with the given error.
    pub fn fail_next_register(&self, error: ProviderError) {
        self.inner().fail_next_register = Some(error);
    }

    /// Cause the next sign_out() to fail with the given error.
    pub fn fail_next_sign_out(&self, error: ProviderError) {
        self.inner().fail_next_sign_out = Some(error);
    }

    /// Delay every call by `delay` (for timeout tests).
    pub fn set_delay(&self, delay: Duration) {
        self.inner().delay = delay;
    }

    async fn simulate_latency(&self) {
        let delay = self.inner().delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

impl Default for MockIdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdentityProvider for MockIdentityProvider {
    async fn authenticate(
        &self,
        identifier: &str,
        secret: &str,
    ) -> Result<IdentityId, ProviderError> {
        self.simulate_latency().await;

        let id = {
            let mut inner = self.inner();

            // Check for forced failure
            if let Some(error) = inner.fail_next_authenticate.take() {
                return Err(error);
            }

            let account = inner
                .accounts
                .get(identifier)
                .ok_or(ProviderError::UserNotFound)?;
            if account.secret != secret {
                return Err(ProviderError::WrongPassword);
            }
            account.id.clone()
        };

        self.report(IdentityStatus::SignedIn(id.clone()));
        Ok(id)
    }

    async fn register(&self, identifier: &str, secret: &str) -> Result<IdentityId, ProviderError> {
        self.simulate_latency().await;

        let id = {
            let mut inner = self.inner();

            if let Some(error) = inner.fail_next_register.take() {
                return Err(error);
            }

            if inner.accounts.contains_key(identifier) {
                return Err(ProviderError::EmailAlreadyInUse);
            }

            let id = IdentityId::random();
            inner.accounts.insert(
                identifier.to_string(),
                MockAccount {
                    secret: secret.to_string(),
                    id: id.clone(),
                },
            );
            id
        };

        self.report(IdentityStatus::SignedIn(id.clone()));
        Ok(id)
    }

    async fn sign_out(&self) -> Result<(), ProviderError> {
        self.simulate_latency().await;

        {
            let mut inner = self.inner();
            inner.sign_out_calls += 1;
            if let Some(error) = inner.fail_next_sign_out.take() {
                return Err(error);
            }
        }

        self.report(IdentityStatus::SignedOut);
        Ok(())
    }

    fn subscribe(&self) -> watch::Receiver<IdentityStatus> {
        self.status.subscribe()
    }
}
