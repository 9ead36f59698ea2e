//! Mock profile store for testing.

use super::{ProfileStore, StoreError};
use async_trait::async_trait;
use campus_session_types::{IdentityId, ProfilePatch, ProfileRecord};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Mock profile store for testing.
///
/// Failures are queued per operation, so a test can make the first two
/// lookups fail and the third succeed.
#[derive(Debug, Clone, Default)]
pub struct MockProfileStore {
    inner: Arc<Mutex<MockStoreInner>>,
}

#[derive(Debug, Default)]
struct MockStoreInner {
    records: HashMap<IdentityId, ProfileRecord>,
    fail_get: VecDeque<StoreError>,
    fail_create: VecDeque<StoreError>,
    fail_update: VecDeque<StoreError>,
    get_calls: usize,
    create_calls: usize,
    update_calls: usize,
    delay: Duration,
}

impl MockProfileStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn inner(&self) -> MutexGuard<'_, MockStoreInner> {
        self.inner.lock().expect("mock store lock poisoned")
    }

    /// Seed a record directly.
    pub fn insert(&self, record: ProfileRecord) {
        self.inner().records.insert(record.id.clone(), record);
    }

    /// Remove a record directly (simulates an orphaned identity).
    pub fn remove(&self, id: &IdentityId) {
        self.inner().records.remove(id);
    }

    /// The stored record for `id`.
    pub fn record(&self, id: &IdentityId) -> Option<ProfileRecord> {
        self.inner().records.get(id).cloned()
    }

    /// Queue a failure for the next get().
    pub fn fail_next_get(&self, error: StoreError) {
        self.inner().fail_get.push_back(error);
    }

    /// Queue a failure for the next create().
    pub fn fail_next_create(&self, error: StoreError) {
        self.inner().fail_create.push_back(error);
    }

    /// Queue a failure for the next update().
    pub fn fail_next_update(&self, error: StoreError) {
        self.inner().fail_update.push_back(error);
    }

    /// Number of get() calls received.
    pub fn get_calls(&self) -> usize {
        self.inner().get_calls
    }

    /// Number of create() calls received.
    pub fn create_calls(&self) -> usize {
        self.inner().create_calls
    }

    /// Number of update() calls received.
    pub fn update_calls(&self) -> usize {
        self.inner().update_calls
    }

    /// Delay every call by `delay`.
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

#[async_trait]
impl ProfileStore for MockProfileStore {
    async fn get(&self, id: &IdentityId) -> Result<Option<ProfileRecord>, StoreError> {
        self.simulate_latency().await;

        let mut inner = self.inner();
        inner.get_calls += 1;
        if let Some(error) = inner.fail_get.pop_front() {
            return Err(error);
        }
        Ok(inner.records.get(id).cloned())
    }

    async fn create(&self, record: &ProfileRecord) -> Result<(), StoreError> {
        self.simulate_latency().await;

        let mut inner = self.inner();
        inner.create_calls += 1;
        if let Some(error) = inner.fail_create.pop_front() {
            return Err(error);
        }
        inner.records.insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn update(&self, id: &IdentityId, patch: &ProfilePatch) -> Result<(), StoreError> {
        self.simulate_latency().await;

        let mut inner = self.inner();
        inner.update_calls += 1;
        if let Some(error) = inner.fail_update.pop_front() {
            return Err(error);
        }
        let record = inner.records.get_mut(id).ok_or(StoreError::NotFound)?;
        record.apply(patch);
        Ok(())
    }
}
