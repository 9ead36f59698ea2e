//! Directory-backed development backend.
//!
//! Stands in for the hosted identity provider and profile store so the CLI
//! can drive the real synchronizer across process restarts. Everything lives
//! as JSON files in the data directory:
//!
//! - `accounts.json`: identifier → identity id and Argon2 password hash
//! - `profiles.json`: identity id → profile record
//! - `provider_session.json`: the persisted login, like a hosted SDK keeps
//!
//! Passwords are never stored; only PHC-format Argon2id hashes are.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use async_trait::async_trait;
use campus_session_client::{
    IdentityProvider, IdentityStatus, ProfileStore, ProviderError, StoreError,
};
use campus_session_types::{IdentityId, ProfilePatch, ProfileRecord};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{watch, Mutex};
use zeroize::Zeroizing;

const ACCOUNTS_FILE: &str = "accounts.json";
const PROFILES_FILE: &str = "profiles.json";
const SESSION_FILE: &str = "provider_session.json";

/// Minimum secret length accepted at registration.
pub const MIN_SECRET_LEN: usize = 6;

/// Argon2id cost for stored hashes: 12 MiB, 2 passes, 1 lane.
const HASH_MEMORY_KIB: u32 = 12 * 1024;
const HASH_ITERATIONS: u32 = 2;
const HASH_PARALLELISM: u32 = 1;

/// Errors from the backend's own files.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Filesystem failure.
    #[error("backend I/O error on {path}: {source}")]
    Io {
        /// File being accessed.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A backend file is not valid JSON.
    #[error("corrupt backend file {path}: {source}")]
    Corrupt {
        /// File being parsed.
        path: PathBuf,
        /// Underlying JSON error.
        source: serde_json::Error,
    },

    /// Password hashing failed.
    #[error("password hashing failed: {0}")]
    Hash(String),
}

impl From<BackendError> for ProviderError {
    fn from(err: BackendError) -> Self {
        ProviderError::Other {
            code: "auth/internal-error".into(),
            message: err.to_string(),
        }
    }
}

impl From<BackendError> for StoreError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Corrupt { .. } => StoreError::Serialization(err.to_string()),
            other => StoreError::Unavailable(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountEntry {
    id: IdentityId,
    password_hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedLogin {
    id: IdentityId,
}

/// Identity provider and profile store backed by a directory.
///
/// Clones share the status channel and the file lock, so one clone can be
/// handed to the synchronizer as the provider and another as the store.
#[derive(Debug, Clone)]
pub struct DirectoryBackend {
    dir: PathBuf,
    status: Arc<watch::Sender<IdentityStatus>>,
    files: Arc<Mutex<()>>,
}

impl DirectoryBackend {
    /// Open the backend in `dir`, reporting the persisted login if any.
    pub async fn open(dir: &Path) -> Result<Self, BackendError> {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|source| BackendError::Io {
                path: dir.to_path_buf(),
                source,
            })?;

        let login: Option<PersistedLogin> = read_json(&dir.join(SESSION_FILE)).await?;
        let initial = match login {
            Some(login) => IdentityStatus::SignedIn(login.id),
            None => IdentityStatus::SignedOut,
        };
        tracing::debug!("Development backend opened in {}: {:?}", dir.display(), initial);

        let (status, _) = watch::channel(initial);
        Ok(Self {
            dir: dir.to_path_buf(),
            status: Arc::new(status),
            files: Arc::new(Mutex::new(())),
        })
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    async fn accounts(&self) -> Result<BTreeMap<String, AccountEntry>, BackendError> {
        Ok(read_json(&self.path(ACCOUNTS_FILE)).await?.unwrap_or_default())
    }

    async fn profiles(&self) -> Result<BTreeMap<IdentityId, ProfileRecord>, BackendError> {
        Ok(read_json(&self.path(PROFILES_FILE)).await?.unwrap_or_default())
    }

    async fn persist_login(&self, id: &IdentityId) -> Result<(), BackendError> {
        write_json(&self.path(SESSION_FILE), &PersistedLogin { id: id.clone() }).await
    }
}

#[async_trait]
impl IdentityProvider for DirectoryBackend {
    async fn authenticate(
        &self,
        identifier: &str,
        secret: &str,
    ) -> Result<IdentityId, ProviderError> {
        let account = {
            let _files = self.files.lock().await;
            self.accounts()
                .await?
                .remove(&normalize(identifier))
                .ok_or(ProviderError::UserNotFound)?
        };

        // Verified without the file lock so other calls are not held up
        if !verify_secret_off_thread(account.password_hash, secret).await? {
            return Err(ProviderError::WrongPassword);
        }

        let _files = self.files.lock().await;
        self.persist_login(&account.id).await?;
        self.status
            .send_replace(IdentityStatus::SignedIn(account.id.clone()));
        Ok(account.id)
    }

    async fn register(&self, identifier: &str, secret: &str) -> Result<IdentityId, ProviderError> {
        let identifier = normalize(identifier);
        if !looks_like_email(&identifier) {
            return Err(ProviderError::InvalidEmail);
        }
        if secret.chars().count() < MIN_SECRET_LEN {
            return Err(ProviderError::WeakPassword);
        }

        let password_hash = hash_secret_off_thread(secret).await?;

        let _files = self.files.lock().await;

        let mut accounts = self.accounts().await?;
        if accounts.contains_key(&identifier) {
            return Err(ProviderError::EmailAlreadyInUse);
        }

        let id = IdentityId::random();
        accounts.insert(
            identifier,
            AccountEntry {
                id: id.clone(),
                password_hash,
            },
        );
        write_json(&self.path(ACCOUNTS_FILE), &accounts).await?;

        self.persist_login(&id).await?;
        self.status.send_replace(IdentityStatus::SignedIn(id.clone()));
        Ok(id)
    }

    async fn sign_out(&self) -> Result<(), ProviderError> {
        let _files = self.files.lock().await;

        let path = self.path(SESSION_FILE);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(source) => return Err(BackendError::Io { path, source }.into()),
        }

        self.status.send_replace(IdentityStatus::SignedOut);
        Ok(())
    }

    fn subscribe(&self) -> watch::Receiver<IdentityStatus> {
        self.status.subscribe()
    }
}

#[async_trait]
impl ProfileStore for DirectoryBackend {
    async fn get(&self, id: &IdentityId) -> Result<Option<ProfileRecord>, StoreError> {
        let _files = self.files.lock().await;
        Ok(self.profiles().await?.remove(id))
    }

    async fn create(&self, record: &ProfileRecord) -> Result<(), StoreError> {
        let _files = self.files.lock().await;

        let mut profiles = self.profiles().await?;
        profiles.insert(record.id.clone(), record.clone());
        write_json(&self.path(PROFILES_FILE), &profiles).await?;
        Ok(())
    }

    async fn update(&self, id: &IdentityId, patch: &ProfilePatch) -> Result<(), StoreError> {
        let _files = self.files.lock().await;

        let mut profiles = self.profiles().await?;
        let record = profiles.get_mut(id).ok_or(StoreError::NotFound)?;
        record.apply(patch);
        write_json(&self.path(PROFILES_FILE), &profiles).await?;
        Ok(())
    }
}

fn normalize(identifier: &str) -> String {
    identifier.trim().to_lowercase()
}

fn looks_like_email(identifier: &str) -> bool {
    match identifier.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.contains('@'),
        None => false,
    }
}

fn hash_secret(secret: &str) -> Result<String, BackendError> {
    let mut salt_bytes = [0u8; 16];
    getrandom::getrandom(&mut salt_bytes).map_err(|e| BackendError::Hash(e.to_string()))?;
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| BackendError::Hash(e.to_string()))?;
    let params = Params::new(HASH_MEMORY_KIB, HASH_ITERATIONS, HASH_PARALLELISM, None)
        .map_err(|e| BackendError::Hash(e.to_string()))?;
    let hash = Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
        .hash_password(secret.as_bytes(), &salt)
        .map_err(|e| BackendError::Hash(e.to_string()))?;
    Ok(hash.to_string())
}

/// Argon2 is CPU-bound; run it on the blocking pool.
async fn hash_secret_off_thread(secret: &str) -> Result<String, BackendError> {
    let secret = Zeroizing::new(secret.to_string());
    tokio::task::spawn_blocking(move || hash_secret(&secret))
        .await
        .map_err(|e| BackendError::Hash(e.to_string()))?
}

async fn verify_secret_off_thread(hash: String, secret: &str) -> Result<bool, BackendError> {
    let secret = Zeroizing::new(secret.to_string());
    tokio::task::spawn_blocking(move || verify_secret(&hash, &secret))
        .await
        .map_err(|e| BackendError::Hash(e.to_string()))
}

fn verify_secret(hash: &str, secret: &str) -> bool {
    match PasswordHash::new(hash) {
        // Cost parameters come from the PHC string
        Ok(parsed) => Argon2::default()
            .verify_password(secret.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, BackendError> {
    let contents = match tokio::fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(BackendError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    serde_json::from_str(&contents)
        .map(Some)
        .map_err(|source| BackendError::Corrupt {
            path: path.to_path_buf(),
            source,
        })
}

async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), BackendError> {
    let contents = serde_json::to_string_pretty(value).map_err(|source| BackendError::Corrupt {
        path: path.to_path_buf(),
        source,
    })?;
    tokio::fs::write(path, contents)
        .await
        .map_err(|source| BackendError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    crate::config::set_file_permissions_0600(path)
        .await
        .map_err(|source| BackendError::Io {
            path: path.to_path_buf(),
            source,
        })
}
