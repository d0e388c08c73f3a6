//! Persistence boundary for the session
//!
//! Only a whitelisted subset of the session survives a restart. The refresh
//! token and its cutoff are intentionally not part of it: a restored session
//! looks authenticated but cannot refresh, and the first due expiry check
//! ends it. Widening the whitelist is a product decision, not a bug fix.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CoreResult;
use crate::session::{Session, UserProfile};

/// The persisted subset of [`Session`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedSession {
    pub is_authenticated: bool,
    pub token: Option<String>,
    pub expires_in: Option<i64>,
    pub user: Option<UserProfile>,
}

impl PersistedSession {
    /// Capture the persisted whitelist from a session snapshot.
    #[must_use]
    pub fn capture(session: &Session) -> Self {
        Self {
            is_authenticated: session.is_authenticated,
            token: session.token.clone(),
            expires_in: session.expires_in,
            user: session.user.clone(),
        }
    }
}

/// Where persisted session snapshots live between process runs.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Load the stored snapshot, if any.
    async fn load(&self) -> CoreResult<Option<PersistedSession>>;

    /// Replace the stored snapshot.
    async fn save(&self, snapshot: &PersistedSession) -> CoreResult<()>;

    /// Remove the stored snapshot.
    async fn clear(&self) -> CoreResult<()>;
}

/// In-memory backend for tests and hosts without durable storage.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    snapshot: Arc<Mutex<Option<PersistedSession>>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StorageBackend for MemoryStorage {
    async fn load(&self) -> CoreResult<Option<PersistedSession>> {
        Ok(self.snapshot.lock().expect("storage lock poisoned").clone())
    }

    async fn save(&self, snapshot: &PersistedSession) -> CoreResult<()> {
        *self.snapshot.lock().expect("storage lock poisoned") = Some(snapshot.clone());
        Ok(())
    }

    async fn clear(&self) -> CoreResult<()> {
        *self.snapshot.lock().expect("storage lock poisoned") = None;
        Ok(())
    }
}

/// JSON snapshot at a fixed path, the native analog of browser storage.
#[derive(Clone, Debug)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl StorageBackend for FileStorage {
    async fn load(&self) -> CoreResult<Option<PersistedSession>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    async fn save(&self, snapshot: &PersistedSession) -> CoreResult<()> {
        let bytes = serde_json::to_vec_pretty(snapshot)?;
        tokio::fs::write(&self.path, bytes).await?;
        Ok(())
    }

    async fn clear(&self) -> CoreResult<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
