//! Rehydration gate and session persistence
//!
//! Until the stored snapshot has been loaded into the store, the session
//! reads as the pristine default, and acting on that would terminate a
//! perfectly good session. Everything session-dependent waits on the gate.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, warn};

use crate::storage::{PersistedSession, StorageBackend};
use crate::store::SessionStore;

/// One-shot readiness latch for persisted-state restoration.
///
/// Becomes ready exactly once; marking it again is a no-op.
#[derive(Clone)]
pub struct RehydrationGate {
    ready: watch::Sender<bool>,
}

impl Default for RehydrationGate {
    fn default() -> Self {
        Self::new()
    }
}

impl RehydrationGate {
    #[must_use]
    pub fn new() -> Self {
        let (ready, _) = watch::channel(false);
        Self { ready }
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        *self.ready.borrow()
    }

    /// Latch the gate. Only the first call has any effect.
    pub fn mark_ready(&self) {
        let latched = self.ready.send_if_modified(|ready| {
            if *ready {
                false
            } else {
                *ready = true;
                true
            }
        });
        if latched {
            debug!("session rehydration complete");
        }
    }

    /// Wait until the gate is ready. Returns immediately if it already is.
    pub async fn ready(&self) {
        let mut rx = self.ready.subscribe();
        // The sender lives in self, so this cannot fail while we're borrowed.
        let _ = rx.wait_for(|ready| *ready).await;
    }
}

/// Restore the persisted snapshot into the store, then latch the gate.
///
/// A backend failure is logged and treated as "nothing persisted": the gate
/// still opens, the session just starts out unauthenticated.
pub async fn rehydrate(store: &SessionStore, backend: &dyn StorageBackend, gate: &RehydrationGate) {
    match backend.load().await {
        Ok(persisted) => store.apply_rehydrated(persisted),
        Err(err) => {
            warn!(%err, "failed to restore persisted session");
            store.apply_rehydrated(None);
        }
    }
    gate.mark_ready();
}

/// Mirror the persisted whitelist into the backend on every store mutation.
///
/// Runs until the hosting task is dropped. An unauthenticated session clears
/// the stored snapshot instead of writing one.
pub async fn persist_changes(store: SessionStore, backend: Arc<dyn StorageBackend>) {
    let mut changes = store.subscribe();
    let mut last_written: Option<PersistedSession> = None;
    while changes.changed().await.is_ok() {
        let session = store.snapshot();
        let snapshot = PersistedSession::capture(&session);
        if last_written.as_ref() == Some(&snapshot) {
            continue;
        }
        let result = if session.is_authenticated {
            backend.save(&snapshot).await
        } else {
            backend.clear().await
        };
        match result {
            Ok(()) => last_written = Some(snapshot),
            Err(err) => warn!(%err, "failed to persist session snapshot"),
        }
    }
}
