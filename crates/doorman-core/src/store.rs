//! Shared session store
//!
//! The store is the single shared mutable resource: components read it
//! freely through [`SessionStore::snapshot`], but every mutation goes through
//! one of the transition methods, which apply a [`SessionCommand`] under the
//! lock and notify watchers afterwards.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio::sync::watch;
use tracing::debug;

use crate::session::{Session, SessionCommand, TokenGrant, reduce};
use crate::storage::PersistedSession;

struct Shared {
    session: Session,
    /// Bumped whenever an error message is set; lets a delayed clear detect
    /// that the message it was scheduled for has been replaced.
    error_seq: u64,
}

/// Cloneable handle to the session state.
///
/// Clones share the same underlying session; pass one to every component
/// that needs it instead of reaching for a global.
#[derive(Clone)]
pub struct SessionStore {
    shared: Arc<RwLock<Shared>>,
    changed: watch::Sender<u64>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    /// Create a store holding the pristine empty session.
    #[must_use]
    pub fn new() -> Self {
        let (changed, _) = watch::channel(0);
        Self {
            shared: Arc::new(RwLock::new(Shared {
                session: Session::default(),
                error_seq: 0,
            })),
            changed,
        }
    }

    /// Consistent point-in-time copy of the session.
    #[must_use]
    pub fn snapshot(&self) -> Session {
        self.shared
            .read()
            .expect("session lock poisoned")
            .session
            .clone()
    }

    /// Receiver notified after every applied transition.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.changed.subscribe()
    }

    /// Mark a login or refresh call as outstanding.
    pub fn begin_loading(&self) {
        self.apply(SessionCommand::BeginLoading);
    }

    pub fn apply_login_success(&self, grant: TokenGrant) {
        self.apply(SessionCommand::LoginSucceeded(grant));
    }

    pub fn apply_refresh_success(&self, grant: TokenGrant) {
        self.apply(SessionCommand::RefreshSucceeded(grant));
    }

    /// Record a rejected login or failed refresh; clears the whole session.
    pub fn apply_failure(&self, message: impl Into<String>) {
        self.apply(SessionCommand::Failed {
            message: message.into(),
        });
    }

    /// Back to the pristine state (logout, hard session expiry).
    pub fn reset(&self) {
        self.apply(SessionCommand::Reset);
    }

    pub fn set_error(&self, message: impl Into<String>) {
        self.apply(SessionCommand::SetError {
            message: message.into(),
        });
    }

    pub fn clear_error(&self) {
        self.apply(SessionCommand::ClearError);
    }

    /// Apply a restored snapshot (or nothing) at process start.
    pub fn apply_rehydrated(&self, persisted: Option<PersistedSession>) {
        self.apply(SessionCommand::Rehydrated(persisted));
    }

    /// Clear the current error after `delay`, unless a newer error has been
    /// set in the meantime.
    pub async fn clear_error_after(&self, delay: Duration) {
        let scheduled_for = self.shared.read().expect("session lock poisoned").error_seq;
        tokio::time::sleep(delay).await;
        {
            let mut shared = self.shared.write().expect("session lock poisoned");
            if shared.error_seq != scheduled_for || !shared.session.error {
                return;
            }
            shared.session = reduce(&shared.session, SessionCommand::ClearError);
        }
        self.changed.send_modify(|version| *version += 1);
    }

    fn apply(&self, command: SessionCommand) {
        debug!(command = command_name(&command), "applying session transition");
        {
            let mut shared = self.shared.write().expect("session lock poisoned");
            if matches!(
                command,
                SessionCommand::SetError { .. } | SessionCommand::Failed { .. }
            ) {
                shared.error_seq += 1;
            }
            shared.session = reduce(&shared.session, command);
        }
        self.changed.send_modify(|version| *version += 1);
    }
}

fn command_name(command: &SessionCommand) -> &'static str {
    match command {
        SessionCommand::BeginLoading => "begin_loading",
        SessionCommand::LoginSucceeded(_) => "login_succeeded",
        SessionCommand::RefreshSucceeded(_) => "refresh_succeeded",
        SessionCommand::Failed { .. } => "failed",
        SessionCommand::Reset => "reset",
        SessionCommand::SetError { .. } => "set_error",
        SessionCommand::ClearError => "clear_error",
        SessionCommand::Rehydrated(_) => "rehydrated",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::UserProfile;

    fn grant(token: &str) -> TokenGrant {
        TokenGrant {
            token: token.to_string(),
            expires_in: 3600,
            refresh_token: Some("r1".to_string()),
            refresh_token_expires_at: Some(1_700_007_200),
            last_login: 1_700_000_000,
            last_refreshed: None,
            user: Some(UserProfile::default()),
        }
    }

    #[test]
    fn transitions_are_observable_through_snapshots() {
        let store = SessionStore::new();
        store.begin_loading();
        assert!(store.snapshot().is_loading);

        store.apply_login_success(grant("t1"));
        let session = store.snapshot();
        assert!(session.is_authenticated);
        assert!(!session.is_loading);
        assert_eq!(session.token.as_deref(), Some("t1"));
    }

    #[test]
    fn watchers_are_notified_on_every_transition() {
        let store = SessionStore::new();
        let mut watcher = store.subscribe();
        assert!(!watcher.has_changed().unwrap());

        store.begin_loading();
        assert!(watcher.has_changed().unwrap());
        watcher.mark_unchanged();

        store.reset();
        assert!(watcher.has_changed().unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn error_auto_clears_after_the_delay() {
        let store = SessionStore::new();
        store.set_error("Session Expired!");

        store.clear_error_after(Duration::from_secs(5)).await;
        let session = store.snapshot();
        assert!(!session.error);
        assert!(session.error_message.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn delayed_clear_never_wipes_a_newer_error() {
        let store = SessionStore::new();
        store.set_error("first");

        let clearer = {
            let store = store.clone();
            tokio::spawn(async move { store.clear_error_after(Duration::from_secs(5)).await })
        };
        // Let the clearer capture the current error generation first.
        tokio::task::yield_now().await;
        store.set_error("second");
        clearer.await.unwrap();

        let session = store.snapshot();
        assert!(session.error);
        assert_eq!(session.error_message, "second");
    }
}
