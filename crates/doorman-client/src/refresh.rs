//! Refresh coordination
//!
//! At most one refresh network call is in flight at a time. The guard is a
//! synchronous test-and-set under a mutex with no await point inside the
//! critical section; callers that lose the race park on a oneshot channel
//! and are settled FIFO when the in-flight refresh resolves.

use std::sync::{Arc, Mutex};

use chrono::Utc;
use tokio::sync::{broadcast, oneshot};
use tracing::{debug, info, warn};

use doorman_core::{Session, SessionStore};

use crate::config::AuthConfig;
use crate::error::{ClientError, TRANSPORT_STATUS};
use crate::gateway::AuthGateway;

/// User-facing message for a terminated session.
pub const SESSION_EXPIRED_MESSAGE: &str = "Session Expired!";

/// Coordinator states. `Failed` is terminal for the current session; the
/// next refresh attempt after a fresh login moves back through `Refreshing`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshState {
    Idle,
    Refreshing,
    Failed,
}

/// Outcome of one expiry check over a single session snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExpiryDecision {
    /// Nothing to do
    Idle,
    /// Access token is inside the safety buffer; refresh proactively
    RefreshDue,
    /// Refresh token cutoff passed; the session is unrecoverable
    SessionExpired,
}

/// Session lifecycle notifications for the hosting shell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    /// A refresh replaced the access token
    TokenRefreshed,
    /// The session was terminated; navigate to the login entry point
    SessionExpired,
}

type RefreshOutcome = Result<String, ClientError>;

struct CoordinatorInner {
    state: RefreshState,
    waiters: Vec<oneshot::Sender<RefreshOutcome>>,
}

/// Single-flight refresh coordinator.
pub struct RefreshCoordinator {
    store: SessionStore,
    gateway: Arc<AuthGateway>,
    refresh_buffer_secs: i64,
    error_clear_delay: std::time::Duration,
    inner: Mutex<CoordinatorInner>,
    events: broadcast::Sender<SessionEvent>,
}

impl RefreshCoordinator {
    pub fn new(store: SessionStore, gateway: Arc<AuthGateway>, config: &AuthConfig) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            store,
            gateway,
            refresh_buffer_secs: config.refresh_buffer_secs,
            error_clear_delay: config.error_clear_delay,
            inner: Mutex::new(CoordinatorInner {
                state: RefreshState::Idle,
                waiters: Vec::new(),
            }),
            events,
        }
    }

    /// Current coordinator state.
    #[must_use]
    pub fn state(&self) -> RefreshState {
        self.inner.lock().expect("coordinator lock poisoned").state
    }

    /// Subscribe to session lifecycle events.
    #[must_use]
    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Obtain a fresh access token, joining an in-flight refresh if one is
    /// already underway.
    ///
    /// Exactly one caller drives the network call; everyone else receives
    /// the same outcome. On failure the session is terminated.
    pub async fn refresh(&self) -> RefreshOutcome {
        let parked = {
            let mut inner = self.inner.lock().expect("coordinator lock poisoned");
            if inner.state == RefreshState::Refreshing {
                let (tx, rx) = oneshot::channel();
                inner.waiters.push(tx);
                Some(rx)
            } else {
                inner.state = RefreshState::Refreshing;
                None
            }
        };

        if let Some(rx) = parked {
            debug!("joining in-flight token refresh");
            return match rx.await {
                Ok(outcome) => outcome,
                // The driving task was dropped mid-refresh.
                Err(_) => Err(ClientError::RefreshFailed {
                    status: TRANSPORT_STATUS,
                    message: "refresh abandoned".to_string(),
                }),
            };
        }

        let outcome = self.run_refresh().await;

        let waiters = {
            let mut inner = self.inner.lock().expect("coordinator lock poisoned");
            inner.state = if outcome.is_ok() {
                RefreshState::Idle
            } else {
                RefreshState::Failed
            };
            std::mem::take(&mut inner.waiters)
        };
        for waiter in waiters {
            let _ = waiter.send(outcome.clone());
        }
        outcome
    }

    /// Run one expiry check against the current snapshot and act on it.
    pub async fn check_expiry(&self) {
        let snapshot = self.store.snapshot();
        let now = Utc::now().timestamp();
        match evaluate_expiry(&snapshot, now, self.refresh_buffer_secs) {
            ExpiryDecision::Idle => {}
            ExpiryDecision::RefreshDue => {
                debug!("access token inside refresh buffer");
                // Outcome is already recorded in the store either way.
                let _ = self.refresh().await;
            }
            ExpiryDecision::SessionExpired => self.expire_session("refresh token expired"),
        }
    }

    async fn run_refresh(&self) -> RefreshOutcome {
        let snapshot = self.store.snapshot();
        let Some(refresh_token) = snapshot.refresh_token else {
            let err = ClientError::RefreshFailed {
                status: TRANSPORT_STATUS,
                message: "No refresh token available".to_string(),
            };
            self.expire_session("no refresh token available");
            return Err(err);
        };

        self.store.begin_loading();
        match self.gateway.refresh(&refresh_token).await {
            Ok(grant) => {
                let token = grant.token.clone();
                info!("access token refreshed");
                self.store.apply_refresh_success(grant);
                let _ = self.events.send(SessionEvent::TokenRefreshed);
                Ok(token)
            }
            Err(err) => {
                warn!(%err, "token refresh failed; terminating session");
                self.expire_session_with_failure();
                Err(err)
            }
        }
    }

    /// Terminal transition: wipe the session and surface the fixed
    /// user-facing message, auto-clearing it after the configured delay.
    fn expire_session(&self, reason: &str) {
        warn!(reason, "session terminated");
        self.store.reset();
        self.finish_expiry();
    }

    fn expire_session_with_failure(&self) {
        self.store.apply_failure(SESSION_EXPIRED_MESSAGE);
        self.finish_expiry();
    }

    fn finish_expiry(&self) {
        if !self.store.snapshot().error {
            self.store.set_error(SESSION_EXPIRED_MESSAGE);
        }
        let store = self.store.clone();
        let delay = self.error_clear_delay;
        tokio::spawn(async move { store.clear_error_after(delay).await });
        let _ = self.events.send(SessionEvent::SessionExpired);
    }
}

/// Classify `now` against a session snapshot.
///
/// For an authenticated session the three outcomes are mutually exclusive
/// and exhaustive. An absent refresh cutoff counts as already passed: a
/// rehydrated session carries no refresh material and ends on its first due
/// check.
#[must_use]
pub fn evaluate_expiry(session: &Session, now: i64, buffer_secs: i64) -> ExpiryDecision {
    if !session.is_authenticated {
        return ExpiryDecision::Idle;
    }
    if now >= session.refresh_token_expires_at.unwrap_or(0) {
        return ExpiryDecision::SessionExpired;
    }
    match (session.last_login, session.expires_in) {
        (Some(last_login), Some(expires_in)) if now - last_login > expires_in - buffer_secs => {
            ExpiryDecision::RefreshDue
        }
        _ => ExpiryDecision::Idle,
    }
}
