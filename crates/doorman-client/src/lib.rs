//! Doorman session client
//!
//! Wires the session store, auth gateway, refresh coordinator, rehydration
//! gate and storage backend into one explicitly-constructed context. Hosts
//! create a [`SessionManager`], call [`SessionManager::start`] once, and
//! drive everything else through it.

pub mod api;
pub mod config;
pub mod error;
pub mod gateway;
pub mod monitor;
pub mod refresh;
pub mod types;

use std::sync::Arc;

use tracing::{info, warn};

use doorman_core::rehydrate::{self, RehydrationGate, persist_changes};
use doorman_core::{RouteDecision, SessionStore, StorageBackend, guard};

pub use api::ApiClient;
pub use config::AuthConfig;
pub use error::ClientError;
pub use gateway::AuthGateway;
pub use monitor::SessionMonitor;
pub use refresh::{RefreshCoordinator, RefreshState, SESSION_EXPIRED_MESSAGE, SessionEvent};

/// The session/token lifecycle context.
///
/// Owns one session per process. All components receive their dependencies
/// here instead of reaching for globals.
pub struct SessionManager {
    config: AuthConfig,
    store: SessionStore,
    gateway: Arc<AuthGateway>,
    coordinator: Arc<RefreshCoordinator>,
    gate: RehydrationGate,
    storage: Arc<dyn StorageBackend>,
}

impl SessionManager {
    pub fn new(config: AuthConfig, storage: Arc<dyn StorageBackend>) -> Result<Self, ClientError> {
        let store = SessionStore::new();
        let gateway = Arc::new(AuthGateway::new(&config)?);
        let coordinator = Arc::new(RefreshCoordinator::new(
            store.clone(),
            gateway.clone(),
            &config,
        ));
        Ok(Self {
            config,
            store,
            gateway,
            coordinator,
            gate: RehydrationGate::new(),
            storage,
        })
    }

    /// Restore persisted state, then start the persistor and the monitor.
    ///
    /// Call once at process start; session-dependent decisions are valid as
    /// soon as this returns.
    pub async fn start(&self) {
        rehydrate::rehydrate(&self.store, self.storage.as_ref(), &self.gate).await;
        tokio::spawn(persist_changes(self.store.clone(), self.storage.clone()));
        tokio::spawn(self.monitor().run());
    }

    /// Log in with the given credentials.
    ///
    /// Blank credentials fail client-side before any network call. A
    /// rejection lands in the session's error state and auto-clears after
    /// the configured delay.
    pub async fn login(&self, username: &str, password: &str) -> Result<(), ClientError> {
        if username.trim().is_empty() || password.trim().is_empty() {
            return Err(ClientError::MissingCredentials(
                "username and password are required".to_string(),
            ));
        }

        self.store.begin_loading();
        match self.gateway.login(username, password).await {
            Ok(grant) => {
                info!("login succeeded");
                self.store.apply_login_success(grant);
                Ok(())
            }
            Err(err) => {
                self.store.apply_failure(err.message());
                let store = self.store.clone();
                let delay = self.config.error_clear_delay;
                tokio::spawn(async move { store.clear_error_after(delay).await });
                Err(err)
            }
        }
    }

    /// Clear the session and the persisted snapshot.
    pub async fn logout(&self) {
        info!("logging out");
        self.store.reset();
        if let Err(err) = self.storage.clear().await {
            warn!(%err, "failed to clear persisted session");
        }
    }

    /// Client for the protected API, sharing this session.
    pub fn api(&self) -> Result<ApiClient, ClientError> {
        ApiClient::new(&self.config, self.store.clone(), self.coordinator.clone())
    }

    /// Monitor driving the scheduled expiry checks; spawn its `run` future.
    #[must_use]
    pub fn monitor(&self) -> SessionMonitor {
        SessionMonitor::new(
            self.store.clone(),
            self.gate.clone(),
            self.coordinator.clone(),
            self.config.check_interval,
        )
    }

    #[must_use]
    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    #[must_use]
    pub fn rehydration(&self) -> &RehydrationGate {
        &self.gate
    }

    #[must_use]
    pub fn coordinator(&self) -> &Arc<RefreshCoordinator> {
        &self.coordinator
    }

    /// Session lifecycle notifications (forced logout, refreshes).
    #[must_use]
    pub fn subscribe_events(&self) -> tokio::sync::broadcast::Receiver<SessionEvent> {
        self.coordinator.subscribe_events()
    }

    /// What a protected route may render right now.
    #[must_use]
    pub fn route_decision(&self) -> RouteDecision {
        guard::decide_route(&self.gate, &self.store)
    }
}
