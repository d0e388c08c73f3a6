//! Scheduled expiry checks
//!
//! The hosting shell spawns one monitor. It waits for rehydration, then runs
//! the coordinator's expiry check on a fixed interval and after every store
//! mutation. Running a check before the gate opens would compare default
//! state against the clock and terminate a session that was never loaded.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::debug;

use doorman_core::{RehydrationGate, SessionStore};

use crate::refresh::RefreshCoordinator;

/// Periodic driver for [`RefreshCoordinator::check_expiry`].
pub struct SessionMonitor {
    store: SessionStore,
    gate: RehydrationGate,
    coordinator: Arc<RefreshCoordinator>,
    interval: Duration,
}

impl SessionMonitor {
    pub fn new(
        store: SessionStore,
        gate: RehydrationGate,
        coordinator: Arc<RefreshCoordinator>,
        interval: Duration,
    ) -> Self {
        Self {
            store,
            gate,
            coordinator,
            interval,
        }
    }

    /// Run until the hosting task is dropped.
    pub async fn run(self) {
        self.gate.ready().await;
        debug!("session monitor active");

        let mut changes = self.store.subscribe();
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                changed = changes.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
            self.coordinator.check_expiry().await;
        }
    }
}
