//! Route guard for protected content

use crate::rehydrate::RehydrationGate;
use crate::store::SessionStore;

/// What the host should render for a protected route.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RouteDecision {
    /// Session restored and authenticated; show the protected content
    Render,
    /// Rehydration still pending; show a neutral loading state
    Loading,
    /// Restored but unauthenticated; send to the login entry point
    RedirectToLogin,
}

/// Decide what a protected route may show.
#[must_use]
pub fn decide(is_ready: bool, is_authenticated: bool) -> RouteDecision {
    if !is_ready {
        RouteDecision::Loading
    } else if is_authenticated {
        RouteDecision::Render
    } else {
        RouteDecision::RedirectToLogin
    }
}

/// [`decide`] against the live gate and store.
#[must_use]
pub fn decide_route(gate: &RehydrationGate, store: &SessionStore) -> RouteDecision {
    decide(gate.is_ready(), store.snapshot().is_authenticated)
}
