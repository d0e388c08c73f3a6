//! Session record and the transition reducer
//!
//! All mutations of the session flow through [`reduce`] as a
//! [`SessionCommand`], so a transition is always applied as a whole and can
//! be replayed in tests.

use serde::{Deserialize, Serialize};

use crate::storage::PersistedSession;

/// Fallback used when an error transition carries an empty message, so the
/// `error == true` / non-empty message pairing always holds.
const DEFAULT_ERROR_MESSAGE: &str = "Error while setting up the error message.";

/// User profile as returned by the identity endpoint.
///
/// The profile shape is endpoint-defined; the well-known fields are typed and
/// anything else is kept verbatim in `extra`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Token material granted by a successful login or refresh.
#[derive(Clone, Debug, PartialEq)]
pub struct TokenGrant {
    /// Access token attached to outbound requests
    pub token: String,
    /// Access-token lifetime in seconds, counted from `last_login`
    pub expires_in: i64,
    pub refresh_token: Option<String>,
    /// Absolute epoch cutoff for the whole session
    pub refresh_token_expires_at: Option<i64>,
    /// Epoch seconds; the origin for access-token expiry math
    pub last_login: i64,
    pub last_refreshed: Option<i64>,
    pub user: Option<UserProfile>,
}

/// The singleton authentication state.
///
/// `is_authenticated` is true iff `token` is present and has not been
/// invalidated by a terminal failure; token, expiry and timestamp fields are
/// always populated and cleared together.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Session {
    pub is_authenticated: bool,
    /// True while a login or refresh network call is outstanding
    pub is_loading: bool,
    pub token: Option<String>,
    pub expires_in: Option<i64>,
    pub refresh_token: Option<String>,
    pub refresh_token_expires_at: Option<i64>,
    pub last_login: Option<i64>,
    pub last_refreshed: Option<i64>,
    pub user: Option<UserProfile>,
    pub error: bool,
    pub error_message: String,
}

/// Atomic session transitions.
#[derive(Clone, Debug)]
pub enum SessionCommand {
    /// A login or refresh call went out
    BeginLoading,
    LoginSucceeded(TokenGrant),
    /// Like login, but keeps the current user when the grant has none
    RefreshSucceeded(TokenGrant),
    /// Rejected login or failed refresh; clears all session-identifying fields
    Failed { message: String },
    /// Back to the pristine state (logout, hard session expiry)
    Reset,
    /// Transient user-facing message, independent of the auth fields
    SetError { message: String },
    ClearError,
    /// Persisted snapshot restored at process start
    Rehydrated(Option<PersistedSession>),
}

/// Apply a command to the current session, producing the next one.
#[must_use]
pub fn reduce(session: &Session, command: SessionCommand) -> Session {
    match command {
        SessionCommand::BeginLoading => Session {
            is_loading: true,
            error: false,
            error_message: String::new(),
            ..session.clone()
        },
        SessionCommand::LoginSucceeded(grant) => {
            let user = grant.user.clone();
            session_from_grant(grant, user)
        }
        SessionCommand::RefreshSucceeded(grant) => {
            let user = grant.user.clone().or_else(|| session.user.clone());
            session_from_grant(grant, user)
        }
        SessionCommand::Failed { message } => Session {
            error: true,
            error_message: non_empty(message),
            ..Session::default()
        },
        SessionCommand::Reset => Session::default(),
        SessionCommand::SetError { message } => Session {
            error: true,
            error_message: non_empty(message),
            ..session.clone()
        },
        SessionCommand::ClearError => Session {
            error: false,
            error_message: String::new(),
            ..session.clone()
        },
        SessionCommand::Rehydrated(Some(persisted)) => Session {
            // A snapshot claiming authentication without a token is stale;
            // never restore it as authenticated.
            is_authenticated: persisted.is_authenticated && persisted.token.is_some(),
            token: persisted.token,
            expires_in: persisted.expires_in,
            user: persisted.user,
            ..Session::default()
        },
        SessionCommand::Rehydrated(None) => session.clone(),
    }
}

fn session_from_grant(grant: TokenGrant, user: Option<UserProfile>) -> Session {
    Session {
        is_authenticated: true,
        is_loading: false,
        token: Some(grant.token),
        expires_in: Some(grant.expires_in),
        refresh_token: grant.refresh_token,
        refresh_token_expires_at: grant.refresh_token_expires_at,
        last_login: Some(grant.last_login),
        last_refreshed: grant.last_refreshed,
        user,
        error: false,
        error_message: String::new(),
    }
}

fn non_empty(message: String) -> String {
    if message.is_empty() {
        DEFAULT_ERROR_MESSAGE.to_string()
    } else {
        message
    }
}
