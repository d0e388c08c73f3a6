//! Client error types
//!
//! Transport failures are folded into the same status+message shape the
//! identity endpoint produces, so callers never branch on transport vs
//! application errors. Status 500 stands in where no HTTP status exists.

use thiserror::Error;

/// Stand-in status for failures that never produced an HTTP response.
pub(crate) const TRANSPORT_STATUS: u16 = 500;

/// Client error types
#[derive(Clone, Debug, Error)]
pub enum ClientError {
    /// Credentials rejected client-side, before any network call
    #[error("missing credentials: {0}")]
    MissingCredentials(String),

    /// Login rejected by the identity endpoint (or transport failure)
    #[error("login failed ({status}): {message}")]
    LoginFailed { status: u16, message: String },

    /// Refresh rejected, refresh token absent, or transport failure;
    /// terminal for the current session
    #[error("session refresh failed ({status}): {message}")]
    RefreshFailed { status: u16, message: String },

    /// Non-auth failure from a protected API call, propagated untouched
    #[error("request failed ({status}): {message}")]
    Api { status: u16, message: String },

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    Configuration(String),
}

impl ClientError {
    /// The human-readable message carried by this error.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::MissingCredentials(message) | Self::Configuration(message) => message,
            Self::LoginFailed { message, .. }
            | Self::RefreshFailed { message, .. }
            | Self::Api { message, .. } => message,
        }
    }

    /// The HTTP status this error surfaced with, where one applies.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::LoginFailed { status, .. }
            | Self::RefreshFailed { status, .. }
            | Self::Api { status, .. } => Some(*status),
            Self::MissingCredentials(_) | Self::Configuration(_) => None,
        }
    }
}

/// Status to report for a `reqwest` error: the response status if one was
/// seen, otherwise the transport stand-in.
pub(crate) fn transport_status(err: &reqwest::Error) -> u16 {
    err.status().map_or(TRANSPORT_STATUS, |status| status.as_u16())
}
