//! Wire types for the identity endpoint

use doorman_core::{TokenGrant, UserProfile};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Serialize)]
pub struct RefreshRequest<'a> {
    pub refresh_token: &'a str,
}

/// Success payload of `POST /auth/token` and `POST /auth/refresh`.
///
/// `refresh_token_expires_in` carries an absolute epoch cutoff despite its
/// name; `user` may be omitted on refresh.
#[derive(Clone, Debug, Deserialize)]
pub struct TokenResponse {
    pub token: String,
    pub expires_in: i64,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub refresh_token_expires_in: Option<i64>,
    #[serde(default)]
    pub last_login: Option<i64>,
    #[serde(default)]
    pub last_refreshed: Option<i64>,
    #[serde(default)]
    pub user: Option<UserProfile>,
}

impl TokenResponse {
    /// Convert into the grant the store consumes; `now` is used when the
    /// endpoint did not report a login timestamp.
    #[must_use]
    pub fn into_grant(self, now: i64) -> TokenGrant {
        TokenGrant {
            token: self.token,
            expires_in: self.expires_in,
            refresh_token: self.refresh_token,
            refresh_token_expires_at: self.refresh_token_expires_in,
            last_login: self.last_login.unwrap_or(now),
            last_refreshed: self.last_refreshed,
            user: self.user,
        }
    }
}

/// Error payload shape produced by the endpoint.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    pub message: Option<String>,
}

/// Best-effort human-readable message from an error response body.
pub(crate) fn error_message(status: reqwest::StatusCode, body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|parsed| parsed.message)
        .unwrap_or_else(|| {
            if body.trim().is_empty() {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            } else {
                body.to_string()
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_response_maps_onto_a_grant() {
        let response: TokenResponse = serde_json::from_value(serde_json::json!({
            "token": "t1",
            "expires_in": 3600,
            "refresh_token": "r1",
            "refresh_token_expires_in": 1_700_007_200,
            "last_login": 1_700_000_000,
            "last_refreshed": 1_700_000_000,
            "user": {"username": "alice"}
        }))
        .unwrap();

        let grant = response.into_grant(0);
        assert_eq!(grant.token, "t1");
        assert_eq!(grant.expires_in, 3600);
        assert_eq!(grant.refresh_token.as_deref(), Some("r1"));
        assert_eq!(grant.refresh_token_expires_at, Some(1_700_007_200));
        assert_eq!(grant.last_login, 1_700_000_000);
        assert_eq!(
            grant.user.and_then(|u| u.username),
            Some("alice".to_string())
        );
    }

    #[test]
    fn missing_last_login_falls_back_to_now() {
        let response: TokenResponse = serde_json::from_value(serde_json::json!({
            "token": "t1",
            "expires_in": 3600
        }))
        .unwrap();
        assert_eq!(response.into_grant(1_700_000_123).last_login, 1_700_000_123);
    }

    #[test]
    fn error_message_prefers_the_json_message_field() {
        let status = reqwest::StatusCode::UNAUTHORIZED;
        assert_eq!(
            error_message(status, r#"{"message": "Invalid credentials"}"#),
            "Invalid credentials"
        );
        assert_eq!(error_message(status, "plain text"), "plain text");
        assert_eq!(error_message(status, ""), "Unauthorized");
    }
}
