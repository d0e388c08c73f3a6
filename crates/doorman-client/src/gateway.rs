//! Auth gateway: the two identity-endpoint operations
//!
//! The gateway is pure transport: it never touches the session store, and
//! nothing escapes its boundary as a raw `reqwest` error.

use chrono::Utc;
use tracing::debug;

use doorman_core::TokenGrant;

use crate::config::AuthConfig;
use crate::error::{ClientError, transport_status};
use crate::types::{LoginRequest, RefreshRequest, TokenResponse, error_message};

/// Client for the identity endpoint's login and refresh operations.
pub struct AuthGateway {
    http: reqwest::Client,
    base_url: String,
}

impl AuthGateway {
    /// Build a gateway from the shared configuration.
    pub fn new(config: &AuthConfig) -> Result<Self, ClientError> {
        if config.base_url.is_empty() {
            return Err(ClientError::Configuration("base_url is required".into()));
        }
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("doorman/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| ClientError::Configuration(err.to_string()))?;
        Ok(Self {
            http,
            base_url: config.base_url.clone(),
        })
    }

    /// Exchange credentials for a token grant. Unauthenticated call.
    pub async fn login(&self, username: &str, password: &str) -> Result<TokenGrant, ClientError> {
        debug!(username, "requesting access token");
        let request = self
            .http
            .post(format!("{}/auth/token", self.base_url))
            .json(&LoginRequest { username, password });
        self.execute(request, login_error).await
    }

    /// Exchange a refresh token for a new grant. Unauthenticated call.
    ///
    /// The caller guarantees the token is present; an endpoint rejection or
    /// transport failure comes back as [`ClientError::RefreshFailed`].
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, ClientError> {
        debug!("requesting token refresh");
        let request = self
            .http
            .post(format!("{}/auth/refresh", self.base_url))
            .json(&RefreshRequest { refresh_token });
        self.execute(request, refresh_error).await
    }

    async fn execute(
        &self,
        request: reqwest::RequestBuilder,
        failure: fn(u16, String) -> ClientError,
    ) -> Result<TokenGrant, ClientError> {
        let response = request
            .send()
            .await
            .map_err(|err| failure(transport_status(&err), err.to_string()))?;
        let status = response.status();
        if status.is_success() {
            let body: TokenResponse = response
                .json()
                .await
                .map_err(|err| failure(transport_status(&err), err.to_string()))?;
            Ok(body.into_grant(Utc::now().timestamp()))
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(failure(status.as_u16(), error_message(status, &body)))
        }
    }
}

fn login_error(status: u16, message: String) -> ClientError {
    ClientError::LoginFailed { status, message }
}

fn refresh_error(status: u16, message: String) -> ClientError {
    ClientError::RefreshFailed { status, message }
}
