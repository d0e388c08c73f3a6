//! Authorized API client
//!
//! Decorates outbound calls with the current access token and retries a
//! request once, after a coordinated refresh, when the response is a 401
//! tagged as token expiry. Every other failure propagates untouched, so
//! genuine authorization errors are never masked as expiry.

use std::sync::Arc;

use reqwest::{Method, StatusCode, header};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use doorman_core::{SessionStore, UserProfile};

use crate::config::AuthConfig;
use crate::error::{ClientError, TRANSPORT_STATUS, transport_status};
use crate::refresh::RefreshCoordinator;
use crate::types::error_message;

/// Marker the endpoint puts in a 401 body when the access token has expired,
/// matched case-insensitively.
pub const TOKEN_EXPIRED_MARKER: &str = "token expired";

/// A failing response triggers a refresh only when it is a 401 tagged as
/// token expiry; other 401s are ordinary authorization failures.
pub(crate) fn is_token_expired(status: StatusCode, body: &str) -> bool {
    status == StatusCode::UNAUTHORIZED && body.to_ascii_lowercase().contains(TOKEN_EXPIRED_MARKER)
}

/// HTTP client for the protected API.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    store: SessionStore,
    coordinator: Arc<RefreshCoordinator>,
}

impl ApiClient {
    pub fn new(
        config: &AuthConfig,
        store: SessionStore,
        coordinator: Arc<RefreshCoordinator>,
    ) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("doorman/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| ClientError::Configuration(err.to_string()))?;
        Ok(Self {
            http,
            base_url: config.base_url.clone(),
            store,
            coordinator,
        })
    }

    pub async fn get<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.execute(Method::GET, path, None, true).await
    }

    pub async fn post<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &impl Serialize,
    ) -> Result<T, ClientError> {
        self.execute(Method::POST, path, Some(to_payload(body)?), true)
            .await
    }

    pub async fn put<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &impl Serialize,
    ) -> Result<T, ClientError> {
        self.execute(Method::PUT, path, Some(to_payload(body)?), true)
            .await
    }

    pub async fn patch<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &impl Serialize,
    ) -> Result<T, ClientError> {
        self.execute(Method::PATCH, path, Some(to_payload(body)?), true)
            .await
    }

    pub async fn delete<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<T, ClientError> {
        self.execute(Method::DELETE, path, None, true).await
    }

    /// POST without the `Authorization` header, for public endpoints.
    pub async fn post_public<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &impl Serialize,
    ) -> Result<T, ClientError> {
        self.execute(Method::POST, path, Some(to_payload(body)?), false)
            .await
    }

    /// Fetch the authenticated user's profile.
    pub async fn get_profile(&self) -> Result<UserProfile, ClientError> {
        self.get("/auth/profile").await
    }

    async fn execute<T: serde::de::DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        payload: Option<Value>,
        with_auth: bool,
    ) -> Result<T, ClientError> {
        let mut token = if with_auth {
            self.store.snapshot().token
        } else {
            None
        };
        let mut retried = false;

        loop {
            let mut request = self
                .http
                .request(method.clone(), format!("{}{}", self.base_url, path));
            if let Some(token) = &token {
                request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
            }
            if let Some(payload) = &payload {
                request = request.json(payload);
            }

            let response = request.send().await.map_err(|err| ClientError::Api {
                status: transport_status(&err),
                message: err.to_string(),
            })?;
            let status = response.status();
            if status.is_success() {
                return response.json().await.map_err(|err| ClientError::Api {
                    status: TRANSPORT_STATUS,
                    message: err.to_string(),
                });
            }

            let body = response.text().await.unwrap_or_default();
            if with_auth && !retried && is_token_expired(status, &body) {
                debug!(path, "access token expired mid-call; refreshing");
                // A refresh failure is the original request's failure.
                token = Some(self.coordinator.refresh().await?);
                retried = true;
                continue;
            }

            return Err(ClientError::Api {
                status: status.as_u16(),
                message: error_message(status, &body),
            });
        }
    }
}

fn to_payload(body: &impl Serialize) -> Result<Value, ClientError> {
    serde_json::to_value(body).map_err(|err| ClientError::Api {
        status: TRANSPORT_STATUS,
        message: err.to_string(),
    })
}
