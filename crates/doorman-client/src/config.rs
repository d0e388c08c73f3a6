//! Client configuration

use std::time::Duration;

/// Seconds subtracted from the access-token lifetime before a proactive
/// refresh is considered due.
pub const DEFAULT_REFRESH_BUFFER_SECS: i64 = 10;

/// How long transient user-facing errors stay visible before auto-clearing.
pub const DEFAULT_ERROR_CLEAR_DELAY: Duration = Duration::from_secs(5);

/// Fixed per-request timeout carried by the network layer.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Interval between scheduled expiry checks.
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(60);

/// Configuration for the session client.
#[derive(Clone, Debug)]
pub struct AuthConfig {
    /// Base URL of the identity endpoint and the protected API
    pub base_url: String,
    pub request_timeout: Duration,
    pub check_interval: Duration,
    /// Safety buffer for the proactive-refresh decision
    pub refresh_buffer_secs: i64,
    pub error_clear_delay: Duration,
}

impl AuthConfig {
    /// Configuration with defaults for everything but the base URL.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            check_interval: DEFAULT_CHECK_INTERVAL,
            refresh_buffer_secs: DEFAULT_REFRESH_BUFFER_SECS,
            error_clear_delay: DEFAULT_ERROR_CLEAR_DELAY,
        }
    }

    /// Read the base URL from `DOORMAN_BASE_URL`, falling back to the local
    /// development server.
    #[must_use]
    pub fn from_env() -> Self {
        let base_url = std::env::var("DOORMAN_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:3000".to_string());
        Self::new(base_url)
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_check_interval(mut self, interval: Duration) -> Self {
        self.check_interval = interval;
        self
    }

    #[must_use]
    pub fn with_refresh_buffer_secs(mut self, buffer: i64) -> Self {
        self.refresh_buffer_secs = buffer;
        self
    }

    #[must_use]
    pub fn with_error_clear_delay(mut self, delay: Duration) -> Self {
        self.error_clear_delay = delay;
        self
    }
}
