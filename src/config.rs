//! Configuration options for the market-entry client

use std::env;
use std::time::Duration;

use crate::storage::keys::DEFAULT_TOKEN_KEY;

/// Production API base URL, including the version prefix
pub const DEFAULT_API_BASE_URL: &str =
    "https://market-entry-intel-platform-production.up.railway.app/api/v1";

/// Environment variable holding the API base URL
pub const ENV_API_URL: &str = "MARKET_ENTRY_API_URL";

/// Environment variable holding the durable storage file path
pub const ENV_STORAGE_PATH: &str = "MARKET_ENTRY_STORAGE_PATH";

const ENV_REQUEST_TIMEOUT_SECS: &str = "MARKET_ENTRY_REQUEST_TIMEOUT_SECS";
const ENV_TOKEN_KEY: &str = "MARKET_ENTRY_TOKEN_KEY";

/// Configuration options for the market-entry client
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// The request timeout
    pub request_timeout: Option<Duration>,

    /// Storage key holding the session token
    pub token_storage_key: String,

    /// Value sent in the `X-Client-Info` header
    pub client_info: String,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            request_timeout: Some(Duration::from_secs(30)),
            token_storage_key: DEFAULT_TOKEN_KEY.to_string(),
            client_info: format!("market-entry-client/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ClientOptions {
    /// Build options from the environment, falling back to defaults.
    ///
    /// A timeout of `0` seconds disables the timeout.
    pub fn from_env() -> Self {
        let mut options = Self::default();

        if let Some(secs) = env::var(ENV_REQUEST_TIMEOUT_SECS)
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
        {
            options.request_timeout = if secs == 0 {
                None
            } else {
                Some(Duration::from_secs(secs))
            };
        }

        if let Ok(key) = env::var(ENV_TOKEN_KEY) {
            if !key.trim().is_empty() {
                options.token_storage_key = key.trim().to_string();
            }
        }

        options
    }

    /// Set the request timeout
    pub fn with_request_timeout(mut self, value: Option<Duration>) -> Self {
        self.request_timeout = value;
        self
    }

    /// Set the storage key for the session token
    pub fn with_token_storage_key(mut self, value: &str) -> Self {
        self.token_storage_key = value.to_string();
        self
    }

    /// Set the client info header value
    pub fn with_client_info(mut self, value: &str) -> Self {
        self.client_info = value.to_string();
        self
    }

    /// Build the HTTP client these options describe
    pub(crate) fn http_client(&self) -> reqwest::Client {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = self.request_timeout {
            builder = builder.timeout(timeout);
        }
        builder.build().unwrap_or_else(|err| {
            log::warn!("Falling back to default HTTP client: {}", err);
            reqwest::Client::new()
        })
    }
}
