//! Client configuration from environment variables

use std::env;
use std::fmt;
use std::time::Duration;

use crate::error::ClientError;

const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/api/v1";

#[derive(Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Base of the REST API, e.g. `http://localhost:8000/api/v1`
    pub api_base_url: String,

    /// Base of the event channel endpoint (API base with `ws`/`wss` scheme)
    pub ws_base_url: String,

    /// Delay between matchmaking polls while waiting for an opponent
    pub poll_interval: Duration,

    /// Timeout for each REST request
    pub request_timeout: Duration,

    /// Log in with these before matchmaking
    pub credentials: Option<Credentials>,
}

impl ClientConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ClientError> {
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Load configuration from any key lookup.
    pub fn from_vars<F>(var: F) -> Result<Self, ClientError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_base_url = var("API_BASE_URL")
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let ws_base_url = match var("WS_BASE_URL") {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => ws_base_from(&api_base_url)?,
        };

        let poll_interval = Duration::from_millis(
            var("POLL_INTERVAL_MS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(2000),
        );

        let request_timeout = Duration::from_secs(
            var("REQUEST_TIMEOUT_SECS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
        );

        let credentials = match (var("ACCOUNT_EMAIL"), var("ACCOUNT_PASSWORD")) {
            (Some(email), Some(password)) => Some(Credentials { email, password }),
            (Some(_), None) => {
                return Err(ClientError::Config(
                    "ACCOUNT_EMAIL is set but ACCOUNT_PASSWORD is not".into(),
                ))
            }
            _ => None,
        };

        Ok(Self {
            api_base_url,
            ws_base_url,
            poll_interval,
            request_timeout,
            credentials,
        })
    }

    /// Defaults pointed at `api_base_url`.
    pub fn for_api(api_base_url: &str) -> Result<Self, ClientError> {
        Self::from_vars(|key| (key == "API_BASE_URL").then(|| api_base_url.to_string()))
    }

    pub fn matchmaking_url(&self) -> String {
        format!("{}/matchmaking/find", self.api_base_url)
    }

    pub fn channel_url(&self, match_id: i64) -> String {
        format!("{}/ws/match/{}", self.ws_base_url, match_id)
    }

    pub fn account_url(&self, path: &str) -> String {
        format!("{}/auth/{}", self.api_base_url, path.trim_start_matches('/'))
    }
}

/// `http://` becomes `ws://`, `https://` becomes `wss://`.
pub fn ws_base_from(api_base_url: &str) -> Result<String, ClientError> {
    if let Some(rest) = api_base_url.strip_prefix("https://") {
        Ok(format!("wss://{rest}"))
    } else if let Some(rest) = api_base_url.strip_prefix("http://") {
        Ok(format!("ws://{rest}"))
    } else {
        Err(ClientError::Config(format!(
            "API_BASE_URL must start with http:// or https://, got {api_base_url}"
        )))
    }
}
