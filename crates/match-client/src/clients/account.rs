//! Account endpoints (register, login, session check, refresh, logout).
//!
//! The authority keeps the session in cookies. The `Client` passed in must
//! share its cookie jar with the matchmaker and the channel connector, so
//! that a login here authenticates the later match traffic.

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::error_detail;
use crate::config::ClientConfig;
use crate::error::ClientError;

/// User ids arrive as numbers from some deployments and strings from others.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserId {
    Int(i64),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub surname: Option<String>,
    #[serde(default)]
    pub birthdate: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SignUp {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub surname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birthdate: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

#[derive(Serialize)]
struct Login<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct AuthResponse {
    #[serde(default)]
    user: Option<User>,
}

#[derive(Clone)]
pub struct AccountClient {
    client: Client,
    config: ClientConfig,
}

impl AccountClient {
    pub fn new(client: Client, config: &ClientConfig) -> Self {
        Self {
            client,
            config: config.clone(),
        }
    }

    pub async fn register(&self, payload: &SignUp) -> Result<User, ClientError> {
        let user = self.authenticate("register", payload).await?;
        info!(username = %user.username, "Registered");
        Ok(user)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<User, ClientError> {
        let user = self
            .authenticate("login", &Login { email, password })
            .await?;
        info!(username = %user.username, "Logged in");
        Ok(user)
    }

    /// Current user, or `None` when there is no valid session.
    pub async fn me(&self) -> Result<Option<User>, ClientError> {
        let resp = self.client.get(self.config.account_url("me")).send().await?;

        match resp.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                debug!("No active session");
                Ok(None)
            }
            status if status.is_success() => Ok(Some(resp.json().await?)),
            _ => Err(ClientError::Account(error_detail(resp).await)),
        }
    }

    pub async fn refresh(&self) -> Result<(), ClientError> {
        self.post_empty("refresh").await
    }

    pub async fn logout(&self) -> Result<(), ClientError> {
        self.post_empty("logout").await?;
        info!("Logged out");
        Ok(())
    }

    async fn authenticate<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<User, ClientError> {
        let resp = self
            .client
            .post(self.config.account_url(path))
            .json(body)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(ClientError::Account(error_detail(resp).await));
        }

        let body: AuthResponse = resp.json().await?;
        body.user
            .ok_or_else(|| ClientError::Protocol(format!("{path} response has no user")))
    }

    async fn post_empty(&self, path: &str) -> Result<(), ClientError> {
        let resp = self
            .client
            .post(self.config.account_url(path))
            .json(&serde_json::json!({}))
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(ClientError::Account(error_detail(resp).await));
        }
        Ok(())
    }
}
