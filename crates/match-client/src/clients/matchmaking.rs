//! Matchmaking over HTTP

use reqwest::Client;
use tracing::debug;

use super::{error_detail, Matchmaker};
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::protocol::FindMatchResponse;

#[derive(Clone)]
pub struct HttpMatchmaker {
    client: Client,
    url: String,
}

impl HttpMatchmaker {
    pub fn new(client: Client, config: &ClientConfig) -> Self {
        Self {
            client,
            url: config.matchmaking_url(),
        }
    }
}

impl Matchmaker for HttpMatchmaker {
    async fn find_match(&self) -> Result<FindMatchResponse, ClientError> {
        let resp = self
            .client
            .post(&self.url)
            .json(&serde_json::json!({}))
            .send()
            .await
            .map_err(|e| ClientError::Matchmaking(format!("Request error: {e}")))?;

        if !resp.status().is_success() {
            return Err(ClientError::Matchmaking(error_detail(resp).await));
        }

        let body: FindMatchResponse = resp
            .json()
            .await
            .map_err(|e| ClientError::Matchmaking(format!("Invalid response: {e}")))?;

        debug!(
            match_id = body.match_info.matchid,
            waiting = body.waiting,
            role = ?body.role,
            "Matchmaking response"
        );
        Ok(body)
    }
}
