//! Client error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Matchmaking failed: {0}")]
    Matchmaking(String),

    #[error("Channel failure: {0}")]
    Channel(String),

    #[error("Protocol violation: {0}")]
    Protocol(String),

    #[error("Account error: {0}")]
    Account(String),

    #[error("Match session has ended")]
    SessionClosed,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}
