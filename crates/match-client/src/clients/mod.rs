//! Transport adapters for the match authority.
//!
//! The driver only sees the [`Matchmaker`] and [`ChannelConnector`] traits;
//! the HTTP and WebSocket implementations live in the submodules.

pub mod account;
pub mod channel;
pub mod matchmaking;

use std::future::Future;
use std::sync::Arc;

use reqwest::cookie::Jar;
use reqwest::{Client, Response};
use tokio::sync::mpsc;

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::protocol::FindMatchResponse;
use crate::session::SessionInput;

pub use account::AccountClient;
pub use channel::{ChannelHandle, WsConnector};
pub use matchmaking::HttpMatchmaker;

/// Where transports deliver events for the session.
pub type Inbox = mpsc::UnboundedSender<SessionInput>;

pub trait Matchmaker: Send + Sync + 'static {
    /// Ask to be paired. Repeating the call while waiting is how polling works.
    fn find_match(&self) -> impl Future<Output = Result<FindMatchResponse, ClientError>> + Send;
}

pub trait ChannelConnector: Send + Sync + 'static {
    /// Open the event channel for `match_id`. Inbound events and transport
    /// failures are pushed into `inbox` until the returned handle is closed.
    fn connect(
        &self,
        match_id: i64,
        inbox: Inbox,
    ) -> impl Future<Output = Result<ChannelHandle, ClientError>> + Send;
}

/// Build the shared HTTP client. Cookies set by the account endpoints are
/// kept in `jar` and sent with every later request.
pub fn http_client(config: &ClientConfig, jar: Arc<Jar>) -> Result<Client, ClientError> {
    let client = Client::builder()
        .user_agent("CheckersClient/1.0")
        .timeout(config.request_timeout)
        .cookie_provider(jar)
        .build()?;
    Ok(client)
}

/// Pull a readable message out of a failed response. The authority answers
/// errors as `{"detail": "..."}`.
pub(crate) async fn error_detail(resp: Response) -> String {
    let status = resp.status();
    let text = match resp.text().await {
        Ok(text) => text,
        Err(e) => return format!("HTTP {status} (body read error: {e})"),
    };

    let detail = serde_json::from_str::<serde_json::Value>(&text)
        .ok()
        .and_then(|v| v.get("detail").and_then(|d| d.as_str()).map(String::from));

    match detail {
        Some(detail) => format!("HTTP {status}: {detail}"),
        None if text.trim().is_empty() => format!("HTTP {status}"),
        None => format!("HTTP {status}: {}", text.trim()),
    }
}
