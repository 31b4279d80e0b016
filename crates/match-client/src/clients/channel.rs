//! Match event channel over WebSocket

use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use reqwest::cookie::{CookieStore, Jar};
use reqwest::Url;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::COOKIE;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use super::{ChannelConnector, Inbox};
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::session::SessionInput;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Sending half of an open channel.
///
/// Dropping or closing the handle ends the outbound queue, which makes the
/// connection task send a close frame and exit.
pub struct ChannelHandle {
    outbound: mpsc::UnboundedSender<ClientMessage>,
    task: Option<JoinHandle<()>>,
}

impl ChannelHandle {
    pub fn new(outbound: mpsc::UnboundedSender<ClientMessage>, task: Option<JoinHandle<()>>) -> Self {
        Self { outbound, task }
    }

    /// Queue `message` for sending. Dropped with a warning once the
    /// connection is gone.
    pub fn send(&self, message: ClientMessage) {
        if let Err(e) = self.outbound.send(message) {
            warn!(dropped = ?e.0, "Channel is closed, message not sent");
        }
    }

    pub fn ping(&self) {
        self.send(ClientMessage::Ping {})
    }

    pub fn is_closed(&self) -> bool {
        self.outbound.is_closed()
    }

    /// Close the channel. The connection task finishes on its own after
    /// sending the close frame.
    pub fn close(self) -> Option<JoinHandle<()>> {
        let Self { outbound, task } = self;
        drop(outbound);
        task
    }
}

#[derive(Clone)]
pub struct WsConnector {
    config: ClientConfig,
    cookie_url: Option<Url>,
    cookies: Option<Arc<Jar>>,
}

impl WsConnector {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            config: config.clone(),
            cookie_url: Url::parse(&config.api_base_url).ok(),
            cookies: None,
        }
    }

    /// Attach the session cookies from `jar` to the handshake.
    pub fn with_cookies(mut self, jar: Arc<Jar>) -> Self {
        self.cookies = Some(jar);
        self
    }
}

impl ChannelConnector for WsConnector {
    async fn connect(&self, match_id: i64, inbox: Inbox) -> Result<ChannelHandle, ClientError> {
        let url = self.config.channel_url(match_id);
        let mut request = url.as_str().into_client_request()?;

        if let (Some(jar), Some(cookie_url)) = (&self.cookies, &self.cookie_url) {
            if let Some(value) = jar.cookies(cookie_url) {
                request.headers_mut().insert(COOKIE, value);
            }
        }

        let (stream, _) = connect_async(request)
            .await
            .map_err(|e| ClientError::Channel(format!("Failed to connect to {url}: {e}")))?;
        info!(match_id, "Event channel open");

        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(pump(stream, rx, inbox, match_id));
        Ok(ChannelHandle::new(tx, Some(task)))
    }
}

/// Moves frames both ways until either side ends.
async fn pump(
    stream: WsStream,
    mut outbound: mpsc::UnboundedReceiver<ClientMessage>,
    inbox: Inbox,
    match_id: i64,
) {
    let (mut sink, mut source) = stream.split();

    loop {
        tokio::select! {
            queued = outbound.recv() => match queued {
                Some(message) => {
                    let json = match serde_json::to_string(&message) {
                        Ok(json) => json,
                        Err(e) => {
                            warn!(error = %e, "Failed to encode outbound message");
                            continue;
                        }
                    };
                    debug!(match_id, %json, "WS <");
                    if let Err(e) = sink.send(Message::Text(json.into())).await {
                        let _ = inbox.send(SessionInput::ChannelFailed(format!("Send failed: {e}")));
                        break;
                    }
                }
                None => {
                    let _ = sink.send(Message::Close(None)).await;
                    debug!(match_id, "Event channel closed locally");
                    break;
                }
            },
            frame = source.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    debug!(match_id, text = text.as_str(), "WS >");
                    match ServerMessage::parse(text.as_str()) {
                        Ok(message) => {
                            if inbox.send(SessionInput::Channel(message)).is_err() {
                                break;
                            }
                        }
                        Err(e) => warn!(match_id, error = %e, "Dropping malformed event"),
                    }
                }
                Some(Ok(Message::Close(_))) | None => {
                    info!(match_id, "Event channel closed by server");
                    let _ = inbox.send(SessionInput::ChannelFailed("Connection closed by server".into()));
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(match_id, error = %e, "Event channel error");
                    let _ = inbox.send(SessionInput::ChannelFailed(format!("WebSocket error: {e}")));
                    break;
                }
            },
        }
    }
}
