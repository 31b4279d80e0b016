//! Runs a [`MatchSession`] against real transports.
//!
//! Every input (user commands, matchmaking responses, channel events and
//! failures) goes through one queue and is applied to completion before the
//! next one is read. Effects returned by the session are performed in order.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use checkers_core::Coord;

use crate::clients::{ChannelConnector, ChannelHandle, Inbox, Matchmaker};
use crate::error::ClientError;
use crate::protocol::ClientMessage;
use crate::session::{Effect, MatchSession, SessionInput, Transition};

pub struct MatchDriver<M: Matchmaker, C: ChannelConnector> {
    session: MatchSession,
    matchmaker: Arc<M>,
    connector: Arc<C>,
    poll_interval: Duration,
    inbox: Inbox,
    queue: mpsc::UnboundedReceiver<SessionInput>,
    snapshots: watch::Sender<MatchSession>,
    poller: Option<JoinHandle<()>>,
    channel: Option<ChannelHandle>,
}

/// Front-end side of a running driver.
#[derive(Clone)]
pub struct SessionHandle {
    inbox: Inbox,
    snapshots: watch::Receiver<MatchSession>,
}

impl SessionHandle {
    pub fn find_match(&self) -> Result<(), ClientError> {
        self.push(SessionInput::FindMatch)
    }

    pub fn click(&self, at: Coord) -> Result<(), ClientError> {
        self.push(SessionInput::CellClick(at))
    }

    pub fn ping(&self) -> Result<(), ClientError> {
        self.push(SessionInput::Ping)
    }

    pub fn leave(&self) -> Result<(), ClientError> {
        self.push(SessionInput::Leave)
    }

    /// Latest session published by the driver.
    pub fn snapshot(&self) -> MatchSession {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<MatchSession> {
        self.snapshots.clone()
    }

    fn push(&self, input: SessionInput) -> Result<(), ClientError> {
        self.inbox.send(input).map_err(|_| ClientError::SessionClosed)
    }
}

impl<M: Matchmaker, C: ChannelConnector> MatchDriver<M, C> {
    pub fn new(matchmaker: Arc<M>, connector: Arc<C>, poll_interval: Duration) -> Self {
        let (inbox, queue) = mpsc::unbounded_channel();
        let session = MatchSession::new();
        let (snapshots, _) = watch::channel(session.clone());

        Self {
            session,
            matchmaker,
            connector,
            poll_interval,
            inbox,
            queue,
            snapshots,
            poller: None,
            channel: None,
        }
    }

    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            inbox: self.inbox.clone(),
            snapshots: self.snapshots.subscribe(),
        }
    }

    /// Process inputs until the session asks for teardown. Returns the final
    /// session.
    pub async fn run(mut self) -> MatchSession {
        while let Some(input) = self.queue.recv().await {
            debug!(?input, "Session input");
            let Transition { session, effects } = self.session.apply(input);
            self.session = session;

            let mut done = false;
            for effect in effects {
                if effect == Effect::Teardown {
                    done = true;
                    continue;
                }
                self.perform(effect).await;
            }

            self.snapshots.send_replace(self.session.clone());
            if done {
                break;
            }
        }

        self.teardown();
        info!(state = ?self.session.state(), "Match session ended");
        std::mem::take(&mut self.session)
    }

    async fn perform(&mut self, effect: Effect) {
        match effect {
            Effect::RequestMatch => {
                let matchmaker = Arc::clone(&self.matchmaker);
                let inbox = self.inbox.clone();
                tokio::spawn(async move {
                    let result = matchmaker.find_match().await;
                    let _ = inbox.send(SessionInput::Matchmaking(result.map_err(|e| e.to_string())));
                });
            }
            Effect::StartPolling => {
                self.stop_polling();
                self.poller = Some(tokio::spawn(poll_until_matched(
                    Arc::clone(&self.matchmaker),
                    self.poll_interval,
                    self.inbox.clone(),
                )));
                debug!(every_ms = self.poll_interval.as_millis() as u64, "Polling started");
            }
            Effect::StopPolling => self.stop_polling(),
            Effect::OpenChannel(match_id) => {
                self.close_channel();
                match self.connector.connect(match_id, self.inbox.clone()).await {
                    Ok(handle) => self.channel = Some(handle),
                    Err(e) => {
                        warn!(match_id, error = %e, "Could not open event channel");
                        let _ = self.inbox.send(SessionInput::ChannelFailed(e.to_string()));
                    }
                }
            }
            Effect::SendMove(mv) => match &self.channel {
                Some(channel) => channel.send(ClientMessage::Move { mv }),
                None => warn!(from = %mv.from, to = %mv.to, "No open channel, move not sent"),
            },
            Effect::SendPing => match &self.channel {
                Some(channel) => channel.ping(),
                None => warn!("No open channel, ping not sent"),
            },
            Effect::CloseChannel => self.close_channel(),
            Effect::Teardown => self.teardown(),
        }
    }

    fn stop_polling(&mut self) {
        if let Some(poller) = self.poller.take() {
            poller.abort();
            debug!("Polling stopped");
        }
    }

    fn close_channel(&mut self) {
        if let Some(channel) = self.channel.take() {
            channel.close();
            debug!("Event channel closed");
        }
    }

    fn teardown(&mut self) {
        self.stop_polling();
        self.close_channel();
    }
}

impl<M: Matchmaker, C: ChannelConnector> Drop for MatchDriver<M, C> {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Re-issues the matchmaking request every `every` until an opponent is
/// found or a request fails. The first request goes out one interval after
/// start.
async fn poll_until_matched<M: Matchmaker>(matchmaker: Arc<M>, every: Duration, inbox: Inbox) {
    let mut ticker = interval_at(Instant::now() + every, every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let result = matchmaker.find_match().await;
        let finished = !matches!(&result, Ok(res) if res.waiting);

        let input = SessionInput::Matchmaking(result.map_err(|e| e.to_string()));
        if inbox.send(input).is_err() || finished {
            break;
        }
    }
}
