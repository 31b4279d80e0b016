//! Match session state machine.
//!
//! A [`MatchSession`] is a value. [`MatchSession::apply`] consumes one input
//! and returns the next session together with the side effects the driver
//! must perform (network requests, channel traffic). Nothing in here does IO.
//!
//! The board only changes on authority events (`sync`, `move`). A local
//! click that forms a legal move produces a [`Effect::SendMove`]; the board
//! moves when the authority echoes the move back.

use chrono::{DateTime, Utc};
use tracing::debug;

use checkers_core::{
    apply_move, can_select, has_legal_move, legal_moves_for_piece, piece_moves, replay,
    validate_move, IllegalMove,
};
use checkers_core::{Board, Color, Coord, Move};

use crate::protocol::{FindMatchResponse, MatchInfo, MovePayload, Role, ServerMessage, SyncPayload};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Finding,
    Waiting,
    Playing,
    Error,
    Finished,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionInput {
    /// User asked for a match.
    FindMatch,
    /// Result of a matchmaking request, first or polled.
    Matchmaking(Result<FindMatchResponse, String>),
    /// One decoded event from the channel.
    Channel(ServerMessage),
    /// The channel could not be opened, broke, or was closed by the peer.
    ChannelFailed(String),
    /// User clicked a cell.
    CellClick(Coord),
    /// User asked for a keep-alive ping.
    Ping,
    /// User navigated away.
    Leave,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    RequestMatch,
    StartPolling,
    StopPolling,
    OpenChannel(i64),
    SendMove(Move),
    SendPing,
    CloseChannel,
    /// Stop polling, close the channel and end the session.
    Teardown,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub at: DateTime<Utc>,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct Transition {
    pub session: MatchSession,
    pub effects: Vec<Effect>,
}

#[derive(Debug, Clone)]
pub struct MatchSession {
    state: SessionState,
    match_info: Option<MatchInfo>,
    role: Option<Role>,
    next_turn: Option<Role>,
    board: Board,
    selected: Option<Coord>,
    forced_chain: Option<Coord>,
    log: Vec<LogEntry>,
}

impl Default for MatchSession {
    fn default() -> Self {
        Self::new()
    }
}

impl MatchSession {
    pub fn new() -> Self {
        Self {
            state: SessionState::Idle,
            match_info: None,
            role: None,
            next_turn: None,
            board: Board::initial(),
            selected: None,
            forced_chain: None,
            log: Vec::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn match_info(&self) -> Option<&MatchInfo> {
        self.match_info.as_ref()
    }

    pub fn match_id(&self) -> Option<i64> {
        self.match_info.as_ref().map(|m| m.matchid)
    }

    pub fn role(&self) -> Option<Role> {
        self.role
    }

    pub fn next_turn(&self) -> Option<Role> {
        self.next_turn
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn selected(&self) -> Option<Coord> {
        self.selected
    }

    pub fn forced_chain(&self) -> Option<Coord> {
        self.forced_chain
    }

    pub fn log(&self) -> &[LogEntry] {
        &self.log
    }

    pub fn my_turn(&self) -> bool {
        matches!((self.role, self.next_turn), (Some(me), Some(turn)) if me == turn)
    }

    pub fn player_color(&self) -> Option<Color> {
        self.role.map(Role::color)
    }

    /// Moves the selected piece may make now, for highlighting.
    pub fn legal_targets(&self) -> Vec<Move> {
        match (self.selected, self.player_color()) {
            (Some(sel), Some(me)) => self.candidate_moves(sel, me),
            _ => Vec::new(),
        }
    }

    pub fn apply(&self, input: SessionInput) -> Transition {
        let mut next = self.clone();
        let mut effects = Vec::new();

        match input {
            SessionInput::FindMatch => next.on_find_match(&mut effects),
            SessionInput::Matchmaking(result) => next.on_matchmaking(result, &mut effects),
            SessionInput::Channel(message) => next.on_channel(message, &mut effects),
            SessionInput::ChannelFailed(detail) => next.on_channel_failed(detail, &mut effects),
            SessionInput::CellClick(at) => next.on_cell_click(at, &mut effects),
            SessionInput::Ping => {
                if next.state == SessionState::Playing {
                    effects.push(Effect::SendPing);
                }
            }
            SessionInput::Leave => effects.push(Effect::Teardown),
        }

        Transition { session: next, effects }
    }

    fn push_log(&mut self, message: impl Into<String>) {
        self.log.push(LogEntry { at: Utc::now(), message: message.into() });
    }

    fn on_find_match(&mut self, effects: &mut Vec<Effect>) {
        if matches!(
            self.state,
            SessionState::Finding | SessionState::Waiting | SessionState::Playing
        ) {
            debug!(state = ?self.state, "Ignoring find-match request, session busy");
            return;
        }

        *self = Self::new();
        self.state = SessionState::Finding;
        self.push_log("Finding match...");
        effects.push(Effect::RequestMatch);
    }

    fn on_matchmaking(&mut self, result: Result<FindMatchResponse, String>, effects: &mut Vec<Effect>) {
        let polling = match self.state {
            SessionState::Finding => false,
            SessionState::Waiting => true,
            state => {
                debug!(?state, "Dropping stale matchmaking response");
                return;
            }
        };

        let res = match result {
            Ok(res) => res,
            Err(e) => {
                self.state = SessionState::Error;
                if polling {
                    self.push_log(format!("Polling error: {e}"));
                    effects.push(Effect::StopPolling);
                } else {
                    self.push_log(format!("Error finding match: {e}"));
                }
                return;
            }
        };

        let match_id = res.match_info.matchid;
        let role = role_label(res.role);
        self.match_info = Some(res.match_info);
        self.role = res.role;

        match (polling, res.waiting) {
            (false, true) => {
                self.state = SessionState::Waiting;
                self.push_log(format!("Waiting match #{match_id} as {role}"));
                effects.push(Effect::StartPolling);
            }
            (false, false) => {
                self.state = SessionState::Playing;
                self.push_log(format!("Joined match #{match_id} as {role}. Connecting..."));
                effects.push(Effect::OpenChannel(match_id));
            }
            (true, true) => self.push_log("Still waiting..."),
            (true, false) => {
                self.state = SessionState::Playing;
                self.push_log("Opponent found. Connecting...");
                effects.push(Effect::StopPolling);
                effects.push(Effect::OpenChannel(match_id));
            }
        }
    }

    fn on_channel(&mut self, message: ServerMessage, effects: &mut Vec<Effect>) {
        if self.state != SessionState::Playing {
            debug!(state = ?self.state, "Dropping channel event outside of play");
            return;
        }

        match message {
            ServerMessage::Sync(payload) => self.on_sync(payload),
            ServerMessage::Move(payload) => self.on_move(payload),
            ServerMessage::Error(payload) => {
                let detail = payload.detail.unwrap_or_else(|| "unknown error".into());
                self.push_log(format!("WS ERROR: {detail}"));
            }
            ServerMessage::MatchFinished(payload) => {
                self.state = SessionState::Finished;
                self.next_turn = None;
                self.selected = None;
                self.forced_chain = None;
                self.push_log(format!(
                    "MATCH FINISHED: result={} reason={}",
                    payload.result.as_deref().unwrap_or("unknown"),
                    payload.reason.as_deref().unwrap_or("unknown"),
                ));
                effects.push(Effect::CloseChannel);
            }
            ServerMessage::Pong => debug!("Pong"),
            ServerMessage::Unknown(kind) => {
                self.push_log(format!("Ignored unknown event type '{kind}'"));
            }
        }
    }

    fn on_sync(&mut self, payload: SyncPayload) {
        self.role = payload.your_role;
        self.next_turn = payload.next_turn;
        self.board = replay(payload.moves.iter().filter_map(|entry| entry.mv.as_ref()));
        self.selected = None;
        self.forced_chain = None;
        self.push_log(format!("SYNC: moves={}", payload.moves.len()));
        self.note_if_stuck();
    }

    /// The authority decides when a match ends; this only tells the player.
    fn note_if_stuck(&mut self) {
        if !self.my_turn() {
            return;
        }
        if let Some(me) = self.player_color() {
            if !has_legal_move(&self.board, me) {
                self.push_log(format!("No legal moves for {me}"));
            }
        }
    }

    fn on_move(&mut self, payload: MovePayload) {
        self.next_turn = payload.next_turn;

        match payload.mv {
            Some(mv) => {
                self.board = apply_move(&self.board, &mv);
                if payload.must_continue {
                    self.selected = Some(mv.to);
                    self.forced_chain = Some(mv.to);
                    self.push_log("CAPTURE: continue chain");
                } else {
                    self.selected = None;
                    self.forced_chain = None;
                }
            }
            None => {
                self.selected = None;
                self.forced_chain = None;
                self.push_log("Ignored move event without a move");
            }
        }

        self.push_log(format!(
            "MOVE #{} by {}",
            payload.move_number.as_deref().unwrap_or("?"),
            payload.player.as_deref().unwrap_or("?"),
        ));
        self.note_if_stuck();
    }

    fn on_channel_failed(&mut self, detail: String, effects: &mut Vec<Effect>) {
        if self.state != SessionState::Playing {
            debug!(state = ?self.state, %detail, "Ignoring channel failure outside of play");
            return;
        }
        self.state = SessionState::Error;
        self.next_turn = None;
        self.selected = None;
        self.forced_chain = None;
        self.push_log(format!("Channel error: {detail}"));
        effects.push(Effect::CloseChannel);
    }

    /// Moves the piece at `from` may be asked to make. While a chain is
    /// forced only jumps count.
    fn candidate_moves(&self, from: Coord, me: Color) -> Vec<Move> {
        if self.forced_chain.is_some() {
            piece_moves(&self.board, from, me).captures
        } else {
            legal_moves_for_piece(&self.board, from, me)
        }
    }

    fn on_cell_click(&mut self, at: Coord, effects: &mut Vec<Effect>) {
        if self.state != SessionState::Playing || !self.my_turn() || !at.is_on_board() {
            return;
        }
        let Some(me) = self.player_color() else {
            return;
        };

        if let Some(pinned) = self.forced_chain {
            self.selected = Some(pinned);
        }

        let Some(selected) = self.selected else {
            if can_select(&self.board, at, me) {
                self.selected = Some(at);
            } else {
                debug!(%at, "Piece not selectable");
            }
            return;
        };

        let own_piece = matches!(self.board.piece_at(at), Some(p) if p.color == me);
        if self.forced_chain.is_none() && own_piece {
            if at == selected {
                self.selected = None;
            } else if can_select(&self.board, at, me) {
                self.selected = Some(at);
            }
            return;
        }

        let checked = if self.forced_chain.is_some() {
            self.candidate_moves(selected, me)
                .into_iter()
                .find(|mv| mv.same_path(selected, at))
                .ok_or(IllegalMove::Unreachable(selected, at))
        } else {
            validate_move(&self.board, me, selected, at)
        };

        match checked {
            Ok(mv) => {
                self.push_log(format!("Submitted move {} -> {}", mv.from, mv.to));
                effects.push(Effect::SendMove(mv));
            }
            Err(reason) => debug!(from = %selected, to = %at, %reason, "Illegal move attempt ignored"),
        }
    }
}

fn role_label(role: Option<Role>) -> String {
    role.map(|r| r.to_string()).unwrap_or_else(|| "unknown".into())
}
