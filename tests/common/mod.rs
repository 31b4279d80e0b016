//! In-process fake match authority for integration tests.
//!
//! Serves matchmaking, the match event channel and the account endpoints on
//! `127.0.0.1` with a random port.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};

use match_client::{MatchSession, SessionHandle};

pub const MATCH_ID: i64 = 42;
pub const EMAIL: &str = "ana@example.com";
pub const PASSWORD: &str = "hunter22";
const SESSION_COOKIE: &str = "session=abc123";

#[derive(Default, Clone, Copy)]
pub struct Options {
    /// Number of `waiting: true` answers before the match is paired.
    pub waiting_polls: usize,
    /// Reject matchmaking without a session cookie.
    pub require_login: bool,
    /// Send `match_finished` right after echoing the first move.
    pub finish_after_move: bool,
}

#[derive(Default)]
pub struct Recorded {
    pub find_calls: AtomicUsize,
    pub frames: Mutex<Vec<Value>>,
    pub handshake_cookies: Mutex<Vec<Option<String>>>,
}

impl Recorded {
    pub fn frames(&self) -> Vec<Value> {
        self.frames.lock().unwrap().clone()
    }
}

struct AppState {
    options: Options,
    remaining_waits: AtomicUsize,
    recorded: Arc<Recorded>,
}

pub struct Authority {
    /// REST base, e.g. `http://127.0.0.1:5555/api/v1`
    pub api_base_url: String,
    pub recorded: Arc<Recorded>,
}

/// Start a fake authority on a random local port.
pub async fn start(options: Options) -> Authority {
    let recorded = Arc::new(Recorded::default());
    let state = Arc::new(AppState {
        options,
        remaining_waits: AtomicUsize::new(options.waiting_polls),
        recorded: Arc::clone(&recorded),
    });

    let app = Router::new()
        .route("/api/v1/matchmaking/find", post(find_match))
        .route("/api/v1/ws/match/{id}", get(match_channel))
        .route("/api/v1/auth/register", post(register))
        .route("/api/v1/auth/login", post(login))
        .route("/api/v1/auth/me", get(me))
        .route("/api/v1/auth/refresh", post(refresh))
        .route("/api/v1/auth/logout", post(logout))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind fake authority");
    let addr = listener.local_addr().expect("No local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Fake authority crashed");
    });

    Authority {
        api_base_url: format!("http://{addr}/api/v1"),
        recorded,
    }
}

/// Wait up to two seconds for a session snapshot matching `f`.
pub async fn wait_for(
    handle: &SessionHandle,
    f: impl FnMut(&MatchSession) -> bool,
) -> MatchSession {
    let mut rx = handle.subscribe();
    let snapshot = tokio::time::timeout(Duration::from_secs(2), rx.wait_for(f))
        .await
        .expect("Timed out waiting for session")
        .expect("Driver stopped");
    MatchSession::clone(&snapshot)
}

/// Wait up to two seconds until the authority has seen `n` client frames.
pub async fn wait_for_frames(recorded: &Recorded, n: usize) -> Vec<Value> {
    for _ in 0..200 {
        let frames = recorded.frames();
        if frames.len() >= n {
            return frames;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("Timed out waiting for {n} client frames");
}

pub fn has_log(session: &MatchSession, needle: &str) -> bool {
    session.log().iter().any(|e| e.message.contains(needle))
}

fn logged_in(headers: &HeaderMap) -> bool {
    headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.split(';').any(|c| c.trim() == SESSION_COOKIE))
}

fn detail(status: StatusCode, detail: &str) -> Response {
    (status, Json(json!({ "detail": detail }))).into_response()
}

fn user() -> Value {
    json!({ "id": 7, "username": "ana", "email": EMAIL, "country": "PT" })
}

fn with_session(body: Value) -> Response {
    (
        [(header::SET_COOKIE, format!("{SESSION_COOKIE}; Path=/; HttpOnly"))],
        Json(body),
    )
        .into_response()
}

// ---- Matchmaking ----

async fn find_match(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    if state.options.require_login && !logged_in(&headers) {
        return detail(StatusCode::UNAUTHORIZED, "Not authenticated");
    }
    state.recorded.find_calls.fetch_add(1, Ordering::SeqCst);

    let waiting = state
        .remaining_waits
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok();

    Json(json!({
        "match": {
            "matchid": MATCH_ID,
            "status": if waiting { "waiting" } else { "ongoing" },
            "whiteuser": 1,
            "blackuser": if waiting { Value::Null } else { json!(2) },
        },
        "role": "white",
        "waiting": waiting,
    }))
    .into_response()
}

// ---- Event channel ----

async fn match_channel(
    ws: WebSocketUpgrade,
    Path(id): Path<i64>,
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let cookie = headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .map(String::from);
    state.recorded.handshake_cookies.lock().unwrap().push(cookie);

    ws.on_upgrade(move |socket| play(socket, id, state))
}

async fn play(socket: WebSocket, _id: i64, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let mut move_number = 0;

    let sync = json!({
        "type": "sync",
        "payload": { "your_role": "WHITE", "next_turn": "white", "moves": [] },
    });
    if sender.send(Message::Text(sync.to_string().into())).await.is_err() {
        return;
    }

    while let Some(Ok(msg)) = receiver.next().await {
        let text = match msg {
            Message::Text(text) => text,
            Message::Close(_) => break,
            _ => continue,
        };
        let Ok(frame) = serde_json::from_str::<Value>(text.as_str()) else {
            continue;
        };
        state.recorded.frames.lock().unwrap().push(frame.clone());

        let mut replies = Vec::new();
        match frame["type"].as_str() {
            Some("ping") => replies.push(json!({ "type": "pong", "payload": {} })),
            Some("move") => {
                move_number += 1;
                replies.push(json!({
                    "type": "move",
                    "payload": {
                        "move": frame["payload"]["move"],
                        "next_turn": "black",
                        "must_continue": false,
                        "move_number": move_number,
                        "player": "white",
                    },
                }));
                if state.options.finish_after_move {
                    replies.push(json!({
                        "type": "match_finished",
                        "payload": { "result": "white_wins", "reason": "resignation" },
                    }));
                }
            }
            _ => replies.push(json!({ "type": "error", "payload": { "detail": "Unsupported" } })),
        }

        for reply in replies {
            if sender.send(Message::Text(reply.to_string().into())).await.is_err() {
                return;
            }
        }
    }
}

// ---- Accounts ----

async fn register(Json(body): Json<Value>) -> Response {
    if body["username"].as_str().unwrap_or_default().is_empty() {
        return detail(StatusCode::UNPROCESSABLE_ENTITY, "Username is required");
    }
    with_session(json!({
        "user": {
            "id": "u-8",
            "username": body["username"],
            "email": body["email"],
            "country": body.get("country").cloned().unwrap_or(Value::Null),
        },
    }))
}

async fn login(Json(body): Json<Value>) -> Response {
    if body["email"] == EMAIL && body["password"] == PASSWORD {
        with_session(json!({ "user": user() }))
    } else {
        detail(StatusCode::UNAUTHORIZED, "Invalid credentials")
    }
}

async fn me(headers: HeaderMap) -> Response {
    if logged_in(&headers) {
        Json(user()).into_response()
    } else {
        detail(StatusCode::UNAUTHORIZED, "Not authenticated")
    }
}

async fn refresh(headers: HeaderMap) -> Response {
    if logged_in(&headers) {
        with_session(json!({}))
    } else {
        detail(StatusCode::UNAUTHORIZED, "Refresh token missing")
    }
}

async fn logout() -> Response {
    (
        [(header::SET_COOKIE, "session=; Path=/; Max-Age=0")],
        Json(json!({ "ok": true })),
    )
        .into_response()
}
