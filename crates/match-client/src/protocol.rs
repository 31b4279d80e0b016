//! Wire types for the matchmaking endpoint and the match event channel.
//!
//! The authority is lenient about shapes (roles in any case, optional
//! fields, numbers where strings are expected), so inbound payloads are
//! decoded leniently and anything unrecognised degrades to "absent".

use std::fmt;

use checkers_core::{Color, Move};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::ClientError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    White,
    Black,
}

impl Role {
    /// Case-insensitive; anything other than white/black is `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "white" => Some(Role::White),
            "black" => Some(Role::Black),
            _ => None,
        }
    }

    /// White plays the RED pieces.
    pub fn color(self) -> Color {
        match self {
            Role::White => Color::Red,
            Role::Black => Color::Black,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::White => write!(f, "white"),
            Role::Black => write!(f, "black"),
        }
    }
}

fn lenient_role<'de, D>(deserializer: D) -> Result<Option<Role>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(Value::as_str).and_then(Role::parse))
}

/// A move that does not decode (missing `to`, negative coordinates, ...)
/// reads as absent so the rest of the event still applies.
fn lenient_move<'de, D>(deserializer: D) -> Result<Option<Move>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| serde_json::from_value(v).ok()))
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    })
}

fn lenient_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Bool(b)) => b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
        Some(Value::Null) | None => false,
    })
}

// ---- Matchmaking ----

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchInfo {
    #[serde(alias = "matchId", alias = "match_id")]
    pub matchid: i64,
    #[serde(default)]
    pub status: String,
    #[serde(default, alias = "whiteUser", alias = "white_user")]
    pub whiteuser: Option<i64>,
    #[serde(default, alias = "blackUser", alias = "black_user")]
    pub blackuser: Option<i64>,
    #[serde(default, alias = "startedAt", alias = "started_at")]
    pub startedat: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FindMatchResponse {
    #[serde(rename = "match")]
    pub match_info: MatchInfo,
    #[serde(default, deserialize_with = "lenient_role")]
    pub role: Option<Role>,
    #[serde(default)]
    pub waiting: bool,
}

// ---- Event channel: inbound ----

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct SyncEntry {
    #[serde(default, rename = "move", deserialize_with = "lenient_move")]
    pub mv: Option<Move>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct SyncPayload {
    #[serde(default, deserialize_with = "lenient_role")]
    pub your_role: Option<Role>,
    #[serde(default, deserialize_with = "lenient_role")]
    pub next_turn: Option<Role>,
    #[serde(default)]
    pub moves: Vec<SyncEntry>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct MovePayload {
    #[serde(default, rename = "move", deserialize_with = "lenient_move")]
    pub mv: Option<Move>,
    #[serde(default, deserialize_with = "lenient_role")]
    pub next_turn: Option<Role>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub must_continue: bool,
    #[serde(default, deserialize_with = "lenient_string")]
    pub move_number: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub player: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct ErrorPayload {
    #[serde(default, deserialize_with = "lenient_string")]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct FinishedPayload {
    #[serde(default, deserialize_with = "lenient_string")]
    pub result: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    Sync(SyncPayload),
    Move(MovePayload),
    Error(ErrorPayload),
    MatchFinished(FinishedPayload),
    Pong,
    Unknown(String),
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: Value,
}

impl ServerMessage {
    /// Decodes one text frame. The envelope is read first so that an unknown
    /// `type` is reported rather than rejected.
    pub fn parse(text: &str) -> Result<Self, ClientError> {
        let envelope: Envelope = serde_json::from_str(text)
            .map_err(|e| ClientError::Protocol(format!("invalid envelope: {e}")))?;

        let payload = match envelope.payload {
            Value::Null => Value::Object(Default::default()),
            other => other,
        };

        let message = match envelope.kind.as_str() {
            "sync" => ServerMessage::Sync(decode(&envelope.kind, payload)?),
            "move" => ServerMessage::Move(decode(&envelope.kind, payload)?),
            "error" => ServerMessage::Error(decode(&envelope.kind, payload)?),
            "match_finished" => ServerMessage::MatchFinished(decode(&envelope.kind, payload)?),
            "pong" => ServerMessage::Pong,
            _ => ServerMessage::Unknown(envelope.kind),
        };
        Ok(message)
    }
}

fn decode<T: serde::de::DeserializeOwned>(kind: &str, payload: Value) -> Result<T, ClientError> {
    serde_json::from_value(payload)
        .map_err(|e| ClientError::Protocol(format!("invalid {kind} payload: {e}")))
}

// ---- Event channel: outbound ----

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ClientMessage {
    Move {
        #[serde(rename = "move")]
        mv: Move,
    },
    Ping {},
}

#[cfg(test)]
mod tests {
    use super::*;
    use checkers_core::Coord;
    use serde_json::json;

    fn at(row: u8, col: u8) -> Coord {
        Coord { row, col }
    }

    #[test]
    fn test_role_parse_is_case_insensitive() {
        assert_eq!(Role::parse("WHITE"), Some(Role::White));
        assert_eq!(Role::parse(" black "), Some(Role::Black));
        assert_eq!(Role::parse("red"), None);
        assert_eq!(Role::White.color(), Color::Red);
        assert_eq!(Role::Black.color(), Color::Black);
    }

    #[test]
    fn test_find_match_response() {
        let body = json!({
            "match": {"matchid": 7, "status": "waiting", "whiteuser": 3, "blackuser": null},
            "role": "White",
            "waiting": true
        });
        let res: FindMatchResponse = serde_json::from_value(body).unwrap();
        assert_eq!(res.match_info.matchid, 7);
        assert_eq!(res.match_info.whiteuser, Some(3));
        assert_eq!(res.match_info.blackuser, None);
        assert_eq!(res.role, Some(Role::White));
        assert!(res.waiting);
    }

    #[test]
    fn test_find_match_response_camel_case() {
        let body = json!({
            "match": {"matchId": 9, "status": "ongoing", "whiteUser": 1, "blackUser": 2},
            "role": "black",
            "waiting": false
        });
        let res: FindMatchResponse = serde_json::from_value(body).unwrap();
        assert_eq!(res.match_info.matchid, 9);
        assert_eq!(res.match_info.blackuser, Some(2));
        assert_eq!(res.role, Some(Role::Black));
    }

    #[test]
    fn test_parse_sync() {
        let text = json!({
            "type": "sync",
            "payload": {
                "your_role": "black",
                "next_turn": "white",
                "moves": [
                    {"move": {"from": [5, 0], "to": [4, 1]}, "move_number": 1},
                    {"player": "black"}
                ]
            }
        })
        .to_string();

        let ServerMessage::Sync(sync) = ServerMessage::parse(&text).unwrap() else {
            panic!("expected sync");
        };
        assert_eq!(sync.your_role, Some(Role::Black));
        assert_eq!(sync.next_turn, Some(Role::White));
        assert_eq!(sync.moves.len(), 2);
        assert_eq!(sync.moves[0].mv, Some(Move::step(at(5, 0), at(4, 1))));
        assert_eq!(sync.moves[1].mv, None);
    }

    #[test]
    fn test_parse_move_lenient_fields() {
        let text = json!({
            "type": "move",
            "payload": {
                "move": {"from": [5, 0], "to": [3, 2], "capture": [4, 1]},
                "next_turn": "WHITE",
                "must_continue": true,
                "move_number": 12,
                "player": "white"
            }
        })
        .to_string();

        let ServerMessage::Move(mv) = ServerMessage::parse(&text).unwrap() else {
            panic!("expected move");
        };
        assert_eq!(mv.mv, Some(Move::jump(at(5, 0), at(3, 2), at(4, 1))));
        assert_eq!(mv.next_turn, Some(Role::White));
        assert!(mv.must_continue);
        assert_eq!(mv.move_number.as_deref(), Some("12"));
        assert_eq!(mv.player.as_deref(), Some("white"));
    }

    #[test]
    fn test_parse_move_with_broken_move_keeps_turn() {
        for bad in [json!({"from": [5, 0]}), json!({"from": [5, 0], "to": [-1, 2]}), json!("5,0-4,1")] {
            let text = json!({
                "type": "move",
                "payload": {"move": bad, "next_turn": "black", "must_continue": true}
            })
            .to_string();

            let ServerMessage::Move(mv) = ServerMessage::parse(&text).unwrap() else {
                panic!("expected move");
            };
            assert_eq!(mv.mv, None);
            assert_eq!(mv.next_turn, Some(Role::Black));
            assert!(mv.must_continue);
        }
    }

    #[test]
    fn test_parse_sync_skips_only_broken_entry() {
        let text = json!({
            "type": "sync",
            "payload": {
                "your_role": "white",
                "next_turn": "black",
                "moves": [
                    {"move": {"from": [5, 0], "to": [4, 1]}},
                    {"move": {"from": [2, 1]}},
                    {"move": {"from": [2, 3], "to": [3, 4]}}
                ]
            }
        })
        .to_string();

        let ServerMessage::Sync(sync) = ServerMessage::parse(&text).unwrap() else {
            panic!("expected sync");
        };
        assert_eq!(sync.next_turn, Some(Role::Black));
        let moves: Vec<Option<Move>> = sync.moves.iter().map(|e| e.mv).collect();
        assert_eq!(
            moves,
            vec![Some(Move::step(at(5, 0), at(4, 1))), None, Some(Move::step(at(2, 3), at(3, 4)))]
        );
    }

    #[test]
    fn test_parse_move_without_move_field() {
        let text = r#"{"type":"move","payload":{"next_turn":"black"}}"#;
        let ServerMessage::Move(mv) = ServerMessage::parse(text).unwrap() else {
            panic!("expected move");
        };
        assert_eq!(mv.mv, None);
        assert!(!mv.must_continue);
    }

    #[test]
    fn test_parse_other_types() {
        assert_eq!(
            ServerMessage::parse(r#"{"type":"error","payload":{"detail":"Not your turn"}}"#).unwrap(),
            ServerMessage::Error(ErrorPayload { detail: Some("Not your turn".into()) })
        );
        assert_eq!(
            ServerMessage::parse(r#"{"type":"match_finished","payload":{"result":"white_won","reason":"no_pieces"}}"#)
                .unwrap(),
            ServerMessage::MatchFinished(FinishedPayload {
                result: Some("white_won".into()),
                reason: Some("no_pieces".into()),
            })
        );
        assert_eq!(ServerMessage::parse(r#"{"type":"pong"}"#).unwrap(), ServerMessage::Pong);
        assert_eq!(
            ServerMessage::parse(r#"{"type":"chat","payload":{}}"#).unwrap(),
            ServerMessage::Unknown("chat".into())
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(ServerMessage::parse("not json"), Err(ClientError::Protocol(_))));
        assert!(matches!(
            ServerMessage::parse(r#"{"type":"move","payload":{"move":{"from":"a1"}}}"#),
            Err(ClientError::Protocol(_))
        ));
    }

    #[test]
    fn test_outbound_frames() {
        let mv = ClientMessage::Move { mv: Move::step(at(5, 0), at(4, 1)) };
        assert_eq!(
            serde_json::to_value(&mv).unwrap(),
            json!({"type": "move", "payload": {"move": {"from": [5, 0], "to": [4, 1]}}})
        );
        assert_eq!(
            serde_json::to_value(&ClientMessage::Ping {}).unwrap(),
            json!({"type": "ping", "payload": {}})
        );
    }
}
