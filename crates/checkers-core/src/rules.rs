//! Legal move generation.
//!
//! Men step and jump diagonally forward only; kings use all four diagonals.
//! A jump always spans exactly two cells over one opposing piece, for men
//! and kings alike. When any jump is available to the side to move, steps
//! are illegal for every piece of that side.
//!
//! Multi-jump sequencing is not handled here: each jump is a separate move
//! and the match authority decides whether the same piece must continue.

use serde::{Deserialize, Serialize};

use crate::board::{Board, Color, Coord};

const KING_DIRECTIONS: [(i32, i32); 4] = [(-1, -1), (-1, 1), (1, -1), (1, 1)];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Move {
    pub from: Coord,
    pub to: Coord,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capture: Option<Coord>,
}

impl Move {
    pub fn step(from: Coord, to: Coord) -> Self {
        Self { from, to, capture: None }
    }

    pub fn jump(from: Coord, to: Coord, over: Coord) -> Self {
        Self { from, to, capture: Some(over) }
    }

    fn deltas(&self) -> (i32, i32) {
        (
            self.to.row as i32 - self.from.row as i32,
            self.to.col as i32 - self.from.col as i32,
        )
    }

    /// A jump moves exactly two cells along both axes.
    pub fn is_capture(&self) -> bool {
        let (dr, dc) = self.deltas();
        dr.abs() == 2 && dc.abs() == 2
    }

    /// The jumped cell, computed from the geometry rather than `capture`.
    pub fn midpoint(&self) -> Option<Coord> {
        if !self.is_capture() {
            return None;
        }
        Some(Coord {
            row: ((self.from.row as u16 + self.to.row as u16) / 2) as u8,
            col: ((self.from.col as u16 + self.to.col as u16) / 2) as u8,
        })
    }

    pub fn same_path(&self, from: Coord, to: Coord) -> bool {
        self.from == from && self.to == to
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MoveSet {
    pub steps: Vec<Move>,
    pub captures: Vec<Move>,
}

impl MoveSet {
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty() && self.captures.is_empty()
    }

    fn extend(&mut self, other: MoveSet) {
        self.steps.extend(other.steps);
        self.captures.extend(other.captures);
    }
}

/// Why a requested move was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum IllegalMove {
    #[error("no piece at {0}")]
    NoPiece(Coord),

    #[error("piece at {0} belongs to the opponent")]
    NotYourPiece(Coord),

    #[error("a capture is available and must be taken")]
    CaptureRequired,

    #[error("{0} cannot reach {1}")]
    Unreachable(Coord, Coord),
}

fn directions(color: Color, is_king: bool) -> Vec<(i32, i32)> {
    if is_king {
        KING_DIRECTIONS.to_vec()
    } else {
        let dr = color.forward();
        vec![(dr, -1), (dr, 1)]
    }
}

/// Steps and jumps available to the piece at `at`, ignoring the mandatory
/// capture rule. Empty if the cell is empty or holds a piece of the other side.
pub fn piece_moves(board: &Board, at: Coord, side: Color) -> MoveSet {
    let mut moves = MoveSet::default();

    let piece = match board.piece_at(at) {
        Some(p) if p.color == side => p,
        _ => return moves,
    };

    for (dr, dc) in directions(piece.color, piece.is_king) {
        if let Some(next) = at.offset(dr, dc) {
            if board.is_empty_playable(next) {
                moves.steps.push(Move::step(at, next));
            }
        }

        let (Some(over), Some(landing)) = (at.offset(dr, dc), at.offset(2 * dr, 2 * dc)) else {
            continue;
        };
        if !board.is_empty_playable(landing) {
            continue;
        }
        if matches!(board.piece_at(over), Some(jumped) if jumped.color != side) {
            moves.captures.push(Move::jump(at, landing, over));
        }
    }

    moves
}

/// Union of [`piece_moves`] over every piece of `side`.
pub fn all_legal_moves(board: &Board, side: Color) -> MoveSet {
    let mut all = MoveSet::default();
    for (at, _) in board.pieces(side) {
        all.extend(piece_moves(board, at, side));
    }
    all
}

pub fn must_capture(board: &Board, side: Color) -> bool {
    board
        .pieces(side)
        .any(|(at, _)| !piece_moves(board, at, side).captures.is_empty())
}

/// Moves the piece at `at` may actually make this turn: its jumps when a
/// capture is mandatory anywhere on the board, otherwise its steps.
pub fn legal_moves_for_piece(board: &Board, at: Coord, side: Color) -> Vec<Move> {
    let own = piece_moves(board, at, side);
    if must_capture(board, side) {
        own.captures
    } else {
        own.steps
    }
}

/// Whether the piece at `at` may be picked up by `side` this turn.
pub fn can_select(board: &Board, at: Coord, side: Color) -> bool {
    match board.piece_at(at) {
        Some(p) if p.color == side => {}
        _ => return false,
    }
    if must_capture(board, side) {
        return !piece_moves(board, at, side).captures.is_empty();
    }
    true
}

/// Checks a `from -> to` request against the rules and returns the legal
/// move it denotes, with the jumped cell filled in.
pub fn validate_move(board: &Board, side: Color, from: Coord, to: Coord) -> Result<Move, IllegalMove> {
    match board.piece_at(from) {
        None => return Err(IllegalMove::NoPiece(from)),
        Some(p) if p.color != side => return Err(IllegalMove::NotYourPiece(from)),
        Some(_) => {}
    }

    let own = piece_moves(board, from, side);
    let mandatory = must_capture(board, side);
    let legal = if mandatory { &own.captures } else { &own.steps };

    if let Some(mv) = legal.iter().find(|m| m.same_path(from, to)) {
        return Ok(*mv);
    }

    if mandatory && (own.captures.is_empty() || own.steps.iter().any(|m| m.same_path(from, to))) {
        return Err(IllegalMove::CaptureRequired);
    }
    Err(IllegalMove::Unreachable(from, to))
}

/// Whether `side` has any legal move at all.
pub fn has_legal_move(board: &Board, side: Color) -> bool {
    !all_legal_moves(board, side).is_empty()
}
