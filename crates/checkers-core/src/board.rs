//! 8x8 checkers board.
//!
//! Only dark squares (`(row + col)` odd) are playable. Rows 0-2 start with
//! BLACK men, rows 5-7 with RED men. Boards are values: every update goes
//! through a method that returns a new board.

use std::fmt;

use serde::{Deserialize, Serialize};

pub const BOARD_SIZE: usize = 8;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BoardError {
    #[error("coordinate ({0}, {1}) is off the board")]
    OutOfBounds(i32, i32),

    #[error("cell {0} is not playable")]
    NotPlayable(Coord),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Color {
    Red,
    Black,
}

impl Color {
    pub fn opponent(self) -> Self {
        match self {
            Color::Red => Color::Black,
            Color::Black => Color::Red,
        }
    }

    /// Row delta of a forward step. RED starts at the bottom and moves up.
    pub fn forward(self) -> i32 {
        match self {
            Color::Red => -1,
            Color::Black => 1,
        }
    }

    /// Back rank of the opponent, where a man of this color is crowned.
    pub fn promotion_row(self) -> u8 {
        match self {
            Color::Red => 0,
            Color::Black => (BOARD_SIZE - 1) as u8,
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Color::Red => write!(f, "RED"),
            Color::Black => write!(f, "BLACK"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Piece {
    pub id: u32,
    pub color: Color,
    pub is_king: bool,
}

impl Piece {
    pub fn man(id: u32, color: Color) -> Self {
        Self { id, color, is_king: false }
    }

    pub fn king(id: u32, color: Color) -> Self {
        Self { id, color, is_king: true }
    }
}

/// A cell position. Serialized as `[row, col]` to match the wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "[u8; 2]", into = "[u8; 2]")]
pub struct Coord {
    pub row: u8,
    pub col: u8,
}

impl Coord {
    pub fn new(row: i32, col: i32) -> Result<Self, BoardError> {
        if Self::in_bounds(row, col) {
            Ok(Self { row: row as u8, col: col as u8 })
        } else {
            Err(BoardError::OutOfBounds(row, col))
        }
    }

    pub fn in_bounds(row: i32, col: i32) -> bool {
        (0..BOARD_SIZE as i32).contains(&row) && (0..BOARD_SIZE as i32).contains(&col)
    }

    /// Whether this coordinate lies on the board. Coordinates decoded from
    /// the wire are not range checked, so callers that index must ask.
    pub fn is_on_board(self) -> bool {
        (self.row as usize) < BOARD_SIZE && (self.col as usize) < BOARD_SIZE
    }

    pub fn is_playable(self) -> bool {
        (self.row as u16 + self.col as u16) % 2 == 1
    }

    pub fn offset(self, dr: i32, dc: i32) -> Option<Self> {
        Self::new(self.row as i32 + dr, self.col as i32 + dc).ok()
    }
}

impl From<[u8; 2]> for Coord {
    fn from([row, col]: [u8; 2]) -> Self {
        Self { row, col }
    }
}

impl From<Coord> for [u8; 2] {
    fn from(c: Coord) -> Self {
        [c.row, c.col]
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Cell {
    pub row: u8,
    pub col: u8,
    pub playable: bool,
    pub piece: Option<Piece>,
}

impl Cell {
    pub fn coord(&self) -> Coord {
        Coord { row: self.row, col: self.col }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    cells: [[Cell; BOARD_SIZE]; BOARD_SIZE],
}

impl Board {
    /// A board with every cell empty.
    pub fn empty() -> Self {
        let cells = std::array::from_fn(|row| {
            std::array::from_fn(|col| Cell {
                row: row as u8,
                col: col as u8,
                playable: (row + col) % 2 == 1,
                piece: None,
            })
        });
        Self { cells }
    }

    /// Canonical starting position. Ids are handed out in row-major order.
    pub fn initial() -> Self {
        let mut board = Self::empty();
        let mut next_id = 1;

        for row in board.cells.iter_mut() {
            for cell in row.iter_mut() {
                if !cell.playable {
                    continue;
                }
                let color = match cell.row {
                    0..=2 => Color::Black,
                    5..=7 => Color::Red,
                    _ => continue,
                };
                cell.piece = Some(Piece::man(next_id, color));
                next_id += 1;
            }
        }

        board
    }

    /// Returns a copy of this board with `piece` placed at `at`.
    pub fn with_piece(&self, at: Coord, piece: Piece) -> Result<Self, BoardError> {
        if !at.is_on_board() {
            return Err(BoardError::OutOfBounds(at.row as i32, at.col as i32));
        }
        if !at.is_playable() {
            return Err(BoardError::NotPlayable(at));
        }
        let mut next = self.clone();
        next.cells[at.row as usize][at.col as usize].piece = Some(piece);
        Ok(next)
    }

    /// Returns a copy of this board with `at` emptied.
    pub fn without_piece(&self, at: Coord) -> Self {
        let mut next = self.clone();
        if at.is_on_board() {
            next.cells[at.row as usize][at.col as usize].piece = None;
        }
        next
    }

    /// Panics if `at` is off the board.
    pub fn cell(&self, at: Coord) -> &Cell {
        &self.cells[at.row as usize][at.col as usize]
    }

    pub fn piece_at(&self, at: Coord) -> Option<Piece> {
        if at.is_on_board() {
            self.cell(at).piece
        } else {
            None
        }
    }

    pub fn is_empty_playable(&self, at: Coord) -> bool {
        at.is_on_board() && at.is_playable() && self.cell(at).piece.is_none()
    }

    pub fn rows(&self) -> impl Iterator<Item = &[Cell; BOARD_SIZE]> {
        self.cells.iter()
    }

    pub fn cells(&self) -> impl Iterator<Item = &Cell> {
        self.cells.iter().flatten()
    }

    /// Every piece of `color` with its position, row-major.
    pub fn pieces(&self, color: Color) -> impl Iterator<Item = (Coord, Piece)> + '_ {
        self.cells().filter_map(move |cell| match cell.piece {
            Some(p) if p.color == color => Some((cell.coord(), p)),
            _ => None,
        })
    }

    pub fn count(&self, color: Color) -> usize {
        self.pieces(color).count()
    }

    pub fn piece_count(&self) -> usize {
        self.cells().filter(|c| c.piece.is_some()).count()
    }

    pub(crate) fn cell_mut(&mut self, at: Coord) -> &mut Cell {
        &mut self.cells[at.row as usize][at.col as usize]
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::initial()
    }
}
