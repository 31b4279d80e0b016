//! Checkers rules: board model, legal move generation and move application.

pub mod apply;
pub mod board;
pub mod rules;

pub use apply::{apply_move, replay};
pub use board::{Board, BoardError, Cell, Color, Coord, Piece, BOARD_SIZE};
pub use rules::{
    all_legal_moves, can_select, has_legal_move, legal_moves_for_piece, must_capture,
    piece_moves, validate_move, IllegalMove, Move, MoveSet,
};
