//! Board transitions for moves that have already been validated, either by
//! [`crate::rules`] or by the match authority.

use crate::board::Board;
use crate::rules::Move;

/// Plays `mv` on `board` and returns the resulting board.
///
/// No legality checks are made. A move whose coordinates fall off the board,
/// whose origin is empty, or whose destination is a light or occupied cell,
/// leaves the board as it was.
pub fn apply_move(board: &Board, mv: &Move) -> Board {
    if !mv.from.is_on_board() || !board.is_empty_playable(mv.to) {
        return board.clone();
    }
    let Some(mut piece) = board.piece_at(mv.from) else {
        return board.clone();
    };

    let mut next = board.clone();
    next.cell_mut(mv.from).piece = None;

    if let Some(over) = mv.midpoint() {
        next.cell_mut(over).piece = None;
    }

    if mv.to.row == piece.color.promotion_row() {
        piece.is_king = true;
    }
    next.cell_mut(mv.to).piece = Some(piece);

    next
}

/// Rebuilds a board from the canonical start by playing `moves` in order.
pub fn replay<'a, I>(moves: I) -> Board
where
    I: IntoIterator<Item = &'a Move>,
{
    moves
        .into_iter()
        .fold(Board::initial(), |board, mv| apply_move(&board, mv))
}
