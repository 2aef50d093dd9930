//! The root move list: every move under consideration at the search root,
//! restricted by UCI `searchmoves` and carrying each move's score from the
//! last iteration it was searched at.

use cesso_core::Move;

/// A candidate move at the search root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RootMove {
    pub mv: Move,
    /// Score from the most recently completed iteration.
    pub score: i32,
    /// Score from the iteration before that, for stability comparisons.
    pub previous_score: i32,
}

impl RootMove {
    pub fn new(mv: Move) -> Self {
        Self { mv, score: i32::MIN, previous_score: i32::MIN }
    }
}

/// Build the root move list, restricted to `search_moves` when it's
/// non-empty (UCI `go searchmoves ...`). An empty `search_moves` — the
/// common case — keeps every legal move.
pub fn build_root_moves(legal_moves: &[Move], search_moves: &[Move]) -> Vec<RootMove> {
    if search_moves.is_empty() {
        legal_moves.iter().copied().map(RootMove::new).collect()
    } else {
        legal_moves
            .iter()
            .copied()
            .filter(|mv| search_moves.contains(mv))
            .map(RootMove::new)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cesso_core::{Board, Square, generate_legal_moves};

    #[test]
    fn empty_search_moves_keeps_everything() {
        let board = Board::starting_position();
        let legal = generate_legal_moves(&board);
        let legal_vec: Vec<Move> = (0..legal.len()).map(|i| legal[i]).collect();
        let roots = build_root_moves(&legal_vec, &[]);
        assert_eq!(roots.len(), legal_vec.len());
    }

    #[test]
    fn search_moves_restricts_the_list() {
        let board = Board::starting_position();
        let legal = generate_legal_moves(&board);
        let legal_vec: Vec<Move> = (0..legal.len()).map(|i| legal[i]).collect();
        let e4 = Move::new(Square::E2, Square::E4);
        let roots = build_root_moves(&legal_vec, &[e4]);
        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].mv, e4);
    }
}
