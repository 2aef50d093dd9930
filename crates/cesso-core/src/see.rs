//! Static Exchange Evaluation (SEE).
//!
//! Determines the material outcome of a sequence of captures on a single square,
//! assuming both sides use their least valuable attacker at each step.

use crate::attacks::{bishop_attacks, king_attacks, knight_attacks, pawn_attacks, rook_attacks};
use crate::bitboard::Bitboard;
use crate::board::Board;
use crate::chess_move::{Move, MoveKind, PromotionPiece};
use crate::color::Color;
use crate::piece_kind::PieceKind;
use crate::square::Square;

/// Material values for SEE, indexed by `PieceKind::index()`.
const SEE_VALUE: [i32; 6] = [100, 320, 330, 500, 900, 20_000];

/// Compute all pieces that attack a given square with the given occupancy.
///
/// Uses all 6 attack functions. Sliding attacks use the provided `occ`
/// bitboard, which reveals X-ray attackers as pieces are removed.
fn attackers_of(sq: Square, occ: Bitboard, board: &Board) -> Bitboard {
    let knights = knight_attacks(sq) & board.pieces(PieceKind::Knight);
    let kings = king_attacks(sq) & board.pieces(PieceKind::King);
    let rook_like = rook_attacks(sq, occ)
        & (board.pieces(PieceKind::Rook) | board.pieces(PieceKind::Queen));
    let bishop_like = bishop_attacks(sq, occ)
        & (board.pieces(PieceKind::Bishop) | board.pieces(PieceKind::Queen));
    let white_pawns =
        pawn_attacks(Color::Black, sq) & board.pieces(PieceKind::Pawn) & board.side(Color::White);
    let black_pawns =
        pawn_attacks(Color::White, sq) & board.pieces(PieceKind::Pawn) & board.side(Color::Black);

    knights | kings | rook_like | bishop_like | white_pawns | black_pawns
}

/// Find the least valuable attacker from the given attacker set for a side.
///
/// Returns `(square, piece_kind)` of the least valuable attacker, or `None`.
fn least_valuable_attacker(
    attackers: Bitboard,
    side: Bitboard,
    board: &Board,
) -> Option<(Square, PieceKind)> {
    // Iterate in PieceKind order (Pawn=0 .. King=5) — already sorted by value
    for kind in PieceKind::ALL {
        let candidates = attackers & side & board.pieces(kind);
        if let Some(sq) = candidates.lsb() {
            return Some((sq, kind));
        }
    }
    None
}

/// Full Static Exchange Evaluation.
///
/// Returns the material gain/loss from the side-to-move's perspective
/// after all profitable recaptures on the target square.
pub fn see(board: &Board, mv: Move) -> i32 {
    let src = mv.source();
    let dst = mv.dest();
    let mut occ = board.occupied();

    let attacker_kind = board.piece_on(src).unwrap_or(PieceKind::Pawn);

    let victim_value = if mv.kind() == MoveKind::EnPassant {
        SEE_VALUE[PieceKind::Pawn.index()]
    } else if let Some(victim) = board.piece_on(dst) {
        SEE_VALUE[victim.index()]
    } else {
        0
    };

    let attacker_value = if mv.kind() == MoveKind::Promotion {
        let promo_kind = match mv.promotion_piece() {
            PromotionPiece::Knight => PieceKind::Knight,
            PromotionPiece::Bishop => PieceKind::Bishop,
            PromotionPiece::Rook => PieceKind::Rook,
            PromotionPiece::Queen => PieceKind::Queen,
        };
        SEE_VALUE[promo_kind.index()]
    } else {
        SEE_VALUE[attacker_kind.index()]
    };

    occ = occ.without(src);

    if mv.kind() == MoveKind::EnPassant {
        let captured_idx = if board.side_to_move() == Color::White {
            dst.index().wrapping_sub(8) as u8
        } else {
            (dst.index() + 8) as u8
        };
        if let Some(ep_sq) = Square::from_index(captured_idx) {
            occ = occ.without(ep_sq);
        }
    }

    let mut gain = [0i32; 32];
    let mut depth = 0usize;
    gain[0] = victim_value;

    let mut next_victim_value = attacker_value;
    let mut side_to_move = !board.side_to_move();

    let mut all_attackers = attackers_of(dst, occ, board);
    all_attackers &= occ;

    loop {
        let side_bb = board.side(side_to_move);
        let Some((sq, kind)) = least_valuable_attacker(all_attackers, side_bb, board) else {
            break;
        };

        depth += 1;
        if depth >= 32 {
            break;
        }

        gain[depth] = next_victim_value - gain[depth - 1];
        next_victim_value = SEE_VALUE[kind.index()];
        occ = occ.without(sq);

        if kind == PieceKind::Pawn || kind == PieceKind::Bishop || kind == PieceKind::Queen {
            all_attackers |= bishop_attacks(dst, occ)
                & (board.pieces(PieceKind::Bishop) | board.pieces(PieceKind::Queen));
        }
        if kind == PieceKind::Rook || kind == PieceKind::Queen {
            all_attackers |= rook_attacks(dst, occ)
                & (board.pieces(PieceKind::Rook) | board.pieces(PieceKind::Queen));
        }
        all_attackers &= occ;

        side_to_move = !side_to_move;
    }

    while depth > 0 {
        depth -= 1;
        gain[depth] = -((-gain[depth]).max(gain[depth + 1]));
    }

    gain[0]
}

/// Threshold version of SEE: returns true if the SEE score >= threshold.
///
/// More efficient than `see(board, mv) >= threshold` because it can
/// exit early once the result is determined.
pub fn see_ge(board: &Board, mv: Move, threshold: i32) -> bool {
    see(board, mv) >= threshold
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::movegen::generate_legal_moves;

    fn find_move(board: &Board, from: &str, to: &str) -> Move {
        let moves = generate_legal_moves(board);
        let from_sq = Square::from_algebraic(from).unwrap();
        let to_sq = Square::from_algebraic(to).unwrap();
        moves
            .as_slice()
            .iter()
            .find(|m| {
                m.source() == from_sq
                    && m.dest() == to_sq
                    && m.kind() != MoveKind::Promotion
            })
            .copied()
            .unwrap_or_else(|| {
                moves
                    .as_slice()
                    .iter()
                    .find(|m| m.source() == from_sq && m.dest() == to_sq)
                    .copied()
                    .expect("move not found")
            })
    }

    #[test]
    fn pawn_takes_undefended_knight() {
        let board: Board = "4k3/8/8/3n4/4P3/8/8/4K3 w - - 0 1".parse().unwrap();
        let mv = find_move(&board, "e4", "d5");
        assert_eq!(see(&board, mv), 320);
    }

    #[test]
    fn pawn_takes_defended_knight() {
        let board: Board = "4k3/8/4p3/3n4/4P3/8/8/4K3 w - - 0 1".parse().unwrap();
        let mv = find_move(&board, "e4", "d5");
        assert_eq!(see(&board, mv), 220);
    }

    #[test]
    fn queen_takes_defended_pawn_loses() {
        let board: Board = "4k3/8/3p4/2p5/8/4Q3/8/4K3 w - - 0 1".parse().unwrap();
        let mv = find_move(&board, "e3", "c5");
        assert!(see(&board, mv) < 0);
    }

    #[test]
    fn equal_trade() {
        let board: Board = "4k3/8/8/3n4/8/4N3/8/4K3 w - - 0 1".parse().unwrap();
        let mv = find_move(&board, "e3", "d5");
        assert_eq!(see(&board, mv), 320);
    }

    #[test]
    fn see_ge_threshold() {
        let board: Board = "4k3/8/8/3n4/4P3/8/8/4K3 w - - 0 1".parse().unwrap();
        let mv = find_move(&board, "e4", "d5");
        assert!(see_ge(&board, mv, 0));
        assert!(see_ge(&board, mv, 300));
        assert!(!see_ge(&board, mv, 400));
    }
}
