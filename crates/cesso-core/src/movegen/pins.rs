//! Pin and check detection.

use crate::attacks::{between, bishop_attacks, knight_attacks, pawn_attacks, rook_attacks};
use crate::bitboard::Bitboard;
use crate::board::Board;
use crate::color::Color;
use crate::piece_kind::PieceKind;

/// Compute the set of checking pieces and the set of pinned friendly pieces.
///
/// Returns `(checkers, pinned)` where:
/// - `checkers`: bitboard of enemy pieces giving check to our king
/// - `pinned`: bitboard of our pieces that are pinned to our king
pub(crate) fn compute_checkers_and_pinned(board: &Board) -> (Bitboard, Bitboard) {
    let us = board.side_to_move();
    let them = us.flip();
    let king_sq = board.king_square(us);
    let our_pieces = board.side(us);
    let their_pieces = board.side(them);
    let occupied = board.occupied();

    let mut checkers = Bitboard::EMPTY;
    let mut pinned = Bitboard::EMPTY;

    // Knight checks
    checkers |= knight_attacks(king_sq) & board.pieces(PieceKind::Knight) & their_pieces;

    // Pawn checks
    checkers |= pawn_attacks(us, king_sq) & board.pieces(PieceKind::Pawn) & their_pieces;

    // Diagonal slider checks/pins (bishops and queens)
    let diag_sliders =
        (board.pieces(PieceKind::Bishop) | board.pieces(PieceKind::Queen)) & their_pieces;
    // Candidates: enemy diagonal sliders visible from the king on an empty board
    let mut diag_candidates = bishop_attacks(king_sq, Bitboard::EMPTY) & diag_sliders;
    while let Some((attacker_sq, rest)) = diag_candidates.pop_lsb() {
        diag_candidates = rest;
        let between_bb = between(king_sq, attacker_sq);
        let blockers = between_bb & occupied;
        match blockers.count() {
            0 => {
                // Direct check — no pieces between king and attacker
                checkers |= attacker_sq.bitboard();
            }
            1 => {
                // Exactly one blocker — if it's ours, it's pinned
                if let Some(blocker_sq) = blockers.lsb()
                    && our_pieces.contains(blocker_sq)
                {
                    pinned |= blocker_sq.bitboard();
                }
            }
            _ => {} // 2+ blockers: no check or pin
        }
    }

    // Orthogonal slider checks/pins (rooks and queens)
    let orth_sliders =
        (board.pieces(PieceKind::Rook) | board.pieces(PieceKind::Queen)) & their_pieces;
    // Candidates: enemy orthogonal sliders visible from the king on an empty board
    let mut orth_candidates = rook_attacks(king_sq, Bitboard::EMPTY) & orth_sliders;
    while let Some((attacker_sq, rest)) = orth_candidates.pop_lsb() {
        orth_candidates = rest;
        let between_bb = between(king_sq, attacker_sq);
        let blockers = between_bb & occupied;
        match blockers.count() {
            0 => {
                checkers |= attacker_sq.bitboard();
            }
            1 => {
                if let Some(blocker_sq) = blockers.lsb()
                    && our_pieces.contains(blocker_sq)
                {
                    pinned |= blocker_sq.bitboard();
                }
            }
            _ => {}
        }
    }

    (checkers, pinned)
}

/// Compute the blockers and pinners for `king_color`'s king.
///
/// `blockers` are pieces of *either* color sitting on the single square
/// between `king_color`'s king and an enemy slider; `pinners` are those
/// sliders. Calling with `king_color = side_to_move` and filtering
/// `blockers` by `board.side(king_color)` reproduces the `pinned` bitboard
/// above (moving one of those pieces off the ray is illegal). Calling with
/// `king_color = side_to_move.flip()` and filtering by the *mover's* color
/// instead gives the discovered-check candidates: friendly pieces whose
/// departure from the ray would expose the enemy king to one of our own
/// sliders.
pub(crate) fn compute_king_blockers(board: &Board, king_color: Color) -> (Bitboard, Bitboard) {
    let king_sq = board.king_square(king_color);
    let slider_side = king_color.flip();
    let slider_pieces = board.side(slider_side);
    let occupied = board.occupied();

    let mut blockers = Bitboard::EMPTY;
    let mut pinners = Bitboard::EMPTY;

    let diag_sliders =
        (board.pieces(PieceKind::Bishop) | board.pieces(PieceKind::Queen)) & slider_pieces;
    let mut diag_candidates = bishop_attacks(king_sq, Bitboard::EMPTY) & diag_sliders;
    while let Some((attacker_sq, rest)) = diag_candidates.pop_lsb() {
        diag_candidates = rest;
        let between_occ = between(king_sq, attacker_sq) & occupied;
        if between_occ.count() == 1 {
            blockers |= between_occ;
            pinners |= attacker_sq.bitboard();
        }
    }

    let orth_sliders =
        (board.pieces(PieceKind::Rook) | board.pieces(PieceKind::Queen)) & slider_pieces;
    let mut orth_candidates = rook_attacks(king_sq, Bitboard::EMPTY) & orth_sliders;
    while let Some((attacker_sq, rest)) = orth_candidates.pop_lsb() {
        orth_candidates = rest;
        let between_occ = between(king_sq, attacker_sq) & occupied;
        if between_occ.count() == 1 {
            blockers |= between_occ;
            pinners |= attacker_sq.bitboard();
        }
    }

    (blockers, pinners)
}

/// For each piece kind, the squares from which a piece of that kind — owned
/// by the side to move — would give direct check to the opposing king.
/// Queen is the union of the bishop and rook rays; king has none (a king can
/// never directly check the other king).
pub(crate) fn compute_check_squares(board: &Board) -> [Bitboard; PieceKind::COUNT] {
    let us = board.side_to_move();
    let them = us.flip();
    let their_king_sq = board.king_square(them);
    let occupied = board.occupied();

    let mut squares = [Bitboard::EMPTY; PieceKind::COUNT];
    squares[PieceKind::Pawn.index()] = pawn_attacks(them, their_king_sq);
    squares[PieceKind::Knight.index()] = knight_attacks(their_king_sq);
    squares[PieceKind::Bishop.index()] = bishop_attacks(their_king_sq, occupied);
    squares[PieceKind::Rook.index()] = rook_attacks(their_king_sq, occupied);
    squares[PieceKind::Queen.index()] =
        squares[PieceKind::Bishop.index()] | squares[PieceKind::Rook.index()];
    squares
}
