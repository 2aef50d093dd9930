//! Per-ply state snapshot backing [`Position`](crate::position::Position)'s
//! make/undo stack.

use crate::bitboard::Bitboard;
use crate::castle_rights::CastleRights;
use crate::piece_kind::PieceKind;
use crate::square::Square;

/// Everything a single `do_move`/`undo_move` pair needs to reverse itself,
/// plus the per-ply cached data search wants without recomputing it.
///
/// Carries the incremental-update fields `make_move.rs` already restores on
/// undo (previous castling rights, previous en passant square, previous
/// halfmove clock) plus what a pure copy-make `Board` never needed to track:
/// the previous pawn/material keys, the checkers/pin caches, and the
/// null-move ply counter used by repetition and null-move-pruning
/// bookkeeping.
#[derive(Clone, Copy)]
pub(crate) struct StateInfo {
    /// Piece captured by the move that produced this state, if any.
    pub(crate) captured: Option<PieceKind>,
    /// Castling rights as they were *before* the move.
    pub(crate) prev_castling: CastleRights,
    /// En passant target square as it was *before* the move.
    pub(crate) prev_en_passant: Option<Square>,
    /// Halfmove clock as it was *before* the move.
    pub(crate) prev_halfmove_clock: u16,
    /// Fullmove number as it was *before* the move.
    pub(crate) prev_fullmove_number: u16,
    /// Combined (posi) Zobrist key before the move.
    pub(crate) prev_posi_key: u64,
    /// Pawn-structure Zobrist key before the move.
    pub(crate) prev_pawn_key: u64,
    /// Material-configuration Zobrist key before the move.
    pub(crate) prev_material_key: u64,
    /// Checking pieces against the side to move, computed after the move.
    pub(crate) checkers: Bitboard,
    /// Friendly pieces pinned to their king, computed after the move.
    pub(crate) pinned: Bitboard,
    /// Blockers for each king (white, black): pieces of either color sitting
    /// alone between that king and an enemy slider. Indexed by
    /// `Color::index()`. `king_blockers[c] & side(c)` reproduces `pinned`
    /// when `c` is the side to move; filtered by the *other* side's pieces
    /// instead, it flags discovered-check candidates.
    pub(crate) king_blockers: [Bitboard; 2],
    /// The enemy sliders responsible for each king's entry in
    /// `king_blockers`, indexed the same way.
    pub(crate) pinners: [Bitboard; 2],
    /// Per piece kind, squares from which a side-to-move piece of that kind
    /// gives direct check to the opposing king.
    pub(crate) check_squares: [Bitboard; PieceKind::COUNT],
    /// Whether the move that produced this state was a pawn promotion.
    pub(crate) promoted: bool,
    /// Plies since the last null move or irreversible move, for null-move
    /// pruning's "don't do two null moves in a row" rule.
    pub(crate) plies_from_null: u32,
}
