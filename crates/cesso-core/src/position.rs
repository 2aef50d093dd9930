//! Search-time position: the mutable make/undo layer on top of [`Board`].
//!
//! `Board` stays the value-type FEN/validation core (cheap to copy, easy to
//! reason about); `Position` wraps one and layers a `StateInfo` stack so a
//! search thread can walk forward and backward through a line with `do_move`/
//! `undo_move` instead of allocating a fresh `Board` per ply.

use std::str::FromStr;

use crate::bitboard::Bitboard;
use crate::board::Board;
use crate::chess_move::{Move, MoveKind};
use crate::color::Color;
use crate::error::FenError;
use crate::movegen::{
    compute_check_squares, compute_checkers_and_pinned, compute_king_blockers,
    generate_legal_moves,
};
use crate::piece_kind::PieceKind;
use crate::state_info::StateInfo;
use crate::zobrist;

/// A chess position with make/undo search state layered over a [`Board`].
#[derive(Clone)]
pub struct Position {
    board: Board,
    pawn_key: u64,
    material_key: u64,
    checkers: Bitboard,
    pinned: Bitboard,
    king_blockers: [Bitboard; 2],
    pinners: [Bitboard; 2],
    check_squares: [Bitboard; PieceKind::COUNT],
    plies_from_null: u32,
    history: Vec<StateInfo>,
}

/// Compute `king_blockers`/`pinners` for both colors in one pass.
fn compute_both_king_blockers(board: &Board) -> ([Bitboard; 2], [Bitboard; 2]) {
    let (white_blockers, white_pinners) = compute_king_blockers(board, Color::White);
    let (black_blockers, black_pinners) = compute_king_blockers(board, Color::Black);
    (
        [white_blockers, black_blockers],
        [white_pinners, black_pinners],
    )
}

impl Position {
    /// Wrap an existing board, computing its derived keys and check state.
    pub fn new(board: Board) -> Position {
        let pawn_key = zobrist::pawn_hash_from_scratch(&board);
        let material_key = zobrist::material_hash_from_scratch(&board);
        let (checkers, pinned) = compute_checkers_and_pinned(&board);
        let (king_blockers, pinners) = compute_both_king_blockers(&board);
        let check_squares = compute_check_squares(&board);
        Position {
            board,
            pawn_key,
            material_key,
            checkers,
            pinned,
            king_blockers,
            pinners,
            check_squares,
            plies_from_null: 0,
            history: Vec::new(),
        }
    }

    /// The standard starting position.
    pub fn starting_position() -> Position {
        Position::new(Board::starting_position())
    }

    /// Borrow the underlying board (piece placement, FEN I/O, `Display`).
    #[inline]
    pub fn board(&self) -> &Board {
        &self.board
    }

    #[inline]
    pub fn side_to_move(&self) -> Color {
        self.board.side_to_move()
    }

    /// The combined (posi) Zobrist key — same value as `Board::hash`.
    #[inline]
    pub fn key(&self) -> u64 {
        self.board.hash()
    }

    #[inline]
    pub fn pawn_key(&self) -> u64 {
        self.pawn_key
    }

    #[inline]
    pub fn material_key(&self) -> u64 {
        self.material_key
    }

    /// Enemy pieces currently giving check to the side to move.
    #[inline]
    pub fn checkers(&self) -> Bitboard {
        self.checkers
    }

    /// Friendly pieces pinned to the side-to-move's king.
    #[inline]
    pub fn pinned(&self) -> Bitboard {
        self.pinned
    }

    /// The piece captured by the most recent `do_move`, if any — the top of
    /// the make/undo stack's `captured` field. `None` both for a position
    /// with no moves played yet and for one whose last move was quiet.
    #[inline]
    pub fn last_captured(&self) -> Option<PieceKind> {
        self.history.last().and_then(|info| info.captured)
    }

    /// Pieces of either color sitting alone between `color`'s king and an
    /// enemy slider. `pinned()` is `king_blockers(side_to_move) &
    /// side(side_to_move)`; filtering the other color's entry by the side
    /// to move's own pieces instead gives discovered-check candidates.
    #[inline]
    pub fn king_blockers(&self, color: Color) -> Bitboard {
        self.king_blockers[color.index()]
    }

    /// The enemy sliders responsible for `king_blockers(color)`.
    #[inline]
    pub fn pinners(&self, color: Color) -> Bitboard {
        self.pinners[color.index()]
    }

    /// Squares from which a side-to-move piece of `kind` gives direct check
    /// to the opposing king.
    #[inline]
    pub fn check_squares(&self, kind: PieceKind) -> Bitboard {
        self.check_squares[kind.index()]
    }

    #[inline]
    pub fn in_check(&self) -> bool {
        self.checkers.is_nonempty()
    }

    #[inline]
    pub fn plies_from_null(&self) -> u32 {
        self.plies_from_null
    }

    /// Number of plies played since this `Position` was constructed (i.e.
    /// the current depth of the `do_move` stack, for indexing into
    /// search-stack-relative state).
    #[inline]
    pub fn ply(&self) -> usize {
        self.history.len()
    }

    /// Whether `mv` is present in the fully-legal move list for this
    /// position. The move generator only ever produces legal moves, so
    /// pseudo-legality and legality coincide here — there is no separate
    /// faster pseudo-legal generator to check against.
    pub fn pseudo_legal(&self, mv: Move) -> bool {
        generate_legal_moves(&self.board).as_slice().contains(&mv)
    }

    /// Whether `mv` is legal in this position.
    #[inline]
    pub fn legal(&self, mv: Move) -> bool {
        self.pseudo_legal(mv)
    }

    /// Whether playing `mv` would give check to the opponent, using the
    /// cached `check_squares`/`king_blockers` rather than making the move
    /// and re-deriving check state from scratch.
    pub fn gives_check(&self, mv: Move) -> bool {
        let us = self.side_to_move();
        let them = us.flip();
        let from = mv.source();
        let to = mv.dest();
        let their_king_sq = self.board.king_square(them);

        match mv.kind() {
            MoveKind::Castling => {
                // Direct check only: the rook lands on `castle_rook_dest()`
                // and may check along its new rank/file. Discovered check
                // from the king's own move is vanishingly rare in practice
                // and not worth the extra geometry here.
                let rook_dest = mv.castle_rook_dest();
                crate::attacks::rook_attacks(rook_dest, self.board.occupied())
                    .contains(their_king_sq)
            }
            MoveKind::EnPassant => {
                // Direct pawn check, or the captured pawn's square opening a
                // discovered check along its rank — neither is covered by
                // the cached tables (the capture square isn't `to`), so fall
                // back to a full recomputation for this rare case.
                let after = self.board.make_move(mv);
                after.is_square_attacked(after.king_square(them), us)
            }
            MoveKind::Promotion => {
                if self.check_squares(mv.promotion_piece().to_piece_kind()).contains(to) {
                    return true;
                }
                self.king_blockers(them).contains(from)
                    && !crate::attacks::line(from, to).contains(their_king_sq)
            }
            MoveKind::Normal => {
                let Some(kind) = self.board.piece_on(from) else {
                    return false;
                };
                if self.check_squares(kind).contains(to) {
                    return true;
                }
                self.king_blockers(them).contains(from)
                    && !crate::attacks::line(from, to).contains(their_king_sq)
            }
        }
    }

    /// Apply `mv`, pushing enough state onto the history stack to undo it.
    pub fn do_move(&mut self, mv: Move) {
        let is_capture = self.board.occupied().contains(mv.dest()) && !mv.is_castle();
        let captured = if mv.kind() == MoveKind::EnPassant {
            Some(PieceKind::Pawn)
        } else if is_capture {
            self.board.piece_on(mv.dest())
        } else {
            None
        };

        self.history.push(StateInfo {
            captured,
            prev_castling: self.board.castling(),
            prev_en_passant: self.board.en_passant(),
            prev_halfmove_clock: self.board.halfmove_clock(),
            prev_fullmove_number: self.board.fullmove_number(),
            prev_posi_key: self.board.hash(),
            prev_pawn_key: self.pawn_key,
            prev_material_key: self.material_key,
            checkers: self.checkers,
            pinned: self.pinned,
            king_blockers: self.king_blockers,
            pinners: self.pinners,
            check_squares: self.check_squares,
            promoted: mv.kind() == MoveKind::Promotion,
            plies_from_null: self.plies_from_null,
        });

        self.board = self.board.make_move(mv);
        self.pawn_key = zobrist::pawn_hash_from_scratch(&self.board);
        self.material_key = zobrist::material_hash_from_scratch(&self.board);
        let (checkers, pinned) = compute_checkers_and_pinned(&self.board);
        self.checkers = checkers;
        self.pinned = pinned;
        let (king_blockers, pinners) = compute_both_king_blockers(&self.board);
        self.king_blockers = king_blockers;
        self.pinners = pinners;
        self.check_squares = compute_check_squares(&self.board);
        self.plies_from_null += 1;
    }

    /// Reverse the most recent `do_move`.
    ///
    /// # Panics
    ///
    /// Panics if called with no corresponding `do_move` on the stack, or if
    /// `mv` does not match the move that produced the top of the stack — both
    /// indicate a caller bug (unbalanced make/undo), not a recoverable error.
    pub fn undo_move(&mut self, mv: Move) {
        let info = self.history.pop().expect("undo_move with empty history");
        self.board = self.board.unmake_move(mv, info.captured);
        self.board.set_castling(info.prev_castling);
        self.board.set_en_passant(info.prev_en_passant);
        self.board.set_halfmove_clock(info.prev_halfmove_clock);
        self.board.set_fullmove_number(info.prev_fullmove_number);
        self.board.set_hash(info.prev_posi_key);
        self.board.set_side_to_move(self.board.side_to_move().flip());
        self.pawn_key = info.prev_pawn_key;
        self.material_key = info.prev_material_key;
        self.checkers = info.checkers;
        self.pinned = info.pinned;
        self.king_blockers = info.king_blockers;
        self.pinners = info.pinners;
        self.check_squares = info.check_squares;
        self.plies_from_null = info.plies_from_null;
    }

    /// Apply a null move: flip the side to move and clear the en passant
    /// square, without moving any piece. Used by null-move pruning.
    pub fn do_null_move(&mut self) {
        self.history.push(StateInfo {
            captured: None,
            prev_castling: self.board.castling(),
            prev_en_passant: self.board.en_passant(),
            prev_halfmove_clock: self.board.halfmove_clock(),
            prev_fullmove_number: self.board.fullmove_number(),
            prev_posi_key: self.board.hash(),
            prev_pawn_key: self.pawn_key,
            prev_material_key: self.material_key,
            checkers: self.checkers,
            pinned: self.pinned,
            king_blockers: self.king_blockers,
            pinners: self.pinners,
            check_squares: self.check_squares,
            promoted: false,
            plies_from_null: self.plies_from_null,
        });

        let mut hash = self.board.hash();
        if let Some(ep) = self.board.en_passant() {
            hash ^= zobrist::EN_PASSANT_FILE[ep.file().index()];
        }
        hash ^= zobrist::SIDE_TO_MOVE;
        self.board.set_en_passant(None);
        self.board.set_hash(hash);
        self.board.set_side_to_move(self.board.side_to_move().flip());

        let (checkers, pinned) = compute_checkers_and_pinned(&self.board);
        self.checkers = checkers;
        self.pinned = pinned;
        let (king_blockers, pinners) = compute_both_king_blockers(&self.board);
        self.king_blockers = king_blockers;
        self.pinners = pinners;
        self.check_squares = compute_check_squares(&self.board);
        self.plies_from_null = 0;
    }

    /// Reverse the most recent `do_null_move`.
    pub fn undo_null_move(&mut self) {
        let info = self.history.pop().expect("undo_null_move with empty history");
        self.board.set_castling(info.prev_castling);
        self.board.set_en_passant(info.prev_en_passant);
        self.board.set_halfmove_clock(info.prev_halfmove_clock);
        self.board.set_fullmove_number(info.prev_fullmove_number);
        self.board.set_hash(info.prev_posi_key);
        self.board.set_side_to_move(self.board.side_to_move().flip());
        self.pawn_key = info.prev_pawn_key;
        self.material_key = info.prev_material_key;
        self.checkers = info.checkers;
        self.pinned = info.pinned;
        self.king_blockers = info.king_blockers;
        self.pinners = info.pinners;
        self.check_squares = info.check_squares;
        self.plies_from_null = info.plies_from_null;
    }

    /// Static exchange evaluation: does capturing on `mv`'s destination with
    /// the full sequence of recaptures end with a material swing `>= threshold`
    /// for the side to move?
    ///
    /// Attackers-of / least-valuable-attacker / x-ray backward negamax,
    /// exposed directly on `Position` so callers don't need to reach into
    /// the search crate for it.
    pub fn see_ge(&self, mv: Move, threshold: i32) -> bool {
        crate::see::see_ge(&self.board, mv, threshold)
    }

    /// Full SEE score (material swing, side-to-move's perspective), for
    /// callers that want the magnitude rather than a threshold check.
    pub fn see(&self, mv: Move) -> i32 {
        crate::see::see(&self.board, mv)
    }

    /// Cheap predictive key for the position `mv` would reach, for
    /// prefetching the child's transposition table cluster before the move
    /// is actually made. Ignores captures, promotions, castling, and en
    /// passant bookkeeping — it only needs to land close enough to the real
    /// key to warm the right cache line, not to be exact.
    pub fn move_posi_key(&self, mv: Move) -> u64 {
        use crate::piece::Piece;

        let mut key = self.board.hash() ^ zobrist::SIDE_TO_MOVE;
        if let Some(kind) = self.board.piece_on(mv.source()) {
            let us = self.board.side_to_move();
            let piece = Piece::new(kind, us);
            key ^= zobrist::PIECE_SQUARE[piece.index()][mv.source().index()];
            key ^= zobrist::PIECE_SQUARE[piece.index()][mv.dest().index()];
        }
        key
    }

    /// Whether the side to move has no legal moves while in check.
    pub fn is_checkmate(&self) -> bool {
        self.in_check() && generate_legal_moves(&self.board).as_slice().is_empty()
    }

    /// Whether neither side has enough material to ever force checkmate.
    #[inline]
    pub fn insufficient_material(&self) -> bool {
        self.board.insufficient_material()
    }

    /// Fifty-move-rule, insufficient-material, and threefold-repetition draw
    /// detection, scanning back through the make/undo stack (not the full
    /// game history before this `Position` was constructed — callers that
    /// need game-history repetition must seed that separately, e.g. via a
    /// root-position key set passed into search).
    ///
    /// The fifty-move clock does not apply if the side to move is already
    /// checkmated — that position is a loss, not a draw, even at or past the
    /// clock limit.
    pub fn draw(&self, max_ply: usize) -> bool {
        if self.board.halfmove_clock() >= 100 && !self.is_checkmate() {
            return true;
        }
        if self.insufficient_material() {
            return true;
        }
        // A position can only recur on a ply of the same side to move, so
        // only look back an even number of plies. Bounded by how far the
        // halfmove clock reaches (captures/pawn moves are irreversible, so
        // anything before the clock reset cannot repeat this position) and
        // by `max_ply`, the caller's root-relative search-stack bound.
        let limit = (self.history.len())
            .min(self.board.halfmove_clock() as usize)
            .min(max_ply);
        let mut i = 2;
        while i <= limit {
            let idx = self.history.len() - i;
            if self.history[idx].prev_posi_key == self.board.hash() {
                return true;
            }
            i += 2;
        }
        false
    }

    /// Whether a reversible move exists, within `max_ply` plies back, whose
    /// Zobrist key equals the current position's key XORed with one of the
    /// two relevant side-to-move/piece-square deltas — i.e. whether the
    /// current line is about to cycle back to an earlier position. Uses the
    /// cuckoo table so this is checked in O(plies) rather than needing a
    /// full legal-move probe at every ply.
    pub fn cycled(&self, max_ply: usize) -> bool {
        let end = self.history.len().min(max_ply);
        if end < 3 {
            return false;
        }
        let occupied = self.board.occupied();
        for i in (3..=end).step_by(2) {
            let idx = self.history.len() - i;
            let key_diff = self.board.hash() ^ self.history[idx].prev_posi_key;
            if let Some((piece, sq1, sq2)) = crate::cuckoo::lookup(key_diff) {
                // A genuine cycle requires the connecting squares to have
                // exactly the arrangement a single reversible move would
                // leave: one of the two squares empty (the piece's current
                // resting square is occupied, its other endpoint is vacant).
                let (from, to) = if occupied.contains(sq1) { (sq1, sq2) } else { (sq2, sq1) };
                if !occupied.contains(to) && self.board.colored_piece_on(from) == Some(piece) {
                    return true;
                }
            }
        }
        false
    }
}

impl FromStr for Position {
    type Err = FenError;

    fn from_str(s: &str) -> Result<Position, FenError> {
        let board: Board = s.parse()?;
        Ok(Position::new(board))
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.board)
    }
}

impl std::fmt::Debug for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Position({:?})", self.board)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::square::Square;

    #[test]
    fn starting_position_no_checks() {
        let pos = Position::starting_position();
        assert!(!pos.in_check());
        assert_eq!(pos.checkers(), Bitboard::EMPTY);
    }

    #[test]
    fn do_move_undo_move_restores_key() {
        let mut pos = Position::starting_position();
        let key0 = pos.key();
        let pawn_key0 = pos.pawn_key();
        let mv = Move::new(Square::E2, Square::E4);
        pos.do_move(mv);
        assert_ne!(pos.key(), key0);
        assert_ne!(pos.pawn_key(), pawn_key0);
        pos.undo_move(mv);
        assert_eq!(pos.key(), key0);
        assert_eq!(pos.pawn_key(), pawn_key0);
        assert_eq!(pos.board().side_to_move(), Color::White);
    }

    #[test]
    fn do_move_sequence_undo_restores_each_step() {
        let mut pos = Position::starting_position();
        let moves = [
            Move::new(Square::G1, Square::F3),
            Move::new(Square::G8, Square::F6),
            Move::new(Square::B1, Square::C3),
        ];
        let start_key = pos.key();
        for mv in &moves {
            pos.do_move(*mv);
        }
        for mv in moves.iter().rev() {
            pos.undo_move(*mv);
        }
        assert_eq!(pos.key(), start_key);
        assert_eq!(pos.board().side_to_move(), Color::White);
    }

    #[test]
    fn null_move_flips_side_and_restores() {
        let mut pos = Position::starting_position();
        let key0 = pos.key();
        pos.do_null_move();
        assert_eq!(pos.board().side_to_move(), Color::Black);
        pos.undo_null_move();
        assert_eq!(pos.key(), key0);
        assert_eq!(pos.board().side_to_move(), Color::White);
    }

    #[test]
    fn check_detected_after_move() {
        // Scholar's-mate setup check: Qh5+ style isn't legal from start, use
        // a constructed position where moving a rook delivers check.
        let board: Board = "4k3/8/8/8/8/8/8/R3K3 w - - 0 1".parse().unwrap();
        let mut pos = Position::new(board);
        pos.do_move(Move::new(Square::A1, Square::A8));
        assert!(pos.in_check());
    }

    #[test]
    fn fifty_move_draw() {
        let board: Board = "4k3/8/8/8/8/8/8/4K3 w - - 100 50".parse().unwrap();
        let pos = Position::new(board);
        assert!(pos.draw(100));
    }

    #[test]
    fn cycled_detects_reversible_shuffle() {
        let mut pos = Position::starting_position();
        pos.do_move(Move::new(Square::G1, Square::F3));
        pos.do_move(Move::new(Square::G8, Square::F6));
        pos.do_move(Move::new(Square::F3, Square::G1));
        assert!(pos.cycled(10));
    }

    #[test]
    fn repetition_detected() {
        let mut pos = Position::starting_position();
        let out_and_back = [
            Move::new(Square::G1, Square::F3),
            Move::new(Square::G8, Square::F6),
            Move::new(Square::F3, Square::G1),
            Move::new(Square::F6, Square::G8),
        ];
        for mv in &out_and_back {
            pos.do_move(*mv);
        }
        assert!(pos.draw(100));
    }
}
