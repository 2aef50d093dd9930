//! Move-ordering heuristics: killers, butterfly/capture/continuation/low-ply
//! history, counter-moves, and static-eval correction history.

use cesso_core::{Color, Move, PieceKind};

use crate::search::negamax::MAX_PLY;

/// Two killer moves per ply — quiet moves that caused beta cutoffs.
pub struct KillerTable {
    slots: [[Move; 2]; MAX_PLY],
}

impl KillerTable {
    /// Create an empty killer table.
    pub fn new() -> Self {
        Self {
            slots: [[Move::NONE; 2]; MAX_PLY],
        }
    }

    /// Store a killer move at the given ply.
    ///
    /// Shifts slot 0 to slot 1 if the new move differs from slot 0.
    pub fn store(&mut self, ply: usize, mv: Move) {
        if ply >= MAX_PLY {
            return;
        }
        if self.slots[ply][0] != mv {
            self.slots[ply][1] = self.slots[ply][0];
            self.slots[ply][0] = mv;
        }
    }

    /// Check if a move is a killer at the given ply.
    pub fn is_killer(&self, ply: usize, mv: Move) -> bool {
        if ply >= MAX_PLY {
            return false;
        }
        self.slots[ply][0] == mv || self.slots[ply][1] == mv
    }

    /// The most recently stored killer at `ply` (slot 0), or `Move::NONE`.
    pub fn primary(&self, ply: usize) -> Move {
        if ply >= MAX_PLY {
            Move::NONE
        } else {
            self.slots[ply][0]
        }
    }
}

impl Default for KillerTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Maximum absolute value any history-style table entry can reach. Doubles as
/// the gravity formula's denominator, so large bonuses saturate smoothly
/// rather than overflowing.
const HISTORY_MAX: i32 = 16_384;

/// `bonus(depth)` curve used by every history table below: quadratic in
/// depth, matching the update magnitude used for killer/counter-move
/// promotion throughout the corpus.
pub fn history_bonus(depth: u8) -> i32 {
    let d = depth as i32;
    (17 * d + 134) * d - 134
}

/// Malus applied to quiet/capture moves searched but not chosen at a cutoff.
pub fn history_malus(depth: u8) -> i32 {
    -history_bonus(depth)
}

/// Apply the shared "gravity" update to one history table entry: moves
/// `entry` toward `bonus`, scaled down as `entry` approaches `HISTORY_MAX` so
/// repeated large bonuses saturate instead of overflowing.
fn apply_gravity(entry: &mut i32, bonus: i32) {
    let clamped = bonus.clamp(-HISTORY_MAX, HISTORY_MAX);
    *entry += clamped - *entry * clamped.abs() / HISTORY_MAX;
}

/// Butterfly history heuristic table — indexed by `[piece_kind][to_square]`.
///
/// Rewards quiet moves that cause beta cutoffs, penalises those that don't.
pub struct HistoryTable {
    table: [[i32; 64]; 6],
}

impl HistoryTable {
    /// Create a zeroed history table.
    pub fn new() -> Self {
        Self {
            table: [[0; 64]; 6],
        }
    }

    /// Apply a gravity-weighted bonus (positive) or malus (negative).
    pub fn update(&mut self, piece: PieceKind, to: usize, bonus: i32) {
        apply_gravity(&mut self.table[piece.index()][to], bonus);
    }

    /// Get the history score for a quiet move.
    pub fn score(&self, piece: PieceKind, to: usize) -> i32 {
        self.table[piece.index()][to]
    }
}

impl Default for HistoryTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Capture history — indexed by `[attacker][victim][to_square]`, orders
/// captures the ordering table can't already separate by MVV/LVA alone.
pub struct CaptureHistory {
    table: Box<[[[i32; 64]; 6]; 6]>,
}

impl CaptureHistory {
    /// Create a zeroed capture history table.
    pub fn new() -> Self {
        Self {
            table: Box::new([[[0; 64]; 6]; 6]),
        }
    }

    /// Apply a gravity-weighted bonus (positive) or malus (negative).
    pub fn update(&mut self, attacker: PieceKind, victim: PieceKind, to: usize, bonus: i32) {
        apply_gravity(&mut self.table[attacker.index()][victim.index()][to], bonus);
    }

    /// Get the capture history score.
    pub fn score(&self, attacker: PieceKind, victim: PieceKind, to: usize) -> i32 {
        self.table[attacker.index()][victim.index()][to]
    }
}

impl Default for CaptureHistory {
    fn default() -> Self {
        Self::new()
    }
}

/// One reply slot per `(previous piece, previous destination)` pair.
pub struct CounterMoveTable {
    table: [[Move; 64]; 6],
}

impl CounterMoveTable {
    /// Create an empty counter-move table.
    pub fn new() -> Self {
        Self {
            table: [[Move::NONE; 64]; 6],
        }
    }

    /// Record `mv` as the reply that refuted `prev_piece`'s move to `prev_to`.
    pub fn set(&mut self, prev_piece: PieceKind, prev_to: usize, mv: Move) {
        self.table[prev_piece.index()][prev_to] = mv;
    }

    /// Look up the counter-move for `(prev_piece, prev_to)`, if any.
    pub fn get(&self, prev_piece: PieceKind, prev_to: usize) -> Move {
        self.table[prev_piece.index()][prev_to]
    }
}

impl Default for CounterMoveTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Plies near the root for which move choice is tracked independently of
/// piece/destination — quiet moves played early tend to recur across
/// iterative-deepening re-searches of the same root.
const LOW_PLY_SIZE: usize = 4;

/// Low-ply history — indexed by `[ply][to_square]`, only populated for the
/// first few plies of the tree.
pub struct LowPlyHistory {
    table: [[i32; 64]; LOW_PLY_SIZE],
}

impl LowPlyHistory {
    /// Create a zeroed low-ply history table.
    pub fn new() -> Self {
        Self {
            table: [[0; 64]; LOW_PLY_SIZE],
        }
    }

    /// Get the low-ply score for `to`, or 0 past `LOW_PLY_SIZE`.
    pub fn score(&self, ply: usize, to: usize) -> i32 {
        if ply < LOW_PLY_SIZE {
            self.table[ply][to]
        } else {
            0
        }
    }

    /// Apply a gravity-weighted bonus (positive) or malus (negative).
    pub fn update(&mut self, ply: usize, to: usize, bonus: i32) {
        if ply >= LOW_PLY_SIZE {
            return;
        }
        apply_gravity(&mut self.table[ply][to], bonus);
    }
}

impl Default for LowPlyHistory {
    fn default() -> Self {
        Self::new()
    }
}

/// Identifies the `(piece, destination)` of a move already played on the
/// search stack, used as the context key into [`ContinuationHistory`].
#[derive(Clone, Copy)]
pub struct ContHistIndex {
    piece_index: usize,
    to_index: usize,
}

impl ContHistIndex {
    /// Build the context key for a move that placed `piece` on `to`.
    pub fn new(piece: PieceKind, to: usize) -> Self {
        Self {
            piece_index: piece.index(),
            to_index: to,
        }
    }
}

/// Continuation history — indexed by `[context piece][context to][piece][to]`,
/// rewarding quiet moves that follow well on from the move played one or two
/// plies earlier.
pub struct ContinuationHistory {
    table: Box<[[[[i32; 64]; 6]; 64]; 6]>,
}

impl ContinuationHistory {
    /// Create a zeroed continuation history table.
    pub fn new() -> Self {
        Self {
            table: Box::new([[[[0; 64]; 6]; 64]; 6]),
        }
    }

    /// Score a move in the context of an earlier stack move.
    pub fn score(&self, ctx: ContHistIndex, piece: PieceKind, to: usize) -> i32 {
        self.table[ctx.piece_index][ctx.to_index][piece.index()][to]
    }

    /// Apply a gravity-weighted bonus (positive) or malus (negative).
    pub fn update(&mut self, ctx: ContHistIndex, piece: PieceKind, to: usize, bonus: i32) {
        apply_gravity(
            &mut self.table[ctx.piece_index][ctx.to_index][piece.index()][to],
            bonus,
        );
    }
}

impl Default for ContinuationHistory {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-ply search stack entry: what was played to reach this node, used by
/// continuation history lookups one and two plies up.
#[derive(Clone, Copy)]
pub struct StackEntry {
    /// The move played to reach this ply (`Move::NONE` at an empty slot).
    pub current_move: Move,
    /// The piece that played `current_move`, if any.
    pub moved_piece: Option<PieceKind>,
    /// Continuation-history context key for `current_move`, if it was a real
    /// move (not a null move, not the root).
    pub cont_hist_index: Option<ContHistIndex>,
    /// Static evaluation recorded at this ply, used for the improving flag.
    pub static_eval: i32,
}

impl StackEntry {
    /// An empty stack slot.
    pub fn new() -> Self {
        Self {
            current_move: Move::NONE,
            moved_piece: None,
            cont_hist_index: None,
            static_eval: 0,
        }
    }
}

impl Default for StackEntry {
    fn default() -> Self {
        Self::new()
    }
}

/// Update the continuation history at one and two plies back from `ply` for
/// the move `piece -> to` just searched at `ply`.
pub fn update_cont_history(
    cont_hist: &mut ContinuationHistory,
    stack: &[StackEntry],
    ply: usize,
    piece: PieceKind,
    to: usize,
    bonus: i32,
) {
    for back in [1usize, 2] {
        if ply < back {
            continue;
        }
        if let Some(ctx) = stack[ply - back].cont_hist_index {
            cont_hist.update(ctx, piece, to, bonus);
        }
    }
}

/// Number of buckets each correction-history table hashes into.
const CORR_HIST_SIZE: usize = 1 << 14;
const CORR_HIST_MASK: u64 = (CORR_HIST_SIZE - 1) as u64;
/// Stored correction values are scaled by this factor relative to
/// centipawns, giving sub-centipawn update resolution without floats.
const CORR_HIST_GRAIN: i32 = 256;
/// Clamp on the final, unscaled eval adjustment.
const CORR_HIST_MAX_ADJUST: i32 = 2000;

fn corr_index(key: u64) -> usize {
    (key & CORR_HIST_MASK) as usize
}

/// Tracks how far the static evaluator tends to be off for a given pawn
/// structure, non-pawn material configuration, or piece-type skeleton, and
/// corrects `evaluate()`'s raw output toward the value search actually finds.
///
/// Uses the same saturating gravity update as the other history tables; the
/// five independent buckets (pawn, each side's non-pawn material, major
/// pieces, minor pieces) plus a continuation bucket each track a different
/// slice of static-eval error independently.
pub struct CorrectionHistory {
    pawn: Box<[[i32; CORR_HIST_SIZE]; 2]>,
    non_pawn: Box<[[[i32; CORR_HIST_SIZE]; 2]; 2]>,
    major: Box<[[i32; CORR_HIST_SIZE]; 2]>,
    minor: Box<[[i32; CORR_HIST_SIZE]; 2]>,
    continuation: Box<[[i32; 64]; 6]>,
}

impl CorrectionHistory {
    /// Create a zeroed correction history.
    pub fn new() -> Self {
        Self {
            pawn: Box::new([[0; CORR_HIST_SIZE]; 2]),
            non_pawn: Box::new([[[0; CORR_HIST_SIZE]; 2]; 2]),
            major: Box::new([[0; CORR_HIST_SIZE]; 2]),
            minor: Box::new([[0; CORR_HIST_SIZE]; 2]),
            continuation: Box::new([[0; 64]; 6]),
        }
    }

    /// Adjust a raw static evaluation using the accumulated correction
    /// buckets for the current position.
    #[allow(clippy::too_many_arguments)]
    pub fn correct_eval(
        &self,
        stm: Color,
        pawn_key: u64,
        non_pawn_white_key: u64,
        non_pawn_black_key: u64,
        major_key: u64,
        minor_key: u64,
        prev_piece: Option<PieceKind>,
        prev_dest: Option<usize>,
        raw_eval: i32,
    ) -> i32 {
        let c = stm.index();
        let mut total: i64 = 0;
        total += self.pawn[c][corr_index(pawn_key)] as i64;
        total += self.non_pawn[c][Color::White.index()][corr_index(non_pawn_white_key)] as i64;
        total += self.non_pawn[c][Color::Black.index()][corr_index(non_pawn_black_key)] as i64;
        total += self.major[c][corr_index(major_key)] as i64;
        total += self.minor[c][corr_index(minor_key)] as i64;
        if let (Some(piece), Some(dest)) = (prev_piece, prev_dest) {
            total += self.continuation[piece.index()][dest] as i64;
        }
        let adjustment = ((total / CORR_HIST_GRAIN as i64) as i32)
            .clamp(-CORR_HIST_MAX_ADJUST, CORR_HIST_MAX_ADJUST);
        raw_eval + adjustment
    }

    /// Nudge every bucket toward the observed `diff = search_score -
    /// static_eval`, scaled by `depth`.
    #[allow(clippy::too_many_arguments)]
    pub fn update(
        &mut self,
        stm: Color,
        pawn_key: u64,
        non_pawn_white_key: u64,
        non_pawn_black_key: u64,
        major_key: u64,
        minor_key: u64,
        prev_piece: Option<PieceKind>,
        prev_dest: Option<usize>,
        depth: u8,
        diff: i32,
    ) {
        let bonus = diff * (depth as i32) * CORR_HIST_GRAIN / 8;
        let c = stm.index();
        apply_gravity(&mut self.pawn[c][corr_index(pawn_key)], bonus);
        apply_gravity(
            &mut self.non_pawn[c][Color::White.index()][corr_index(non_pawn_white_key)],
            bonus,
        );
        apply_gravity(
            &mut self.non_pawn[c][Color::Black.index()][corr_index(non_pawn_black_key)],
            bonus,
        );
        apply_gravity(&mut self.major[c][corr_index(major_key)], bonus);
        apply_gravity(&mut self.minor[c][corr_index(minor_key)], bonus);
        if let (Some(piece), Some(dest)) = (prev_piece, prev_dest) {
            apply_gravity(&mut self.continuation[piece.index()][dest], bonus);
        }
    }
}

impl Default for CorrectionHistory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cesso_core::{Move, PieceKind, Square};

    #[test]
    fn killer_store_and_check() {
        let mut kt = KillerTable::new();
        let mv1 = Move::new(Square::E2, Square::E4);
        let mv2 = Move::new(Square::D2, Square::D4);

        kt.store(5, mv1);
        assert!(kt.is_killer(5, mv1));
        assert!(!kt.is_killer(5, mv2));

        kt.store(5, mv2);
        assert!(kt.is_killer(5, mv1));
        assert!(kt.is_killer(5, mv2));
    }

    #[test]
    fn killer_same_move_no_shift() {
        let mut kt = KillerTable::new();
        let mv1 = Move::new(Square::E2, Square::E4);
        let mv2 = Move::new(Square::D2, Square::D4);

        kt.store(0, mv1);
        kt.store(0, mv2);
        kt.store(0, mv2);
        assert!(kt.is_killer(0, mv1));
        assert!(kt.is_killer(0, mv2));
    }

    #[test]
    fn killer_different_plies_independent() {
        let mut kt = KillerTable::new();
        let mv = Move::new(Square::E2, Square::E4);
        kt.store(3, mv);
        assert!(kt.is_killer(3, mv));
        assert!(!kt.is_killer(4, mv));
    }

    #[test]
    fn history_gravity_moves_toward_bonus() {
        let mut ht = HistoryTable::new();
        assert_eq!(ht.score(PieceKind::Knight, 20), 0);
        ht.update(PieceKind::Knight, 20, history_bonus(4));
        assert!(ht.score(PieceKind::Knight, 20) > 0);
    }

    #[test]
    fn history_malus_is_negative() {
        let mut ht = HistoryTable::new();
        ht.update(PieceKind::Knight, 20, history_malus(4));
        assert!(ht.score(PieceKind::Knight, 20) < 0);
    }

    #[test]
    fn history_saturates_within_bounds() {
        let mut ht = HistoryTable::new();
        for _ in 0..10_000 {
            ht.update(PieceKind::Pawn, 0, history_bonus(20));
        }
        assert!(ht.score(PieceKind::Pawn, 0) <= HISTORY_MAX);
        for _ in 0..10_000 {
            ht.update(PieceKind::Pawn, 0, history_malus(20));
        }
        assert!(ht.score(PieceKind::Pawn, 0) >= -HISTORY_MAX);
    }

    #[test]
    fn capture_history_gravity() {
        let mut ch = CaptureHistory::new();
        ch.update(PieceKind::Pawn, PieceKind::Queen, 10, history_bonus(6));
        assert!(ch.score(PieceKind::Pawn, PieceKind::Queen, 10) > 0);
        assert_eq!(ch.score(PieceKind::Pawn, PieceKind::Rook, 10), 0);
    }

    #[test]
    fn counter_move_round_trip() {
        let mut cmt = CounterMoveTable::new();
        let mv = Move::new(Square::E7, Square::E5);
        cmt.set(PieceKind::Pawn, Square::E4.index(), mv);
        assert_eq!(cmt.get(PieceKind::Pawn, Square::E4.index()), mv);
        assert_eq!(cmt.get(PieceKind::Pawn, Square::D4.index()), Move::NONE);
    }

    #[test]
    fn low_ply_history_bounds() {
        let mut lph = LowPlyHistory::new();
        lph.update(0, 5, history_bonus(4));
        assert!(lph.score(0, 5) > 0);
        lph.update(LOW_PLY_SIZE, 5, history_bonus(4));
        assert_eq!(lph.score(LOW_PLY_SIZE, 5), 0);
    }

    #[test]
    fn continuation_history_context_isolated() {
        let mut ch = ContinuationHistory::new();
        let ctx_a = ContHistIndex::new(PieceKind::Knight, 18);
        let ctx_b = ContHistIndex::new(PieceKind::Bishop, 18);
        ch.update(ctx_a, PieceKind::Pawn, 20, history_bonus(4));
        assert!(ch.score(ctx_a, PieceKind::Pawn, 20) > 0);
        assert_eq!(ch.score(ctx_b, PieceKind::Pawn, 20), 0);
    }

    #[test]
    fn update_cont_history_reaches_one_and_two_plies_back() {
        let mut stack = [StackEntry::new(); MAX_PLY];
        stack[2].cont_hist_index = Some(ContHistIndex::new(PieceKind::Knight, 18));
        stack[1].cont_hist_index = Some(ContHistIndex::new(PieceKind::Bishop, 30));
        let mut ch = ContinuationHistory::new();
        update_cont_history(&mut ch, &stack, 2, PieceKind::Pawn, 20, history_bonus(4));
        assert!(ch.score(stack[1].cont_hist_index.unwrap(), PieceKind::Pawn, 20) > 0);
        assert!(ch.score(stack[2].cont_hist_index.unwrap(), PieceKind::Pawn, 20) > 0);
    }

    #[test]
    fn correction_history_zero_by_default() {
        let corr = CorrectionHistory::new();
        let eval = corr.correct_eval(Color::White, 1, 2, 3, 4, 5, None, None, 37);
        assert_eq!(eval, 37);
    }

    #[test]
    fn correction_history_update_shifts_eval() {
        let mut corr = CorrectionHistory::new();
        for _ in 0..50 {
            corr.update(Color::White, 1, 2, 3, 4, 5, None, None, 6, 200);
        }
        let eval = corr.correct_eval(Color::White, 1, 2, 3, 4, 5, None, None, 0);
        assert!(eval > 0);
    }
}
