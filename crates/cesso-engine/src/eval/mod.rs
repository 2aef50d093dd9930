//! Evaluation module for cesso engine.
//!
//! `evaluate` is the single entry point the search calls. It sums the
//! classical handcrafted components into one tapered [`Score`], then blends
//! middlegame/endgame by [`phase::game_phase`] and returns the result from
//! the side-to-move's perspective.

pub mod king_safety;
pub mod material;
pub mod mobility;
#[cfg(feature = "nnue")]
pub mod nnue;
pub mod outposts;
pub mod pawns;
pub mod phase;
pub mod pst;
pub mod rooks;
pub mod score;

use cesso_core::{Board, Color, Position, Square};

use phase::MAX_PHASE;
use score::Score;

/// Sum of every piece's piece-square-table value, both colors.
fn pst_total(board: &Board) -> Score {
    let mut total = Score::ZERO;
    for idx in 0..64u8 {
        let sq = Square::from_index(idx).expect("idx < 64");
        if let (Some(kind), Some(color)) = (board.piece_on(sq), board.color_on(sq)) {
            let value = pst::pst_value(kind, color, sq);
            total += if color == Color::White { value } else { -value };
        }
    }
    total
}

/// Evaluate `board` in centipawns from the side-to-move's perspective,
/// using the NNUE network if built with the `nnue` feature, else falling
/// back to the handcrafted evaluation below.
#[cfg(feature = "nnue")]
pub fn evaluate(board: &Board) -> i32 {
    nnue::evaluate(board)
}

/// Evaluate `board` in centipawns from the side-to-move's perspective,
/// using the NNUE network if built with the `nnue` feature, else falling
/// back to the handcrafted evaluation below.
#[cfg(not(feature = "nnue"))]
pub fn evaluate(board: &Board) -> i32 {
    classical(board)
}

/// Handcrafted evaluation: sums material, PST, mobility, pawn structure,
/// king safety, rook placement, and outposts into one tapered [`Score`],
/// then blends middlegame/endgame weights by [`phase::game_phase`]. Kept
/// available under both features as a debug trace surface even once NNUE
/// is the production path.
pub fn classical(board: &Board) -> i32 {
    let score = material::material(board)
        + pst_total(board)
        + mobility::evaluate_mobility(board)
        + pawns::evaluate_pawns(board)
        + king_safety::evaluate_king_safety(board)
        + rooks::evaluate_rooks(board)
        + outposts::evaluate_outposts(board);

    let phase = phase::game_phase(board);
    let tapered =
        (score.mg() as i32 * phase + score.eg() as i32 * (MAX_PHASE - phase)) / MAX_PHASE;

    // Material/PST/etc. are all encoded White-positive; flip for Black to move.
    if board.side_to_move() == Color::White {
        tapered
    } else {
        -tapered
    }
}

/// Static evaluation, opaque to the search layer beyond this single call.
///
/// `optimism` biases the returned value toward "keep playing on" for
/// complex positions; a bare material/PST evaluator is free to ignore it.
/// Callers must not invoke this in check (`pos.in_check()` is false).
pub trait Evaluator: Send + Sync {
    /// Evaluate `pos` from the side-to-move's perspective, in centipawns.
    fn evaluate(&self, pos: &Position, optimism: i32) -> i32;
}

/// The handcrafted evaluator, exposed as an [`Evaluator`] impl for callers
/// that want it explicitly rather than through the feature-gated
/// [`evaluate`] dispatch.
pub struct ClassicalEvaluator;

impl Evaluator for ClassicalEvaluator {
    fn evaluate(&self, pos: &Position, _optimism: i32) -> i32 {
        classical(pos.board())
    }
}

/// NNUE-backed evaluator. Blends the network's raw output with `optimism`,
/// scaled by how much the handcrafted and network evaluations disagree
/// (their gap stands in for "positional complexity"), then damps the whole
/// thing toward zero as the fifty-move clock climbs.
#[cfg(feature = "nnue")]
pub struct NnueEvaluator;

#[cfg(feature = "nnue")]
impl Evaluator for NnueEvaluator {
    fn evaluate(&self, pos: &Position, optimism: i32) -> i32 {
        let board = pos.board();
        let raw = nnue::evaluate(board);

        let complexity = (raw - classical(board)).abs().min(1024);
        let blended_optimism = optimism + (optimism * complexity * 21) / 10_000;
        let v = raw + (blended_optimism * 92) / 1000;

        let clock = board.halfmove_clock() as i32;
        let damp = (1000 - 5 * clock).max(0);
        (v * damp) / 1000
    }
}

/// Evaluate `pos` through whichever [`Evaluator`] the `nnue` feature
/// selects, passing `optimism` through per the `Evaluator` contract.
#[cfg(feature = "nnue")]
pub fn evaluate_with_optimism(pos: &Position, optimism: i32) -> i32 {
    NnueEvaluator.evaluate(pos, optimism)
}

/// Evaluate `pos` through whichever [`Evaluator`] the `nnue` feature
/// selects, passing `optimism` through per the `Evaluator` contract.
#[cfg(not(feature = "nnue"))]
pub fn evaluate_with_optimism(pos: &Position, optimism: i32) -> i32 {
    ClassicalEvaluator.evaluate(pos, optimism)
}
