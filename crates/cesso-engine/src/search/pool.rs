//! Lazy SMP thread pool for parallel search.

use std::sync::atomic::{AtomicU64, Ordering};

use cesso_core::{Board, Move, Position, generate_legal_moves};

use crate::search::SearchResult;
use crate::search::control::SearchControl;
use crate::search::negamax::{INF, SearchContext, aspiration_search};
use crate::search::numa::{NoBinding, NumaBinding};
use crate::search::root_move::build_root_moves;
use crate::search::stability::StabilityTracker;
use crate::search::thread_mark::ThreadMarkTable;
use crate::search::tt::TranspositionTable;

/// Lazy SMP thread pool — owns the shared transposition table.
pub struct ThreadPool {
    tt: TranspositionTable,
    num_threads: usize,
    contempt: i32,
    numa: Box<dyn NumaBinding>,
}

/// A completed helper thread's final iteration, carried back out of
/// `std::thread::scope` for the best-worker vote.
struct HelperResult {
    depth: u8,
    seldepth: u8,
    score: i32,
    best_move: Move,
    pv: Vec<Move>,
}

impl ThreadPool {
    /// Create a new thread pool with `hash_mb` MB transposition table.
    pub fn new(hash_mb: usize) -> Self {
        Self {
            tt: TranspositionTable::new(hash_mb),
            num_threads: 1,
            contempt: 0,
            numa: Box::new(NoBinding),
        }
    }

    /// Install a NUMA binding strategy, replacing the default no-op. Called
    /// once per worker at the start of [`Self::search`].
    pub fn set_numa_binding(&mut self, binding: Box<dyn NumaBinding>) {
        self.numa = binding;
    }

    /// Set the number of search threads.
    pub fn set_num_threads(&mut self, n: usize) {
        self.num_threads = n.max(1);
    }

    /// Set the contempt factor (centipawns; positive prefers playing on over a draw).
    pub fn set_contempt(&mut self, contempt: i32) {
        self.contempt = contempt;
    }

    /// Resize the transposition table.
    pub fn resize_tt(&mut self, mb: usize) {
        self.tt = TranspositionTable::new(mb);
    }

    /// Clear the transposition table.
    pub fn clear_tt(&self) {
        self.tt.clear();
    }

    /// Approximate transposition table fill, in per-mille (UCI `hashfull`).
    pub fn hashfull(&self) -> u32 {
        self.tt.hashfull()
    }

    /// Run a Lazy SMP search.
    ///
    /// Thread 0 runs full iterative deepening with the `on_iter` callback for
    /// UCI output. Threads 1..N-1 run silent iterative deepening, contributing
    /// to the shared TT and cross-thread node marking table. Once every
    /// thread has stopped, the final result is the best of thread 0's result
    /// and every helper's result, voted by `(finished_depth, score)`: whoever
    /// reached the deepest completed iteration wins, ties broken by the
    /// higher score. Uses `std::thread::scope` — no `Arc` needed on the TT.
    ///
    /// `search_moves` restricts the root move set per UCI `go searchmoves`;
    /// an empty slice searches every legal move.
    pub fn search<F>(
        &self,
        board: &Board,
        max_depth: u8,
        control: &SearchControl,
        history: &[u64],
        search_moves: &[Move],
        mut on_iter: F,
    ) -> SearchResult
    where
        F: FnMut(u8, i32, u64, u8, &[Move]),
    {
        self.tt.new_generation();

        // A single legal reply needs no search at all — return it immediately
        // so the clock isn't spent proving what's already forced.
        let root_moves = generate_legal_moves(board);
        if root_moves.len() == 1 {
            let only_move = root_moves[0];
            on_iter(0, 0, 0, 0, &[only_move]);
            return SearchResult {
                best_move: only_move,
                ponder_move: None,
                pv: vec![only_move],
                score: 0,
                nodes: 0,
                depth: 0,
                seldepth: 0,
            };
        }

        let root_filter: Vec<Move> = build_root_moves(root_moves.as_slice(), search_moves)
            .into_iter()
            .map(|rm| rm.mv)
            .collect();

        let thread_marks = ThreadMarkTable::new();

        if self.num_threads <= 1 {
            // Single-thread fast path — no scope overhead
            self.numa.bind_current_thread(0);
            return self.search_single(
                board,
                max_depth,
                control,
                history,
                &root_filter,
                &thread_marks,
                on_iter,
            );
        }

        // Shared node counters — one AtomicU64 per thread to avoid contention
        let node_counters: Vec<AtomicU64> = (0..self.num_threads)
            .map(|_| AtomicU64::new(0))
            .collect();

        let mut result = SearchResult {
            best_move: Move::NONE,
            ponder_move: None,
            pv: vec![Move::NONE],
            score: -INF,
            nodes: 0,
            depth: 0,
            seldepth: 0,
        };

        let mut helper_results: Vec<HelperResult> = Vec::with_capacity(self.num_threads - 1);

        std::thread::scope(|s| {
            // Spawn N-1 helper threads (thread_id 1..num_threads)
            let mut handles = Vec::with_capacity(self.num_threads - 1);
            for (thread_id, node_counter) in node_counters.iter().enumerate().skip(1) {
                let tt = &self.tt;
                let contempt = self.contempt;
                let marks = &thread_marks;
                let root_filter = &root_filter;
                let numa = self.numa.as_ref();
                handles.push(s.spawn(move || {
                    numa.bind_current_thread(thread_id);
                    run_helper(
                        thread_id, tt, board, max_depth, control, node_counter, history,
                        root_filter, contempt, marks,
                    )
                }));
            }

            // Thread 0 runs on this thread (the coordinator)
            self.numa.bind_current_thread(0);
            result = self.search_main(
                board,
                max_depth,
                control,
                history,
                &root_filter,
                &thread_marks,
                &mut on_iter,
                &node_counters[0],
            );

            // Join every helper before the scope closes, collecting each
            // one's final iteration for the vote below.
            for handle in handles {
                if let Ok(helper_result) = handle.join() {
                    helper_results.push(helper_result);
                }
            }
        });
        // scope auto-joins any stragglers here (all handles above are already joined)

        // Best-worker vote: a helper whose iterative deepening reached a
        // strictly deeper completed depth than thread 0's — or matched it
        // with a higher score — replaces thread 0's result.
        for helper in helper_results {
            if helper.best_move.is_none() {
                continue;
            }
            let helper_wins = helper.depth > result.depth
                || (helper.depth == result.depth && helper.score > result.score);
            if helper_wins {
                result.best_move = helper.best_move;
                result.ponder_move = helper.pv.get(1).copied();
                result.score = helper.score;
                result.depth = helper.depth;
                result.seldepth = helper.seldepth;
                result.pv = helper.pv;
            }
        }

        // Sum node counts from all threads
        let total_nodes: u64 = node_counters
            .iter()
            .map(|c| c.load(Ordering::Relaxed))
            .sum();
        result.nodes = total_nodes;

        result
    }

    /// Single-thread fast path — no scope overhead.
    #[allow(clippy::too_many_arguments)]
    fn search_single<F>(
        &self,
        board: &Board,
        max_depth: u8,
        control: &SearchControl,
        history: &[u64],
        root_filter: &[Move],
        thread_marks: &ThreadMarkTable,
        mut on_iter: F,
    ) -> SearchResult
    where
        F: FnMut(u8, i32, u64, u8, &[Move]),
    {
        let mut pos = Position::new(*board);
        let mut ctx = SearchContext::new(
            &self.tt,
            control,
            history.to_vec(),
            self.contempt,
            board.side_to_move(),
            thread_marks,
            0,
            root_filter.to_vec(),
        );

        let mut completed_move = Move::NONE;
        let mut completed_score = -INF;
        let mut completed_depth: u8 = 0;
        let mut completed_pv: Vec<Move> = Vec::new();
        let mut prev_score: i32 = 0;
        let mut stability = StabilityTracker::new();

        for depth in 1..=max_depth {
            if control.should_stop_iterating() {
                break;
            }

            let score = aspiration_search(&mut pos, depth, prev_score, &mut ctx);

            if control.should_stop(ctx.nodes) {
                break;
            }

            prev_score = score;

            let pv = ctx.pv.root_pv();
            if !pv.is_empty() && !pv[0].is_none() {
                completed_move = pv[0];
            }
            completed_score = score;
            completed_depth = depth;
            completed_pv = pv.iter().copied().filter(|m| !m.is_none()).collect();

            on_iter(depth, score, ctx.nodes, ctx.seldepth, &completed_pv);

            let scale = stability.update(completed_move, &completed_pv, score);
            control.update_soft_scale(scale);

            if control.mate_reached(score) {
                break;
            }
        }

        let ponder_move = if completed_pv.len() > 1 {
            Some(completed_pv[1])
        } else {
            None
        };

        SearchResult {
            best_move: completed_move,
            ponder_move,
            pv: if completed_pv.is_empty() {
                vec![completed_move]
            } else {
                completed_pv
            },
            score: completed_score,
            nodes: ctx.nodes,
            depth: completed_depth,
            seldepth: ctx.seldepth,
        }
    }

    /// Thread 0 search — same as single, but stores final node count to an atomic counter.
    #[allow(clippy::too_many_arguments)]
    fn search_main<F>(
        &self,
        board: &Board,
        max_depth: u8,
        control: &SearchControl,
        history: &[u64],
        root_filter: &[Move],
        thread_marks: &ThreadMarkTable,
        on_iter: &mut F,
        node_counter: &AtomicU64,
    ) -> SearchResult
    where
        F: FnMut(u8, i32, u64, u8, &[Move]),
    {
        let mut pos = Position::new(*board);
        let mut ctx = SearchContext::new(
            &self.tt,
            control,
            history.to_vec(),
            self.contempt,
            board.side_to_move(),
            thread_marks,
            0,
            root_filter.to_vec(),
        );

        let mut completed_move = Move::NONE;
        let mut completed_score = -INF;
        let mut completed_depth: u8 = 0;
        let mut completed_pv: Vec<Move> = Vec::new();
        let mut prev_score: i32 = 0;
        let mut stability = StabilityTracker::new();

        for depth in 1..=max_depth {
            if control.should_stop_iterating() {
                break;
            }

            let score = aspiration_search(&mut pos, depth, prev_score, &mut ctx);

            if control.should_stop(ctx.nodes) {
                break;
            }

            prev_score = score;

            let pv = ctx.pv.root_pv();
            if !pv.is_empty() && !pv[0].is_none() {
                completed_move = pv[0];
            }
            completed_score = score;
            completed_depth = depth;
            completed_pv = pv.iter().copied().filter(|m| !m.is_none()).collect();

            on_iter(depth, score, ctx.nodes, ctx.seldepth, &completed_pv);

            let scale = stability.update(completed_move, &completed_pv, score);
            control.update_soft_scale(scale);

            if control.mate_reached(score) {
                break;
            }
        }

        node_counter.store(ctx.nodes, Ordering::Relaxed);

        let ponder_move = if completed_pv.len() > 1 {
            Some(completed_pv[1])
        } else {
            None
        };

        SearchResult {
            best_move: completed_move,
            ponder_move,
            pv: if completed_pv.is_empty() {
                vec![completed_move]
            } else {
                completed_pv
            },
            score: completed_score,
            nodes: ctx.nodes,
            depth: completed_depth,
            seldepth: ctx.seldepth,
        }
    }
}

/// Silent helper thread for Lazy SMP — writes to TT only, no UCI output.
/// Returns its final completed iteration so the coordinator can weigh it in
/// the best-worker vote once every thread has stopped.
#[allow(clippy::too_many_arguments)]
fn run_helper(
    thread_id: usize,
    tt: &TranspositionTable,
    board: &Board,
    max_depth: u8,
    control: &SearchControl,
    node_counter: &AtomicU64,
    history: &[u64],
    root_filter: &[Move],
    contempt: i32,
    thread_marks: &ThreadMarkTable,
) -> HelperResult {
    let mut pos = Position::new(*board);
    let mut ctx = SearchContext::new(
        tt,
        control,
        history.to_vec(),
        contempt,
        board.side_to_move(),
        thread_marks,
        thread_id,
        root_filter.to_vec(),
    );

    // Depth offset: helpers start at different depths to increase search divergence.
    // Helper i starts at depth 1 + (i % 2), so odd helpers skip depth 1.
    let start_depth: u8 = 1 + (thread_id % 2) as u8;

    let mut completed_move = Move::NONE;
    let mut completed_score = -INF;
    let mut completed_depth: u8 = 0;
    let mut completed_pv: Vec<Move> = Vec::new();
    let mut prev_score: i32 = 0;

    for depth in start_depth..=max_depth {
        if control.should_stop_iterating() {
            break;
        }

        let score = aspiration_search(&mut pos, depth, prev_score, &mut ctx);

        if control.should_stop(ctx.nodes) {
            break;
        }

        prev_score = score;

        let pv = ctx.pv.root_pv();
        if !pv.is_empty() && !pv[0].is_none() {
            completed_move = pv[0];
        }
        completed_score = score;
        completed_depth = depth;
        completed_pv = pv.iter().copied().filter(|m| !m.is_none()).collect();

        if control.mate_reached(score) {
            break;
        }
    }

    node_counter.store(ctx.nodes, Ordering::Relaxed);

    HelperResult {
        depth: completed_depth,
        seldepth: ctx.seldepth,
        score: completed_score,
        best_move: completed_move,
        pv: completed_pv,
    }
}

impl std::fmt::Debug for ThreadPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadPool")
            .field("tt", &self.tt)
            .field("num_threads", &self.num_threads)
            .finish()
    }
}

impl Default for ThreadPool {
    fn default() -> Self {
        Self::new(16)
    }
}
