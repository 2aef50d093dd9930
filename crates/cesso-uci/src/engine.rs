//! Event-driven, multi-threaded UCI engine with pondering support.

use std::io::{self, BufRead};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, mpsc};

use tracing::{debug, info, warn};

use cesso_core::{Board, Move};
use cesso_engine::{MATE_SCORE, MATE_THRESHOLD, SearchControl, SearchResult, ThreadPool, limits_from_go};

use crate::command::{Command, GoParams, parse_command};
use crate::error::UciError;

/// Default transposition table size, in megabytes, before `setoption Hash` is sent.
const DEFAULT_HASH_MB: usize = 16;

/// Internal engine state — tracks whether the engine is idle, searching, or pondering.
enum EngineState {
    Idle,
    Searching,
    Pondering,
}

/// Events processed by the main engine loop.
enum EngineEvent {
    UciCommand(Result<Command, UciError>),
    SearchDone(SearchDone),
    InputClosed,
}

/// Payload returned by the search thread when it finishes.
struct SearchDone {
    result: SearchResult,
    pool: ThreadPool,
}

/// The UCI engine, holding current board state and the Lazy SMP thread pool.
///
/// Runs an event-driven loop on the main thread, dispatching searches
/// to a worker thread and processing UCI commands concurrently.
pub struct UciEngine {
    board: Board,
    /// Zobrist keys of every position played before `board`, for repetition
    /// detection across the `go` boundary.
    game_history: Vec<u64>,
    pool: Option<ThreadPool>,
    state: EngineState,
    stop_flag: Arc<AtomicBool>,
    control: Option<Arc<SearchControl>>,
    pending_clear_tt: bool,
    /// `setoption` changes received while the pool was owned by the search
    /// thread, applied once it's handed back in [`Self::finish_search`].
    pending_hash_mb: Option<usize>,
    pending_threads: Option<usize>,
    pending_contempt: Option<i32>,
}

impl UciEngine {
    /// Create a new engine with the starting position.
    pub fn new() -> Self {
        Self {
            board: Board::starting_position(),
            game_history: Vec::new(),
            pool: Some(ThreadPool::new(DEFAULT_HASH_MB)),
            state: EngineState::Idle,
            stop_flag: Arc::new(AtomicBool::new(false)),
            control: None,
            pending_clear_tt: false,
            pending_hash_mb: None,
            pending_threads: None,
            pending_contempt: None,
        }
    }

    /// Run the UCI event loop, reading from stdin until `quit` or input closes.
    pub fn run(mut self) -> Result<(), UciError> {
        let (tx, rx) = mpsc::channel::<EngineEvent>();

        // Spawn stdin reader thread
        let stdin_tx = tx.clone();
        std::thread::spawn(move || {
            let stdin = io::stdin();
            let reader = stdin.lock();
            for line in reader.lines() {
                match line {
                    Ok(line) => {
                        let trimmed = line.trim().to_string();
                        if trimmed.is_empty() {
                            continue;
                        }
                        debug!(cmd = %trimmed, "received UCI command");
                        let cmd = parse_command(&trimmed);
                        if stdin_tx.send(EngineEvent::UciCommand(cmd)).is_err() {
                            break;
                        }
                    }
                    Err(_) => {
                        let _ = stdin_tx.send(EngineEvent::InputClosed);
                        break;
                    }
                }
            }
            let _ = stdin_tx.send(EngineEvent::InputClosed);
        });

        for event in &rx {
            match event {
                EngineEvent::UciCommand(Ok(cmd)) => match cmd {
                    Command::Uci => self.handle_uci(),
                    Command::IsReady => self.handle_isready(),
                    Command::UciNewGame => self.handle_ucinewgame(),
                    Command::Position(board, history) => self.handle_position(board, history),
                    Command::Go(params) => self.handle_go(params, &tx),
                    Command::PonderHit => self.handle_ponderhit(),
                    Command::SetOption { name, value } => self.handle_setoption(name, value),
                    Command::Stop => self.handle_stop(),
                    Command::Quit => {
                        // Stop any active search and wait for it to finish
                        if !matches!(self.state, EngineState::Idle) {
                            self.handle_stop();
                            // Drain events until we get SearchDone
                            for ev in &rx {
                                if let EngineEvent::SearchDone(done) = ev {
                                    self.finish_search(done);
                                    break;
                                }
                            }
                        }
                        break;
                    }
                    Command::Unknown(_) => {}
                },
                EngineEvent::UciCommand(Err(e)) => {
                    warn!(error = %e, "UCI parse error");
                }
                EngineEvent::SearchDone(done) => {
                    self.finish_search(done);
                }
                EngineEvent::InputClosed => break,
            }
        }

        info!("cesso shutting down");
        Ok(())
    }

    fn handle_uci(&self) {
        println!("id name cesso");
        println!("id author Nicolas Lazaro");
        println!("option name Hash type spin default {DEFAULT_HASH_MB} min 1 max 33554432");
        println!("option name Threads type spin default 1 min 1 max 1024");
        println!("option name Contempt type spin default 0 min -100 max 100");
        println!("option name Ponder type check default false");
        println!("uciok");
    }

    fn handle_isready(&self) {
        println!("readyok");
    }

    fn handle_ucinewgame(&mut self) {
        self.board = Board::starting_position();
        self.game_history.clear();
        if let Some(ref pool) = self.pool {
            pool.clear_tt();
        } else {
            // Search thread owns the pool — defer clear until it comes back
            self.pending_clear_tt = true;
        }
    }

    fn handle_position(&mut self, board: Board, history: Vec<u64>) {
        self.board = board;
        self.game_history = history;
    }

    fn handle_setoption(&mut self, name: String, value: Option<String>) {
        match name.as_str() {
            "Hash" => {
                let Some(value) = value else {
                    warn!("setoption Hash missing value");
                    return;
                };
                match value.parse::<usize>() {
                    Ok(mb) if mb >= 1 => {
                        if let Some(ref mut pool) = self.pool {
                            pool.resize_tt(mb);
                        } else {
                            self.pending_hash_mb = Some(mb);
                        }
                    }
                    _ => warn!(value = %value, "invalid Hash value"),
                }
            }
            "Threads" => {
                let Some(value) = value else {
                    warn!("setoption Threads missing value");
                    return;
                };
                match value.parse::<usize>() {
                    Ok(n) if n >= 1 => {
                        if let Some(ref mut pool) = self.pool {
                            pool.set_num_threads(n);
                        } else {
                            self.pending_threads = Some(n);
                        }
                    }
                    _ => warn!(value = %value, "invalid Threads value"),
                }
            }
            "Contempt" => {
                let Some(value) = value else {
                    warn!("setoption Contempt missing value");
                    return;
                };
                match value.parse::<i32>() {
                    Ok(c) => {
                        if let Some(ref mut pool) = self.pool {
                            pool.set_contempt(c);
                        } else {
                            self.pending_contempt = Some(c);
                        }
                    }
                    _ => warn!(value = %value, "invalid Contempt value"),
                }
            }
            "Ponder" => {
                // Pondering is driven entirely by whether `go` carries
                // `ponder`; this option exists only so GUIs can advertise
                // and toggle it without an error.
            }
            other => warn!(option = %other, "unknown UCI option"),
        }
    }

    fn handle_go(&mut self, params: GoParams, tx: &mpsc::Sender<EngineEvent>) {
        if !matches!(self.state, EngineState::Idle) {
            warn!("go received while not idle, ignoring");
            return;
        }

        // Reset stop flag
        self.stop_flag = Arc::new(AtomicBool::new(false));

        let side = self.board.side_to_move();
        let control = Arc::new(
            limits_from_go(
                params.wtime,
                params.btime,
                params.winc,
                params.binc,
                params.movestogo,
                params.movetime,
                params.infinite,
                params.ponder,
                side,
                Arc::clone(&self.stop_flag),
            )
            .with_node_limit(params.nodes)
            .with_mate_limit(params.mate),
        );

        let max_depth = params.depth.unwrap_or(128);

        // Resolve `searchmoves` UCI strings against the current board; an
        // unparseable move is dropped rather than failing the whole search.
        let search_moves: Vec<Move> = params
            .search_moves
            .iter()
            .filter_map(|s| Move::from_uci(s, &self.board))
            .collect();

        // Take the pool — the search thread will own it
        let mut pool = self.pool.take().unwrap_or_default();

        let board = self.board;
        let history = self.game_history.clone();
        let search_control = Arc::clone(&control);
        let tx = tx.clone();

        std::thread::spawn(move || {
            let result = pool.search(
                &board,
                max_depth,
                &search_control,
                &history,
                &search_moves,
                |d, score, nodes, seldepth, pv| {
                    let elapsed = search_control.elapsed();
                    let elapsed_ms = elapsed.as_millis().max(1);
                    let nps = (nodes as u128 * 1000) / elapsed_ms;

                    let pv_str: String = pv
                        .iter()
                        .filter(|m| !m.is_none())
                        .map(|m| m.to_uci())
                        .collect::<Vec<_>>()
                        .join(" ");

                    let score_str = if score.abs() > MATE_THRESHOLD {
                        let mate_in = (MATE_SCORE - score.abs() + 1) / 2;
                        let signed = if score > 0 { mate_in } else { -mate_in };
                        format!("mate {signed}")
                    } else {
                        format!("cp {score}")
                    };

                    println!(
                        "info depth {} seldepth {} score {} nodes {} nps {} hashfull {} time {} pv {}",
                        d,
                        seldepth,
                        score_str,
                        nodes,
                        nps,
                        pool.hashfull(),
                        elapsed_ms,
                        pv_str
                    );
                },
            );
            let _ = tx.send(EngineEvent::SearchDone(SearchDone { result, pool }));
        });

        self.state = if params.ponder {
            EngineState::Pondering
        } else {
            EngineState::Searching
        };
        self.control = Some(control);
    }

    fn handle_ponderhit(&mut self) {
        if !matches!(self.state, EngineState::Pondering) {
            warn!("ponderhit received while not pondering, ignoring");
            return;
        }
        if let Some(ref control) = self.control {
            control.activate();
        }
        self.state = EngineState::Searching;
    }

    fn handle_stop(&mut self) {
        self.stop_flag.store(true, Ordering::Release);
    }

    fn finish_search(&mut self, done: SearchDone) {
        let mut pool = done.pool;

        if self.pending_clear_tt {
            pool.clear_tt();
            self.pending_clear_tt = false;
        }
        if let Some(mb) = self.pending_hash_mb.take() {
            pool.resize_tt(mb);
        }
        if let Some(n) = self.pending_threads.take() {
            pool.set_num_threads(n);
        }
        if let Some(c) = self.pending_contempt.take() {
            pool.set_contempt(c);
        }

        self.pool = Some(pool);
        self.control = None;

        let result = &done.result;
        if result.best_move.is_none() {
            println!("bestmove 0000");
        } else {
            match result.ponder_move {
                Some(pm) if !pm.is_none() => {
                    println!(
                        "bestmove {} ponder {}",
                        result.best_move.to_uci(),
                        pm.to_uci()
                    );
                }
                _ => {
                    println!("bestmove {}", result.best_move.to_uci());
                }
            }
        }

        self.state = EngineState::Idle;
    }
}

impl Default for UciEngine {
    fn default() -> Self {
        Self::new()
    }
}
