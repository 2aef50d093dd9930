//! UCI command parsing.

use std::time::Duration;

use cesso_core::{Board, Move};

use crate::error::UciError;

/// Parsed arguments of a `go` command.
#[derive(Debug, Clone, Default)]
pub struct GoParams {
    /// White's remaining time.
    pub wtime: Option<Duration>,
    /// Black's remaining time.
    pub btime: Option<Duration>,
    /// White's increment per move.
    pub winc: Option<Duration>,
    /// Black's increment per move.
    pub binc: Option<Duration>,
    /// Moves remaining until the next time control.
    pub movestogo: Option<u32>,
    /// Fixed time to search, overriding the clock-derived limit.
    pub movetime: Option<Duration>,
    /// Fixed depth to search to.
    pub depth: Option<u8>,
    /// Search indefinitely until `stop`.
    pub infinite: bool,
    /// Search the opponent's expected move (clock starts on `ponderhit`).
    pub ponder: bool,
    /// Hard node budget.
    pub nodes: Option<u64>,
    /// Stop once a mate in this many moves is found.
    pub mate: Option<u8>,
    /// Restrict the root move set to these UCI move strings, resolved against
    /// the current board by the caller (`parse_go` has no board context).
    pub search_moves: Vec<String>,
}

/// A parsed UCI command.
#[derive(Debug)]
pub enum Command {
    /// `uci` -- identify the engine.
    Uci,
    /// `isready` -- synchronization ping.
    IsReady,
    /// `ucinewgame` -- reset engine state.
    UciNewGame,
    /// `position` -- set up a board position with optional moves applied.
    ///
    /// The second field carries the Zobrist key of every position reached
    /// while replaying `moves`, from the root FEN/startpos up to (but not
    /// including) the final `Board` — the game history a search needs to
    /// detect repetitions against moves played before its own root.
    Position(Board, Vec<u64>),
    /// `go` -- start a search with the given parameters.
    Go(GoParams),
    /// `ponderhit` -- the predicted move was played; start the clock.
    PonderHit,
    /// `setoption name X value Y` -- change an engine option.
    SetOption {
        /// Option name, as sent (case preserved).
        name: String,
        /// Option value, if any.
        value: Option<String>,
    },
    /// `stop` -- halt the current search.
    Stop,
    /// `quit` -- exit the engine.
    Quit,
    /// Unrecognized command (silently ignored per UCI spec).
    Unknown(String),
}

/// Parse a single line of UCI input into a [`Command`].
pub fn parse_command(line: &str) -> Result<Command, UciError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.is_empty() {
        return Ok(Command::Unknown(String::new()));
    }

    match tokens[0] {
        "uci" => Ok(Command::Uci),
        "isready" => Ok(Command::IsReady),
        "ucinewgame" => Ok(Command::UciNewGame),
        "ponderhit" => Ok(Command::PonderHit),
        "stop" => Ok(Command::Stop),
        "quit" => Ok(Command::Quit),
        "position" => parse_position(&tokens[1..]),
        "go" => parse_go(&tokens[1..]),
        "setoption" => parse_setoption(&tokens[1..]),
        _ => Ok(Command::Unknown(tokens[0].to_string())),
    }
}

/// Parse the `position` command arguments.
///
/// Supports:
/// - `position startpos [moves e2e4 d7d5 ...]`
/// - `position fen <fen-string> [moves e2e4 d7d5 ...]`
fn parse_position(tokens: &[&str]) -> Result<Command, UciError> {
    if tokens.is_empty() {
        return Err(UciError::MalformedPosition);
    }

    let (mut board, rest) = if tokens[0] == "startpos" {
        let rest = &tokens[1..];
        (Board::starting_position(), rest)
    } else if tokens[0] == "fen" {
        // FEN is 6 space-separated fields
        if tokens.len() < 7 {
            return Err(UciError::InvalidFen {
                fen: tokens[1..].join(" "),
            });
        }
        let fen = tokens[1..7].join(" ");
        let board: Board = fen.parse().map_err(|_| UciError::InvalidFen {
            fen: fen.clone(),
        })?;
        (board, &tokens[7..])
    } else {
        return Err(UciError::MalformedPosition);
    };

    // Apply moves if present: "moves e2e4 d7d5 ...", recording each
    // intermediate position's key before advancing past it.
    let mut history = Vec::new();
    if !rest.is_empty() && rest[0] == "moves" {
        for uci_str in &rest[1..] {
            let mv = Move::from_uci(uci_str, &board).ok_or_else(|| UciError::InvalidMove {
                uci_move: uci_str.to_string(),
            })?;
            history.push(board.hash());
            board = board.make_move(mv);
        }
    }

    Ok(Command::Position(board, history))
}

/// Parse the `go` command arguments into a [`GoParams`].
///
/// Recognizes `wtime`, `btime`, `winc`, `binc`, `movestogo`, `movetime`,
/// `depth`, `nodes`, `mate`, `infinite`, `ponder`, and `searchmoves`. Any
/// other unknown subcommand is skipped rather than rejected, per the UCI
/// convention of ignoring parameters an engine doesn't implement.
fn parse_go(tokens: &[&str]) -> Result<Command, UciError> {
    let mut params = GoParams::default();

    let mut i = 0;
    while i < tokens.len() {
        match tokens[i] {
            "infinite" => {
                params.infinite = true;
                i += 1;
            }
            "ponder" => {
                params.ponder = true;
                i += 1;
            }
            "wtime" => {
                params.wtime = Some(parse_ms(tokens, &mut i, "wtime")?);
            }
            "btime" => {
                params.btime = Some(parse_ms(tokens, &mut i, "btime")?);
            }
            "winc" => {
                params.winc = Some(parse_ms(tokens, &mut i, "winc")?);
            }
            "binc" => {
                params.binc = Some(parse_ms(tokens, &mut i, "binc")?);
            }
            "movetime" => {
                params.movetime = Some(parse_ms(tokens, &mut i, "movetime")?);
            }
            "movestogo" => {
                let value = next_value(tokens, &mut i, "movestogo")?;
                params.movestogo = Some(value.parse().map_err(|_| UciError::InvalidGoValue {
                    param: "movestogo".to_string(),
                    value: value.to_string(),
                })?);
            }
            "depth" => {
                let value = next_value(tokens, &mut i, "depth")?;
                params.depth = Some(value.parse().map_err(|_| UciError::InvalidGoValue {
                    param: "depth".to_string(),
                    value: value.to_string(),
                })?);
            }
            "nodes" => {
                let value = next_value(tokens, &mut i, "nodes")?;
                params.nodes = Some(value.parse().map_err(|_| UciError::InvalidGoValue {
                    param: "nodes".to_string(),
                    value: value.to_string(),
                })?);
            }
            "mate" => {
                let value = next_value(tokens, &mut i, "mate")?;
                params.mate = Some(value.parse().map_err(|_| UciError::InvalidGoValue {
                    param: "mate".to_string(),
                    value: value.to_string(),
                })?);
            }
            "searchmoves" => {
                // The move strings are resolved against the current board by
                // the caller — `parse_go` itself has no board context.
                i += 1;
                while i < tokens.len() && !is_go_keyword(tokens[i]) {
                    params.search_moves.push(tokens[i].to_string());
                    i += 1;
                }
            }
            _ => {
                // Unrecognized subcommand — skip its value token too, if it
                // looks like one, so parsing doesn't desync on engines that
                // send more than we implement.
                i += 1;
                if i < tokens.len() && tokens[i].parse::<i64>().is_ok() {
                    i += 1;
                }
            }
        }
    }

    Ok(Command::Go(params))
}

/// Whether `tok` is a `go` subcommand keyword (used to find the end of a
/// variable-length argument list like `searchmoves`).
fn is_go_keyword(tok: &str) -> bool {
    matches!(
        tok,
        "searchmoves"
            | "ponder"
            | "wtime"
            | "btime"
            | "winc"
            | "binc"
            | "movestogo"
            | "depth"
            | "nodes"
            | "mate"
            | "movetime"
            | "infinite"
    )
}

/// Consume `tokens[i]` (the keyword) and `tokens[i+1]` (its value), advancing
/// `i` past both and returning the value string.
fn next_value<'a>(tokens: &[&'a str], i: &mut usize, param: &str) -> Result<&'a str, UciError> {
    let keyword_idx = *i;
    let value_idx = keyword_idx + 1;
    if value_idx >= tokens.len() {
        return Err(UciError::MissingGoValue {
            param: param.to_string(),
        });
    }
    *i = value_idx + 1;
    Ok(tokens[value_idx])
}

/// Like [`next_value`], parsed as milliseconds into a [`Duration`].
fn parse_ms(tokens: &[&str], i: &mut usize, param: &str) -> Result<Duration, UciError> {
    let value = next_value(tokens, i, param)?;
    let ms: u64 = value.parse().map_err(|_| UciError::InvalidGoValue {
        param: param.to_string(),
        value: value.to_string(),
    })?;
    Ok(Duration::from_millis(ms))
}

/// Parse `setoption name <name> [value <value>]`.
fn parse_setoption(tokens: &[&str]) -> Result<Command, UciError> {
    if tokens.first() != Some(&"name") {
        return Err(UciError::MalformedOption);
    }

    let mut name_parts = Vec::new();
    let mut i = 1;
    while i < tokens.len() && tokens[i] != "value" {
        name_parts.push(tokens[i]);
        i += 1;
    }
    if name_parts.is_empty() {
        return Err(UciError::MalformedOption);
    }

    let value = if i < tokens.len() && tokens[i] == "value" {
        Some(tokens[i + 1..].join(" "))
    } else {
        None
    };

    Ok(Command::SetOption {
        name: name_parts.join(" "),
        value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_uci() {
        assert!(matches!(parse_command("uci").unwrap(), Command::Uci));
    }

    #[test]
    fn parse_isready() {
        assert!(matches!(parse_command("isready").unwrap(), Command::IsReady));
    }

    #[test]
    fn parse_quit() {
        assert!(matches!(parse_command("quit").unwrap(), Command::Quit));
    }

    #[test]
    fn parse_ucinewgame() {
        assert!(matches!(
            parse_command("ucinewgame").unwrap(),
            Command::UciNewGame
        ));
    }

    #[test]
    fn parse_ponderhit() {
        assert!(matches!(
            parse_command("ponderhit").unwrap(),
            Command::PonderHit
        ));
    }

    #[test]
    fn parse_position_startpos() {
        let cmd = parse_command("position startpos").unwrap();
        assert!(matches!(cmd, Command::Position(_, _)));
    }

    #[test]
    fn parse_position_startpos_with_moves() {
        let cmd = parse_command("position startpos moves e2e4 e7e5").unwrap();
        assert!(matches!(cmd, Command::Position(_, _)));
    }

    #[test]
    fn parse_position_fen() {
        let cmd = parse_command(
            "position fen rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1",
        )
        .unwrap();
        assert!(matches!(cmd, Command::Position(_, _)));
    }

    #[test]
    fn parse_go_depth() {
        let cmd = parse_command("go depth 6").unwrap();
        match cmd {
            Command::Go(params) => assert_eq!(params.depth, Some(6)),
            _ => panic!("expected Go"),
        }
    }

    #[test]
    fn parse_go_bare_has_no_limits() {
        let cmd = parse_command("go").unwrap();
        match cmd {
            Command::Go(params) => {
                assert_eq!(params.depth, None);
                assert!(!params.infinite);
                assert!(!params.ponder);
            }
            _ => panic!("expected Go"),
        }
    }

    #[test]
    fn parse_go_infinite() {
        let cmd = parse_command("go infinite").unwrap();
        match cmd {
            Command::Go(params) => assert!(params.infinite),
            _ => panic!("expected Go"),
        }
    }

    #[test]
    fn parse_go_clock_params() {
        let cmd = parse_command("go wtime 60000 btime 60000 winc 1000 binc 1000 movestogo 20")
            .unwrap();
        match cmd {
            Command::Go(params) => {
                assert_eq!(params.wtime, Some(Duration::from_millis(60000)));
                assert_eq!(params.btime, Some(Duration::from_millis(60000)));
                assert_eq!(params.winc, Some(Duration::from_millis(1000)));
                assert_eq!(params.binc, Some(Duration::from_millis(1000)));
                assert_eq!(params.movestogo, Some(20));
            }
            _ => panic!("expected Go"),
        }
    }

    #[test]
    fn parse_go_movetime() {
        let cmd = parse_command("go movetime 5000").unwrap();
        match cmd {
            Command::Go(params) => assert_eq!(params.movetime, Some(Duration::from_millis(5000))),
            _ => panic!("expected Go"),
        }
    }

    #[test]
    fn parse_go_ponder() {
        let cmd = parse_command("go ponder wtime 60000 btime 60000").unwrap();
        match cmd {
            Command::Go(params) => assert!(params.ponder),
            _ => panic!("expected Go"),
        }
    }

    #[test]
    fn parse_go_nodes() {
        let cmd = parse_command("go nodes 500000 depth 10").unwrap();
        match cmd {
            Command::Go(params) => {
                assert_eq!(params.nodes, Some(500_000));
                assert_eq!(params.depth, Some(10));
            }
            _ => panic!("expected Go"),
        }
    }

    #[test]
    fn parse_go_mate() {
        let cmd = parse_command("go mate 3").unwrap();
        match cmd {
            Command::Go(params) => assert_eq!(params.mate, Some(3)),
            _ => panic!("expected Go"),
        }
    }

    #[test]
    fn parse_go_searchmoves() {
        let cmd = parse_command("go searchmoves e2e4 d2d4 depth 6").unwrap();
        match cmd {
            Command::Go(params) => {
                assert_eq!(params.search_moves, vec!["e2e4", "d2d4"]);
                assert_eq!(params.depth, Some(6));
            }
            _ => panic!("expected Go"),
        }
    }

    #[test]
    fn parse_go_unknown_subcommand_skipped() {
        let cmd = parse_command("go banana 500000 depth 10").unwrap();
        match cmd {
            Command::Go(params) => assert_eq!(params.depth, Some(10)),
            _ => panic!("expected Go"),
        }
    }

    #[test]
    fn parse_unknown_command() {
        let cmd = parse_command("foobar").unwrap();
        assert!(matches!(cmd, Command::Unknown(_)));
    }

    #[test]
    fn parse_empty_line() {
        let cmd = parse_command("").unwrap();
        assert!(matches!(cmd, Command::Unknown(_)));
    }

    #[test]
    fn parse_position_missing_keyword() {
        let result = parse_command("position");
        assert!(result.is_err());
    }

    #[test]
    fn parse_position_invalid_fen() {
        let result = parse_command("position fen invalid");
        assert!(result.is_err());
    }

    #[test]
    fn parse_stop() {
        assert!(matches!(parse_command("stop").unwrap(), Command::Stop));
    }

    #[test]
    fn parse_setoption_hash() {
        let cmd = parse_command("setoption name Hash value 256").unwrap();
        match cmd {
            Command::SetOption { name, value } => {
                assert_eq!(name, "Hash");
                assert_eq!(value, Some("256".to_string()));
            }
            _ => panic!("expected SetOption"),
        }
    }

    #[test]
    fn parse_setoption_multiword_name() {
        let cmd = parse_command("setoption name Move Overhead value 50").unwrap();
        match cmd {
            Command::SetOption { name, value } => {
                assert_eq!(name, "Move Overhead");
                assert_eq!(value, Some("50".to_string()));
            }
            _ => panic!("expected SetOption"),
        }
    }

    #[test]
    fn parse_setoption_no_value() {
        let cmd = parse_command("setoption name Ponder").unwrap();
        match cmd {
            Command::SetOption { name, value } => {
                assert_eq!(name, "Ponder");
                assert_eq!(value, None);
            }
            _ => panic!("expected SetOption"),
        }
    }

    #[test]
    fn parse_setoption_missing_name_errors() {
        let result = parse_command("setoption value 256");
        assert!(result.is_err());
    }
}
