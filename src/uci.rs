//! UCI front end. Reads commands from stdin, keeps the current game state,
//! and drives the search synchronously: `go` blocks until the iterative
//! deepening loop reports its best move.

use crate::movegen::generate_moves;
use crate::mv::Move;
use crate::nnue::NnueNetwork;
use crate::position::Position;
use crate::search::time::TimeLimits;
use crate::search::tt::AtomicTT;
use crate::search::{iterative_deepen, SearchContext};
use anyhow::Result;
use std::io::BufRead;
use std::sync::Arc;

const ENGINE_NAME: &str = "Larch";
const ENGINE_AUTHOR: &str = "the Larch developers";
const DEFAULT_HASH_MB: usize = 16;

pub struct Uci {
    position: Position,
    ctx: SearchContext,
}

impl Uci {
    pub fn new(network: Option<Arc<NnueNetwork>>) -> Self {
        let tt = Arc::new(AtomicTT::new(DEFAULT_HASH_MB));
        Uci {
            position: Position::startpos(),
            ctx: SearchContext::new(tt, network),
        }
    }

    /// Main command loop. Returns when `quit` arrives or stdin closes.
    pub fn run(&mut self) -> Result<()> {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let line = line?;
            if !self.handle_command(line.trim()) {
                break;
            }
        }
        Ok(())
    }

    /// Dispatch one command line. Returns false on `quit`. Unknown commands
    /// are ignored, as the protocol requires.
    pub fn handle_command(&mut self, line: &str) -> bool {
        let mut tokens = line.split_whitespace();
        match tokens.next() {
            Some("uci") => {
                println!("id name {}", ENGINE_NAME);
                println!("id author {}", ENGINE_AUTHOR);
                println!(
                    "option name Hash type spin default {} min 1 max 4096",
                    DEFAULT_HASH_MB
                );
                println!("uciok");
            }
            Some("isready") => println!("readyok"),
            Some("setoption") => self.handle_setoption(line),
            Some("ucinewgame") => {
                self.position = Position::startpos();
                self.ctx.clear_game_history();
                self.ctx.tt.clear();
            }
            Some("position") => {
                if let Err(e) = self.handle_position(line) {
                    eprintln!("info string bad position command: {e}");
                }
            }
            Some("go") => self.handle_go(tokens),
            Some("stop") => {} // searches run to completion synchronously
            Some("d") => self.position.print(),
            Some("quit") => return false,
            _ => {}
        }
        true
    }

    fn handle_setoption(&mut self, line: &str) {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let name = tokens.iter().position(|&t| t == "name").map(|i| i + 1);
        let value = tokens.iter().position(|&t| t == "value").map(|i| i + 1);
        if let (Some(n), Some(v)) = (name, value) {
            if tokens.get(n).map(|s| s.eq_ignore_ascii_case("hash")) == Some(true) {
                if let Some(mb) = tokens.get(v).and_then(|s| s.parse::<usize>().ok()) {
                    // A fresh table is simpler than resizing one other
                    // search contexts may still hold.
                    self.ctx.tt = Arc::new(AtomicTT::new(mb.clamp(1, 4096)));
                }
            }
        }
    }

    /// `position [startpos | fen <fen>] [moves <m1> <m2> ...]`. Rebuilds the
    /// game history from scratch so repetition detection sees the whole
    /// line. Position and history are built into locals and committed
    /// together once the whole command has validated; a rejected command
    /// leaves both untouched.
    fn handle_position(&mut self, line: &str) -> Result<()> {
        let (setup, moves) = match line.split_once(" moves ") {
            Some((s, m)) => (s, Some(m)),
            None => (line, None),
        };

        let mut pos = if let Some(fen) = setup.strip_prefix("position fen ") {
            Position::from_fen(fen)?
        } else {
            Position::startpos()
        };

        let mut line_hist = Vec::new();
        if let Some(moves) = moves {
            for token in moves.split_whitespace() {
                let mv = Move::parse(token)
                    .ok_or_else(|| anyhow::anyhow!("unparseable move {token}"))?;
                if !generate_moves(&pos).iter().any(|m| m == mv) {
                    anyhow::bail!("illegal move {token}");
                }
                let piece = pos.piece_on(mv.from_sq());
                line_hist.push((pos.hash(), mv, piece));
                if !pos.make_move(mv) {
                    anyhow::bail!("illegal move {token}");
                }
            }
        }

        self.ctx.clear_game_history();
        for (key, mv, piece) in line_hist {
            self.ctx.record_game_move(key, mv, piece);
        }
        self.position = pos;
        Ok(())
    }

    fn handle_go<'a>(&mut self, mut tokens: impl Iterator<Item = &'a str>) {
        let mut limits = TimeLimits::default();
        while let Some(token) = tokens.next() {
            let mut value = || tokens.next().and_then(|v| v.parse::<u64>().ok());
            match token {
                "depth" => limits.depth = value().map(|d| d as i32),
                "movetime" => limits.movetime = value(),
                "wtime" => limits.wtime = value(),
                "btime" => limits.btime = value(),
                "winc" => limits.winc = value(),
                "binc" => limits.binc = value(),
                "infinite" => limits.infinite = true,
                _ => {}
            }
        }
        self.ctx.limits = limits;

        match iterative_deepen(&self.position, &mut self.ctx) {
            Some(mv) => println!("bestmove {mv}"),
            None => println!("bestmove 0000"),
        }
    }
}
