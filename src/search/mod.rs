//! The search driver: recursive negamax with alpha-beta pruning,
//! transposition cutoffs, draw short-circuiting, and an iterative-deepening
//! outer loop.
//!
//! The search never mutates a shared position: each move is applied to a
//! copy, and every value is returned from the current side's perspective
//! (the caller negates).

pub mod time;
pub mod tt;

use crate::defs::*;
use crate::movegen::generate_moves;
use crate::mv::{Move, MOVE_NONE};
use crate::nnue::NnueNetwork;
use crate::position::Position;
use std::sync::Arc;
use std::time::Instant;

use self::time::TimeLimits;
use self::tt::{score_from_tt, score_to_tt, AtomicTT, Bound, INFINITY, MATE, MATE_BOUND};

/// Sentinel below every reachable score; marks "no legal move seen yet".
const SCORE_NONE: i32 = -INFINITY - 1;

const MATERIAL_VALUES: [i32; MATERIAL_CLASS_COUNT] = [100, 300, 300, 500, 900];

/// Material-only evaluation from the side to move's perspective. The
/// fallback when no network is loaded, and the fast path the counts in
/// `Position` exist for.
pub fn material_eval(pos: &Position) -> i32 {
    let mut m = 0;
    for class in 0..MATERIAL_CLASS_COUNT {
        m += (pos.material_count[WHITE as usize][class] as i32
            - pos.material_count[BLACK as usize][class] as i32)
            * MATERIAL_VALUES[class];
    }
    if pos.side == BLACK {
        -m
    } else {
        m
    }
}

/// Per-worker search state. Exclusively owned by one search thread; only the
/// transposition table behind the `Arc` is ever shared.
pub struct SearchContext {
    pub nodes: u64,
    /// Moves made while descending the current search only.
    pub search_ply: u16,
    /// Real-game plies plus the current search descent.
    pub game_ply: u16,
    pub game_hist: Vec<GameHistory>,
    pub start_time: Instant,
    pub limits: TimeLimits,
    pub tt: Arc<AtomicTT>,
    pub network: Option<Arc<NnueNetwork>>,
    accumulators: crate::nnue::accumulator::AccumulatorStack,
    pub thread_id: u16,
}

impl SearchContext {
    pub fn new(tt: Arc<AtomicTT>, network: Option<Arc<NnueNetwork>>) -> Self {
        SearchContext {
            nodes: 0,
            search_ply: 0,
            game_ply: 0,
            game_hist: vec![GameHistory::default(); GAME_HIST_SIZE],
            start_time: Instant::now(),
            limits: TimeLimits::default(),
            tt,
            network,
            accumulators: crate::nnue::accumulator::AccumulatorStack::new(),
            thread_id: 0,
        }
    }

    /// Record a move actually played in the game (outside any search).
    /// Advances `game_ply` only; `search_ply` belongs to the search descent.
    pub fn record_game_move(&mut self, position_key: u64, mv: Move, piece: u8) {
        assert!((self.game_ply as usize) < GAME_HIST_SIZE, "game history overflow");
        self.game_hist[self.game_ply as usize] = GameHistory {
            position_key,
            played_move: mv,
            piece_moved: piece,
        };
        self.game_ply += 1;
    }

    /// Forget the recorded game line (new game / new root position).
    pub fn clear_game_history(&mut self) {
        self.game_ply = 0;
    }

    fn search_push(&mut self, position_key: u64, mv: Move, piece: u8) {
        assert!((self.game_ply as usize) < GAME_HIST_SIZE, "game history overflow");
        self.search_ply += 1;
        self.game_hist[self.game_ply as usize] = GameHistory {
            position_key,
            played_move: mv,
            piece_moved: piece,
        };
        self.game_ply += 1;
    }

    fn search_pop(&mut self) {
        debug_assert!(self.search_ply > 0 && self.game_ply > 0);
        self.search_ply -= 1;
        self.game_ply -= 1;
    }

    /// Static evaluation of the position at the current search ply.
    pub fn evaluate(&self, pos: &Position) -> i32 {
        match &self.network {
            Some(net) => net.evaluate(self.accumulators.current(), pos.side),
            None => material_eval(pos),
        }
    }

    /// Rebuild the accumulator base frame for a new search root.
    pub fn reset_eval(&mut self, pos: &Position) {
        let Self {
            network,
            accumulators,
            ..
        } = self;
        if let Some(net) = network {
            accumulators.reset(net, pos);
        }
    }

    /// Push the evaluator frame for `mv`, taken from `pos` (before the move)
    /// to `next` (after it). A king crossing the d/e file boundary re-keys
    /// that perspective's features, so those moves (queenside castling
    /// included) rebuild the frame instead of applying a delta.
    fn push_eval_frame(&mut self, pos: &Position, next: &Position, mv: Move) {
        let Self {
            network,
            accumulators,
            ..
        } = self;
        let Some(net) = network else { return };

        let from = mv.from_sq();
        let to = mv.to_sq();
        let piece = pos.piece_on(from);
        let class = piece_class(piece);

        if class == KING && (to_sq64(from) & 4) != (to_sq64(to) & 4) {
            accumulators.push_reset(net, next);
            return;
        }
        if class == KING && file_of(from).abs_diff(file_of(to)) == 2 {
            // Kingside castle; queenside crossed the half boundary above.
            let rank = rank_of(from);
            accumulators.push_castle(
                net,
                piece,
                from,
                to,
                make_piece(ROOK, pos.side),
                square(7, rank),
                square(5, rank),
            );
            return;
        }

        let to_piece = match mv.prom() {
            Some(p) => make_piece(p, pos.side),
            None => piece,
        };
        let mut captured = pos.piece_on(to);
        let mut captured_sq = to;
        if captured == BLANK && class == PAWN && file_of(from) != file_of(to) {
            captured_sq = square(file_of(to), rank_of(from));
            captured = pos.piece_on(captured_sq);
        }

        if captured != BLANK {
            accumulators.push_capture(net, piece, from, to_piece, to, captured, captured_sq);
        } else {
            accumulators.push_move(net, piece, from, to_piece, to);
        }
    }

    fn pop_eval_frame(&mut self) {
        if self.network.is_some() {
            self.accumulators.pop();
        }
    }
}

/// Neither side can force mate: no pawns, rooks or queens anywhere, and no
/// side holds more than one knight, more than two bishops, or a bishop and
/// knight together.
pub fn material_draw(pos: &Position) -> bool {
    for color in 0..COLOR_COUNT {
        let counts = &pos.material_count[color];
        if counts[PAWN] != 0 || counts[ROOK] != 0 || counts[QUEEN] != 0 {
            return false;
        }
    }
    for color in 0..COLOR_COUNT {
        let knights = pos.material_count[color][KNIGHT];
        let bishops = pos.material_count[color][BISHOP];
        if knights > 1 || bishops > 2 || (knights > 0 && bishops > 0) {
            return false;
        }
    }
    true
}

/// The three draw conditions checked before scoring a node: fifty-move rule,
/// insufficient material, and a single in-search repetition (one matching
/// prior occurrence is enough inside the tree; the strict threefold rule is
/// the arbiter's business, not the search's).
pub fn is_draw(pos: &Position, ctx: &SearchContext, hash: u64) -> bool {
    if pos.halfmoves >= 100 {
        return true;
    }
    if material_draw(pos) {
        return true;
    }
    // game_ply - 4 is the first offset a same-side repetition can occur at;
    // nothing before the last capture or pawn move can repeat.
    let game_ply = ctx.game_ply as i32;
    let end = (game_ply - pos.halfmoves as i32).max(0);
    let mut i = game_ply - 4;
    while i >= end {
        if hash == ctx.game_hist[i as usize].position_key {
            return true;
        }
        i -= 2;
    }
    false
}

/// Recursive negamax with alpha-beta pruning. Returns the score of `pos`
/// from the side to move's perspective.
pub fn search(
    mut alpha: i32,
    beta: i32,
    depth: i32,
    pos: &Position,
    ctx: &mut SearchContext,
) -> i32 {
    ctx.nodes += 1;
    if depth <= 0 {
        return ctx.evaluate(pos);
    }

    let root = ctx.search_ply == 0;
    let hash = pos.hash();

    if !root && is_draw(pos, ctx, hash) {
        // Not a real evaluation: a tiny parity nudge off zero so the engine
        // steers around repetitions instead of oscillating into them.
        return 2 - (ctx.nodes & 3) as i32;
    }

    let mut tt_move = MOVE_NONE;
    if let Some(entry) = ctx.tt.probe(hash) {
        let tt_score = score_from_tt(entry.score, ctx.search_ply);
        tt_move = entry.best_move;
        if !root && entry.depth as i32 >= depth {
            let usable = match entry.bound {
                Bound::Exact => true,
                Bound::LowerBound => tt_score >= beta,
                Bound::UpperBound => tt_score <= alpha,
                Bound::None => false,
            };
            if usable {
                return tt_score;
            }
        }
    }

    let mut moves = generate_moves(pos);
    // Seed move ordering with the table's best move from a shallower pass.
    if !tt_move.is_none() {
        if let Some(idx) = (0..moves.count).find(|&i| moves.moves[i] == tt_move) {
            moves.moves.swap(0, idx);
        }
    }

    let mut best_score = SCORE_NONE;
    let mut best_move = MOVE_NONE;
    let mut raised_alpha = false;

    for idx in 0..moves.count {
        let mv = moves.moves[idx];
        let mut next = pos.clone();
        if !next.make_move(mv) {
            continue;
        }

        ctx.push_eval_frame(pos, &next, mv);
        ctx.search_push(hash, mv, pos.piece_on(mv.from_sq()));
        let score = -search(-beta, -alpha, depth - 1, &next, ctx);
        ctx.search_pop();
        ctx.pop_eval_frame();

        if score > best_score {
            best_score = score;
            best_move = mv;
            if score > alpha {
                raised_alpha = true;
                alpha = score;
            }
            if score >= beta {
                break;
            }
        }
    }

    if best_score == SCORE_NONE {
        // No legal move: mate if the king is attacked, stalemate otherwise.
        // Shallower mates score as more severe.
        return if pos.in_check(pos.side) {
            -MATE + ctx.search_ply as i32
        } else {
            0
        };
    }

    let bound = if best_score >= beta {
        Bound::LowerBound
    } else if raised_alpha {
        Bound::Exact
    } else {
        Bound::UpperBound
    };
    ctx.tt.store(
        hash,
        depth as u8,
        best_move,
        score_to_tt(best_score, ctx.search_ply),
        bound,
    );

    best_score
}

/// Format a score for `info` output: centipawns, or moves-to-mate for
/// scores in the mate range.
fn score_string(score: i32) -> String {
    if score > MATE_BOUND {
        format!("mate {}", (MATE - score + 1) / 2)
    } else if score < -MATE_BOUND {
        format!("mate -{}", (MATE + score + 1) / 2)
    } else {
        format!("cp {}", score)
    }
}

/// Iterative deepening: search depths 1..=N, reusing the transposition
/// table across iterations so each shallower pass seeds move ordering for
/// the next. Reports score, nodes and elapsed time after every depth.
pub fn iterative_deepen(pos: &Position, ctx: &mut SearchContext) -> Option<Move> {
    ctx.start_time = Instant::now();
    ctx.nodes = 0;
    ctx.search_ply = 0;
    ctx.reset_eval(pos);

    let root_hash = pos.hash();
    let mut best_move = None;

    for depth in 1..=ctx.limits.max_depth() {
        let score = search(-INFINITY, INFINITY, depth, pos, ctx);

        if let Some(entry) = ctx.tt.probe(root_hash) {
            if !entry.best_move.is_none() {
                best_move = Some(entry.best_move);
            }
        }

        let elapsed = ctx.start_time.elapsed().as_millis() as u64;
        let pv = best_move.map(|m| m.to_string()).unwrap_or_default();
        println!(
            "info depth {} score {} nodes {} time {} pv {}",
            depth,
            score_string(score),
            ctx.nodes,
            elapsed,
            pv
        );

        if ctx.limits.out_of_time(elapsed, pos.side) {
            break;
        }
    }

    best_move
}
