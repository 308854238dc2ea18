use larch::movegen::generate_moves;
use larch::position::Position;
use larch::search::tt::{AtomicTT, MATE};
use larch::search::{iterative_deepen, search, SearchContext};
use std::sync::Arc;

fn context() -> SearchContext {
    SearchContext::new(Arc::new(AtomicTT::new(4)), None)
}

#[test]
fn startpos_search_is_roughly_balanced() {
    let pos = Position::startpos();
    let mut ctx = context();
    let score = search(-32_000, 32_000, 3, &pos, &mut ctx);
    // Material-only evaluation: no opening line at depth 3 wins material
    // against a sane reply.
    assert_eq!(score, 0);
    assert!(ctx.nodes > 0);
}

#[test]
fn depth_one_startpos_picks_a_legal_opening_move() {
    let pos = Position::startpos();
    let mut ctx = context();
    ctx.limits.depth = Some(1);
    let best = iterative_deepen(&pos, &mut ctx).expect("a best move");
    assert!(generate_moves(&pos).iter().any(|m| m == best));
    let score = search(-32_000, 32_000, 1, &pos, &mut ctx);
    assert_eq!(score, 0);
}

#[test]
fn search_prefers_winning_a_hanging_queen() {
    // Black queen undefended on d5, white rook on d1 takes it.
    let pos = Position::from_fen("4k3/8/8/3q4/8/8/8/3RK3 w - - 0 1").unwrap();
    let mut ctx = context();
    ctx.limits.depth = Some(3);
    let best = iterative_deepen(&pos, &mut ctx).expect("a best move");
    assert_eq!(best.to_string(), "d1d5");
}

#[test]
fn mate_in_one_is_found_and_scored() {
    // Back-rank mate: Ra8#.
    let pos = Position::from_fen("6k1/5ppp/8/8/8/8/8/R3K3 w - - 0 1").unwrap();
    let mut ctx = context();
    ctx.limits.depth = Some(3);
    let best = iterative_deepen(&pos, &mut ctx).expect("a best move");
    assert_eq!(best.to_string(), "a1a8");

    // Mate delivered one ply below the root.
    let score = search(-32_000, 32_000, 2, &pos, &mut ctx);
    assert_eq!(score, MATE - 1);
}

#[test]
fn mated_side_sees_the_negated_mate_score() {
    // Black to move, already checkmated (no legal moves, in check).
    let pos = Position::from_fen("R5k1/5ppp/8/8/8/8/8/4K3 b - - 0 1").unwrap();
    let mut ctx = context();
    let score = search(-32_000, 32_000, 1, &pos, &mut ctx);
    assert_eq!(score, -MATE);
}

#[test]
fn stalemate_scores_zero() {
    // Black king in the corner, every flight square covered by the queen.
    let pos = Position::from_fen("k7/8/1Q6/8/8/8/8/4K3 b - - 0 1").unwrap();
    let mut ctx = context();
    let score = search(-32_000, 32_000, 1, &pos, &mut ctx);
    assert_eq!(score, 0);
}

#[test]
fn node_counter_resets_per_iterative_search() {
    let pos = Position::startpos();
    let mut ctx = context();
    ctx.limits.depth = Some(2);
    iterative_deepen(&pos, &mut ctx);
    let first = ctx.nodes;
    assert!(first > 0);
    iterative_deepen(&pos, &mut ctx);
    assert!(ctx.nodes > 0);
    // The second run starts from zero again rather than accumulating.
    assert!(ctx.nodes <= first);
}

#[test]
fn deeper_iterations_grow_the_tree() {
    let pos = Position::startpos();

    let mut shallow = context();
    shallow.limits.depth = Some(1);
    iterative_deepen(&pos, &mut shallow);

    let mut deep = context();
    deep.limits.depth = Some(3);
    iterative_deepen(&pos, &mut deep);

    assert!(deep.nodes > shallow.nodes);
}
