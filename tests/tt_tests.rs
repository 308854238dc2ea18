use larch::mv::Move;
use larch::search::tt::{score_from_tt, score_to_tt, AtomicTT, Bound, MATE};

fn sample_move() -> Move {
    Move::parse("e2e4").unwrap()
}

#[test]
fn store_then_probe_returns_the_entry() {
    let tt = AtomicTT::new(1);
    let hash = 0xDEAD_BEEF_CAFE_F00D;
    tt.store(hash, 5, sample_move(), 42, Bound::Exact);

    let entry = tt.probe(hash).expect("entry should be found");
    assert_eq!(entry.depth, 5);
    assert_eq!(entry.score, 42);
    assert_eq!(entry.best_move, sample_move());
    assert_eq!(entry.bound, Bound::Exact);
}

#[test]
fn probe_of_unknown_hash_misses() {
    let tt = AtomicTT::new(1);
    assert!(tt.probe(0x1234_5678).is_none());
}

#[test]
fn index_collisions_with_different_upper_bits_miss() {
    // Two hashes sharing the slot (same low bits) but differing in the
    // upper key fragment must not be confused for each other.
    let tt = AtomicTT::new(1);
    let a = 0x0000_0000_0001_2345u64;
    let b = 0xFFFF_FFFF_0001_2345u64;
    tt.store(a, 12, sample_move(), 500, Bound::Exact);
    assert!(tt.probe(a).is_some());
    assert!(tt.probe(b).is_none());
}

#[test]
fn full_fragment_collisions_are_tolerated_hints() {
    // Hashes that agree on both the slot and the upper fragment but differ
    // in the middle bits alias to the same entry. The search tolerates
    // this: depth and bound gate how the hit may be used, and the move is
    // only an ordering hint.
    let tt = AtomicTT::new(1);
    let a = 0xABCD_0000_0001_2345u64;
    let b = a ^ (1 << 30);
    tt.store(a, 7, sample_move(), -10, Bound::LowerBound);
    assert_eq!(tt.probe(b).map(|e| e.depth), Some(7));
}

#[test]
fn later_store_replaces_earlier_one() {
    let tt = AtomicTT::new(1);
    let hash = 0xABCD_EF01_2345_6789;
    tt.store(hash, 3, sample_move(), 1, Bound::UpperBound);
    tt.store(hash, 9, Move::parse("d2d4").unwrap(), -50, Bound::Exact);

    let entry = tt.probe(hash).unwrap();
    assert_eq!(entry.depth, 9);
    assert_eq!(entry.score, -50);
    assert_eq!(entry.best_move, Move::parse("d2d4").unwrap());
    assert_eq!(entry.bound, Bound::Exact);
}

#[test]
fn negative_and_extreme_scores_round_trip() {
    let tt = AtomicTT::new(1);
    for (i, score) in [-31_999, -1, 0, 1, 31_999].into_iter().enumerate() {
        let hash = 0x1111_0000_0000_0000 + i as u64;
        tt.store(hash, 1, sample_move(), score, Bound::Exact);
        assert_eq!(tt.probe(hash).unwrap().score, score as i16 as i32);
    }
}

#[test]
fn clear_empties_the_table() {
    let tt = AtomicTT::new(1);
    let hash = 0x5555_AAAA_5555_AAAA;
    tt.store(hash, 4, sample_move(), 12, Bound::Exact);
    tt.clear();
    assert!(tt.probe(hash).is_none());
}

#[test]
fn resize_drops_old_entries() {
    let mut tt = AtomicTT::new(1);
    let hash = 0x9999_0000_1111_2222;
    tt.store(hash, 4, sample_move(), 12, Bound::Exact);
    tt.resize(2);
    assert!(tt.probe(hash).is_none());
}

#[test]
fn mate_scores_are_normalized_relative_to_the_node() {
    // A mate found 6 plies into the search, stored at ply 4: the entry keeps
    // the distance from the storing node, and probing at a different ply
    // re-anchors it.
    let store_ply = 4;
    let score = MATE - 6;
    let stored = score_to_tt(score, store_ply);
    assert_eq!(stored, MATE - 2);

    assert_eq!(score_from_tt(stored, 0), MATE - 2);
    assert_eq!(score_from_tt(stored, 4), score);

    let mated = -(MATE - 6);
    let stored = score_to_tt(mated, store_ply);
    assert_eq!(score_from_tt(stored, store_ply), mated);
}

#[test]
fn ordinary_scores_are_untouched_by_normalization() {
    for score in [-500, 0, 137] {
        assert_eq!(score_to_tt(score, 20), score);
        assert_eq!(score_from_tt(score, 20), score);
    }
}
