use crate::defs::MAX_SEARCH_DEPTH;
use crate::mv::Move;
use std::sync::atomic::{AtomicU64, Ordering};

// Pack layout (64 bits):
// - Key fragment (16 bits, the hash's top 16 bits — the slot index consumes
//   the low bits, so the fragment stays independent of it)
// - Score (16 bits, signed)
// - Best move (16 bits)
// - Depth (8 bits)
// - Bound (2 bits)
//
// One atomic word per entry: a concurrent overwrite can never be observed as
// a torn multi-word read, and a key-fragment mismatch downgrades any racing
// or colliding write to a plain miss.

pub const INFINITY: i32 = 32_000;
pub const MATE: i32 = 30_000;
/// Scores beyond this magnitude encode a forced mate and carry a distance.
pub const MATE_BOUND: i32 = MATE - MAX_SEARCH_DEPTH as i32;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Bound {
    None = 0,
    Exact = 1,
    LowerBound = 2,
    UpperBound = 3,
}

#[derive(Clone, Copy, Debug)]
pub struct TTEntry {
    pub depth: u8,
    pub score: i32,
    pub best_move: Move,
    pub bound: Bound,
}

/// Fixed-size, collision-tolerant memo keyed by position hash. Stores are
/// unconditional overwrites: no entry's survival is ever load-bearing.
pub struct AtomicTT {
    table: Vec<AtomicU64>,
    mask: usize,
}

impl AtomicTT {
    pub fn new(size_mb: usize) -> Self {
        let num_entries = (size_mb * 1024 * 1024 / 8).next_power_of_two();
        let table = (0..num_entries).map(|_| AtomicU64::new(0)).collect();
        Self {
            table,
            mask: num_entries - 1,
        }
    }

    pub fn resize(&mut self, size_mb: usize) {
        *self = Self::new(size_mb);
    }

    pub fn clear(&self) {
        for entry in &self.table {
            entry.store(0, Ordering::Relaxed);
        }
    }

    #[inline]
    fn key_fragment(hash: u64) -> u16 {
        (hash >> 48) as u16
    }

    fn pack(hash: u64, depth: u8, best_move: Move, score: i32, bound: Bound) -> u64 {
        debug_assert!((-INFINITY..=INFINITY).contains(&score));
        let key_part = Self::key_fragment(hash) as u64;
        let score_part = (score as i16 as u16) as u64;
        let move_part = best_move.raw() as u64;
        let depth_part = depth as u64;
        let bound_part = bound as u64;

        (bound_part << 56) | (depth_part << 48) | (move_part << 32) | (score_part << 16) | key_part
    }

    fn unpack(data: u64) -> (u16, TTEntry) {
        let key = (data & 0xFFFF) as u16;
        let score = ((data >> 16) & 0xFFFF) as u16 as i16 as i32;
        let best_move = Move::from_raw(((data >> 32) & 0xFFFF) as u16);
        let depth = ((data >> 48) & 0xFF) as u8;
        let bound = match (data >> 56) & 0x3 {
            1 => Bound::Exact,
            2 => Bound::LowerBound,
            3 => Bound::UpperBound,
            _ => Bound::None,
        };
        (
            key,
            TTEntry {
                depth,
                score,
                best_move,
                bound,
            },
        )
    }

    /// Always-replace store at the indexed slot.
    pub fn store(&self, hash: u64, depth: u8, best_move: Move, score: i32, bound: Bound) {
        let index = (hash as usize) & self.mask;
        let data = Self::pack(hash, depth, best_move, score, bound);
        self.table[index].store(data, Ordering::Relaxed);
    }

    /// Returns the stored entry only when the upper-bits key fragment
    /// matches, so two positions sharing a slot but differing above the
    /// index bits read as a miss rather than each other's result.
    pub fn probe(&self, hash: u64) -> Option<TTEntry> {
        let index = (hash as usize) & self.mask;
        let data = self.table[index].load(Ordering::Relaxed);
        if data == 0 {
            return None;
        }
        let (key, entry) = Self::unpack(data);
        if key == Self::key_fragment(hash) {
            Some(entry)
        } else {
            None
        }
    }
}

/// Normalize a mate score for storage: the table keeps mate distances
/// relative to the stored position, not to the search root.
#[inline]
pub fn score_to_tt(score: i32, ply: u16) -> i32 {
    if score > MATE_BOUND {
        score + ply as i32
    } else if score < -MATE_BOUND {
        score - ply as i32
    } else {
        score
    }
}

/// Undo `score_to_tt` at probe time, re-anchoring the mate distance to the
/// prober's current ply.
#[inline]
pub fn score_from_tt(score: i32, ply: u16) -> i32 {
    if score > MATE_BOUND {
        score - ply as i32
    } else if score < -MATE_BOUND {
        score + ply as i32
    } else {
        score
    }
}
