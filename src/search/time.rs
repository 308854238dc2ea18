// src/search/time.rs
//
// Time budget for iterative deepening. Cancellation is cooperative: the
// deepening loop consults the budget between depths and simply stops
// iterating; nothing inside the recursion blocks or polls.

use crate::defs::{Color, MAX_SEARCH_DEPTH, WHITE};

/// Limits parsed from a `go` command. Unset fields mean "no constraint".
#[derive(Clone, Copy, Debug, Default)]
pub struct TimeLimits {
    pub depth: Option<i32>,
    pub movetime: Option<u64>,
    pub wtime: Option<u64>,
    pub btime: Option<u64>,
    pub winc: Option<u64>,
    pub binc: Option<u64>,
    pub infinite: bool,
}

/// Overhead subtracted from every allocation to cover I/O latency.
const MOVE_OVERHEAD_MS: u64 = 30;

impl TimeLimits {
    pub fn fixed_depth(depth: i32) -> Self {
        TimeLimits {
            depth: Some(depth),
            ..Default::default()
        }
    }

    /// Deepest iteration to run. Clamped so a user-supplied depth can never
    /// outrun the fixed accumulator arena.
    pub fn max_depth(&self) -> i32 {
        self.depth.unwrap_or(64).clamp(1, MAX_SEARCH_DEPTH as i32 - 1)
    }

    /// Soft time budget in milliseconds for this move, or `None` when the
    /// search is bounded by depth alone.
    pub fn allocation_ms(&self, side: Color) -> Option<u64> {
        if self.infinite {
            return None;
        }
        if let Some(mt) = self.movetime {
            return Some(mt.saturating_sub(MOVE_OVERHEAD_MS).max(1));
        }
        let (time, inc) = if side == WHITE {
            (self.wtime, self.winc.unwrap_or(0))
        } else {
            (self.btime, self.binc.unwrap_or(0))
        };
        // A conservative slice of the remaining clock plus most of the
        // increment.
        time.map(|t| (t / 20 + inc / 2).saturating_sub(MOVE_OVERHEAD_MS).max(1))
    }

    /// Should the deepening loop stop before starting another iteration?
    pub fn out_of_time(&self, elapsed_ms: u64, side: Color) -> bool {
        match self.allocation_ms(side) {
            Some(budget) => elapsed_ms >= budget,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defs::BLACK;

    #[test]
    fn fixed_depth_has_no_clock() {
        let l = TimeLimits::fixed_depth(6);
        assert_eq!(l.max_depth(), 6);
        assert_eq!(l.allocation_ms(WHITE), None);
        assert!(!l.out_of_time(1_000_000, WHITE));
    }

    #[test]
    fn movetime_wins_over_clock() {
        let l = TimeLimits {
            movetime: Some(1000),
            wtime: Some(60_000),
            ..Default::default()
        };
        assert_eq!(l.allocation_ms(WHITE), Some(970));
    }

    #[test]
    fn clock_allocation_uses_the_side_to_move() {
        let l = TimeLimits {
            wtime: Some(60_000),
            btime: Some(2_000),
            ..Default::default()
        };
        assert!(l.allocation_ms(WHITE).unwrap() > l.allocation_ms(BLACK).unwrap());
        assert!(l.out_of_time(10_000, BLACK));
    }

    #[test]
    fn requested_depth_is_clamped_to_the_arena() {
        let l = TimeLimits::fixed_depth(999);
        assert_eq!(l.max_depth(), MAX_SEARCH_DEPTH as i32 - 1);
        assert_eq!(TimeLimits::fixed_depth(0).max_depth(), 1);
    }

    #[test]
    fn infinite_never_stops() {
        let l = TimeLimits {
            infinite: true,
            wtime: Some(10),
            ..Default::default()
        };
        assert!(!l.out_of_time(u64::MAX, WHITE));
    }
}
