// src/nnue/accumulator.rs
//! NNUE accumulator stack: the first hidden layer of the feature
//! transformer, maintained incrementally as the search makes and unmakes
//! moves.
//!
//! The stack is a pre-allocated arena of per-ply accumulators with an
//! explicit cursor index. Each push derives frame `cursor + 1` from frame
//! `cursor` by adding/subtracting the changed feature columns, then advances
//! the cursor; pop just retreats it. Stale frames above the cursor are simply
//! unreachable until overwritten, so nothing needs clearing.
//!
//! Optimizations:
//! - AVX2 SIMD vectorized column add/sub (16 i16 lanes per instruction)
//! - zero-copy parent-to-child updates via split_at_mut

use crate::defs::{
    piece_class, piece_color, to_sq64, Color, BLANK, COLOR_COUNT, KING, MAX_SEARCH_DEPTH,
};
use crate::nnue::features::feature_index;
use crate::nnue::NnueNetwork;
use crate::position::Position;

#[cfg(target_arch = "x86_64")]
use std::arch::x86_64::*;

/// Fixed hidden layer size. Must match the weight file (checked at load).
pub const HIDDEN_SIZE: usize = 768;

/// One per-ply accumulator: a feature-activation vector per perspective,
/// plus the king squares (0..63) the feature orientation was derived from.
#[derive(Clone)]
#[repr(align(64))]
pub struct Accumulator {
    pub views: [[i16; HIDDEN_SIZE]; COLOR_COUNT],
    pub kings: [u8; COLOR_COUNT],
}

impl Accumulator {
    fn zeroed() -> Self {
        Accumulator {
            views: [[0; HIDDEN_SIZE]; COLOR_COUNT],
            kings: [0; COLOR_COUNT],
        }
    }
}

/// Arena of accumulators indexed by search ply. The cursor offset from the
/// base always equals the current search depth.
pub struct AccumulatorStack {
    stack: Vec<Accumulator>,
    cursor: usize,
}

impl AccumulatorStack {
    pub fn new() -> Self {
        AccumulatorStack {
            stack: (0..MAX_SEARCH_DEPTH).map(|_| Accumulator::zeroed()).collect(),
            cursor: 0,
        }
    }

    #[inline]
    pub fn current(&self) -> &Accumulator {
        &self.stack[self.cursor]
    }

    #[inline]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Retreat one ply. Popping past the base is a programming error.
    #[inline]
    pub fn pop(&mut self) {
        assert!(self.cursor > 0, "accumulator stack underflow");
        self.cursor -= 1;
    }

    /// Rebuild the base frame from scratch: bias plus every occupied
    /// square's feature column. The only non-incremental path besides
    /// `push_reset`.
    pub fn reset(&mut self, net: &NnueNetwork, pos: &Position) {
        self.cursor = 0;
        refresh_frame(&mut self.stack[0], net, pos);
    }

    /// Push a frame rebuilt from scratch for `pos`. Used when a king crosses
    /// the file half boundary and the incremental delta would be keyed with
    /// a stale orientation.
    pub fn push_reset(&mut self, net: &NnueNetwork, pos: &Position) {
        assert!(self.cursor + 1 < self.stack.len(), "accumulator stack overflow");
        self.cursor += 1;
        refresh_frame(&mut self.stack[self.cursor], net, pos);
    }

    /// Quiet move (including promotions: `to_piece` may differ from `piece`).
    pub fn push_move(&mut self, net: &NnueNetwork, piece: u8, from: u8, to_piece: u8, to: u8) {
        let (parent, child) = self.advance();
        let from64 = to_sq64(from);
        let to64 = to_sq64(to);
        for view in 0..COLOR_COUNT as Color {
            let king = parent.kings[view as usize];
            let from_ft = feature_index(view, king, piece, from64);
            let to_ft = feature_index(view, king, to_piece, to64);
            let out = &mut child.views[view as usize];
            out.copy_from_slice(&parent.views[view as usize]);
            vec_add_i16(out, net.ft_column(to_ft));
            vec_sub_i16(out, net.ft_column(from_ft));
        }
        child.kings = parent.kings;
        update_child_king(child, piece, to64);
    }

    /// Capture: additionally subtracts the captured piece's column. The
    /// captured square is passed separately because for en passant it is not
    /// the destination square.
    pub fn push_capture(
        &mut self,
        net: &NnueNetwork,
        piece: u8,
        from: u8,
        to_piece: u8,
        to: u8,
        captured: u8,
        captured_sq: u8,
    ) {
        let (parent, child) = self.advance();
        let from64 = to_sq64(from);
        let to64 = to_sq64(to);
        let cap64 = to_sq64(captured_sq);
        for view in 0..COLOR_COUNT as Color {
            let king = parent.kings[view as usize];
            let from_ft = feature_index(view, king, piece, from64);
            let to_ft = feature_index(view, king, to_piece, to64);
            let cap_ft = feature_index(view, king, captured, cap64);
            let out = &mut child.views[view as usize];
            out.copy_from_slice(&parent.views[view as usize]);
            vec_add_i16(out, net.ft_column(to_ft));
            vec_sub_i16(out, net.ft_column(from_ft));
            vec_sub_i16(out, net.ft_column(cap_ft));
        }
        child.kings = parent.kings;
        update_child_king(child, piece, to64);
    }

    /// Castling: king and rook move in one ply, applied as two add/sub pairs
    /// so no half-applied state is ever observable. Valid only while the
    /// king stays on its file half; the search resets otherwise.
    pub fn push_castle(
        &mut self,
        net: &NnueNetwork,
        king: u8,
        king_from: u8,
        king_to: u8,
        rook: u8,
        rook_from: u8,
        rook_to: u8,
    ) {
        let (parent, child) = self.advance();
        let kf = to_sq64(king_from);
        let kt = to_sq64(king_to);
        let rf = to_sq64(rook_from);
        let rt = to_sq64(rook_to);
        debug_assert_eq!(kf & 4, kt & 4, "castle across the file half needs a reset");
        for view in 0..COLOR_COUNT as Color {
            let king_sq = parent.kings[view as usize];
            let out = &mut child.views[view as usize];
            out.copy_from_slice(&parent.views[view as usize]);
            vec_add_i16(out, net.ft_column(feature_index(view, king_sq, king, kt)));
            vec_sub_i16(out, net.ft_column(feature_index(view, king_sq, king, kf)));
            vec_add_i16(out, net.ft_column(feature_index(view, king_sq, rook, rt)));
            vec_sub_i16(out, net.ft_column(feature_index(view, king_sq, rook, rf)));
        }
        child.kings = parent.kings;
        update_child_king(child, king, kt);
    }

    /// Split the arena so parent (at `cursor`) and child (at `cursor + 1`)
    /// can be borrowed together, and advance the cursor.
    #[inline]
    fn advance(&mut self) -> (&Accumulator, &mut Accumulator) {
        assert!(self.cursor + 1 < self.stack.len(), "accumulator stack overflow");
        self.cursor += 1;
        let (left, right) = self.stack.split_at_mut(self.cursor);
        (&left[self.cursor - 1], &mut right[0])
    }
}

impl Default for AccumulatorStack {
    fn default() -> Self {
        Self::new()
    }
}

#[inline]
fn update_child_king(child: &mut Accumulator, piece: u8, to64: u8) {
    if piece_class(piece) == KING {
        child.kings[piece_color(piece) as usize] = to64;
    }
}

fn refresh_frame(frame: &mut Accumulator, net: &NnueNetwork, pos: &Position) {
    for view in 0..COLOR_COUNT {
        frame.views[view].copy_from_slice(&net.ft_biases);
        frame.kings[view] = to_sq64(pos.kingpos[view]);
    }
    for sq in 0..128u8 {
        if sq & 0x88 != 0 {
            continue;
        }
        let piece = pos.board[sq as usize];
        if piece == BLANK {
            continue;
        }
        let sq64 = to_sq64(sq);
        for view in 0..COLOR_COUNT as Color {
            let ft = feature_index(view, frame.kings[view as usize], piece, sq64);
            vec_add_i16(&mut frame.views[view as usize], net.ft_column(ft));
        }
    }
}

// ============================================================================
// SIMD-VECTORIZED i16 ADD/SUB
// ============================================================================

/// dst[i] += src[i] for i16 slices. AVX2 when available, scalar fallback
/// otherwise; both wrap identically.
#[inline(always)]
fn vec_add_i16(dst: &mut [i16], src: &[i16]) {
    debug_assert_eq!(dst.len(), src.len());

    #[cfg(target_arch = "x86_64")]
    {
        if is_x86_feature_detected!("avx2") {
            unsafe {
                return vec_add_i16_avx2(dst, src);
            }
        }
    }

    for i in 0..dst.len() {
        dst[i] = dst[i].wrapping_add(src[i]);
    }
}

/// dst[i] -= src[i] for i16 slices.
#[inline(always)]
fn vec_sub_i16(dst: &mut [i16], src: &[i16]) {
    debug_assert_eq!(dst.len(), src.len());

    #[cfg(target_arch = "x86_64")]
    {
        if is_x86_feature_detected!("avx2") {
            unsafe {
                return vec_sub_i16_avx2(dst, src);
            }
        }
    }

    for i in 0..dst.len() {
        dst[i] = dst[i].wrapping_sub(src[i]);
    }
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2")]
#[inline]
unsafe fn vec_add_i16_avx2(dst: &mut [i16], src: &[i16]) {
    let n = dst.len();
    let dst_ptr = dst.as_mut_ptr();
    let src_ptr = src.as_ptr();
    let mut i = 0;
    while i + 16 <= n {
        let a = _mm256_loadu_si256(dst_ptr.add(i) as *const __m256i);
        let b = _mm256_loadu_si256(src_ptr.add(i) as *const __m256i);
        _mm256_storeu_si256(dst_ptr.add(i) as *mut __m256i, _mm256_add_epi16(a, b));
        i += 16;
    }
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2")]
#[inline]
unsafe fn vec_sub_i16_avx2(dst: &mut [i16], src: &[i16]) {
    let n = dst.len();
    let dst_ptr = dst.as_mut_ptr();
    let src_ptr = src.as_ptr();
    let mut i = 0;
    while i + 16 <= n {
        let a = _mm256_loadu_si256(dst_ptr.add(i) as *const __m256i);
        let b = _mm256_loadu_si256(src_ptr.add(i) as *const __m256i);
        _mm256_storeu_si256(dst_ptr.add(i) as *mut __m256i, _mm256_sub_epi16(a, b));
        i += 16;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defs::W_PAWN;
    use crate::mv::Move;

    fn net() -> NnueNetwork {
        NnueNetwork::random(0x5EED)
    }

    #[test]
    fn push_pop_is_a_strict_inverse() {
        let net = net();
        let pos = Position::startpos();
        let mut stack = AccumulatorStack::new();
        stack.reset(&net, &pos);
        let before = stack.current().clone();

        stack.push_move(&net, W_PAWN, 0x14, W_PAWN, 0x34); // e2e4
        assert_eq!(stack.cursor(), 1);
        stack.pop();

        assert_eq!(stack.cursor(), 0);
        assert_eq!(stack.current().views, before.views);
        assert_eq!(stack.current().kings, before.kings);
    }

    /// Walk a move sequence pushing incrementally, then compare against a
    /// from-scratch refresh of the final position.
    fn check_incremental_matches_reset(moves: &[&str], fen: &str) {
        let net = net();
        let mut pos = Position::from_fen(fen).unwrap();
        let mut stack = AccumulatorStack::new();
        stack.reset(&net, &pos);

        for m in moves {
            let mv = Move::parse(m).unwrap();
            let from = mv.from_sq();
            let to = mv.to_sq();
            let piece = pos.piece_on(from);
            let to_piece = match mv.prom() {
                Some(p) => crate::defs::make_piece(p, piece_color(piece)),
                None => piece,
            };
            let captured = pos.piece_on(to);
            let castle = piece_class(piece) == KING
                && crate::defs::file_of(from).abs_diff(crate::defs::file_of(to)) == 2;
            let half_change =
                piece_class(piece) == KING && (to_sq64(from) & 4) != (to_sq64(to) & 4);

            assert!(pos.make_move(mv), "move {} must be legal", m);

            if half_change {
                stack.push_reset(&net, &pos);
            } else if castle {
                let rank = crate::defs::rank_of(from);
                let (rf, rt) = if crate::defs::file_of(to) == 6 {
                    (crate::defs::square(7, rank), crate::defs::square(5, rank))
                } else {
                    (crate::defs::square(0, rank), crate::defs::square(3, rank))
                };
                let rook = crate::defs::make_piece(crate::defs::ROOK, piece_color(piece));
                stack.push_castle(&net, piece, from, to, rook, rf, rt);
            } else if captured != BLANK {
                stack.push_capture(&net, piece, from, to_piece, to, captured, to);
            } else {
                stack.push_move(&net, piece, from, to_piece, to);
            }
        }

        let mut fresh = AccumulatorStack::new();
        fresh.reset(&net, &pos);
        assert_eq!(stack.current().views, fresh.current().views);
        assert_eq!(stack.current().kings, fresh.current().kings);
    }

    #[test]
    fn incremental_equals_reset_for_quiet_and_capture() {
        check_incremental_matches_reset(
            &["e2e4", "d7d5", "e4d5", "d8d5", "b1c3"],
            crate::position::START_FEN,
        );
    }

    #[test]
    fn incremental_equals_reset_for_kingside_castle() {
        check_incremental_matches_reset(
            &["g1f3", "g8f6", "g2g3", "g7g6", "f1g2", "f8g7", "e1g1", "e8g8"],
            crate::position::START_FEN,
        );
    }

    #[test]
    fn incremental_equals_reset_for_promotion() {
        check_incremental_matches_reset(
            &["a7a8q"],
            "4k3/P7/8/8/8/8/8/4K3 w - - 0 1",
        );
    }

    #[test]
    fn king_half_crossing_uses_reset_path() {
        // e1-d1 crosses the d/e file boundary, re-keying every feature.
        check_incremental_matches_reset(
            &["e1d1", "e8d8", "d1e1"],
            "4k3/8/8/8/8/8/8/4K3 w - - 0 1",
        );
    }

    #[test]
    #[should_panic(expected = "underflow")]
    fn pop_past_base_panics() {
        let mut stack = AccumulatorStack::new();
        stack.pop();
    }

    #[test]
    fn columns_are_the_expected_slices() {
        let net = net();
        assert_eq!(net.ft_column(0).len(), HIDDEN_SIZE);
        assert_eq!(net.ft_column(1)[0], net.ft_weights[HIDDEN_SIZE]);
    }
}
