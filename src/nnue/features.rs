// src/nnue/features.rs
//! NNUE feature indexing.
//!
//! A feature is (perspective, perspective king square, piece, square). Both
//! perspectives share one weight table oriented "from my own side":
//! - the black perspective flips ranks (sq ^ 56) and swaps the
//!   my-pieces/opponent-pieces halves of the table;
//! - when the perspective king stands on files e-h the square is mirrored
//!   horizontally (sq ^ 7), halving the effective input dimensionality by
//!   left/right symmetry.
//!
//! Because the mirror bit depends on the king's file half, a king move across
//! the d/e boundary re-keys every feature of that perspective; the
//! accumulator stack handles that case with a full reset.

use crate::defs::{piece_class, piece_color, Color, BLACK};

/// Input features per perspective: 2 colors x 6 piece classes x 64 squares.
pub const NUM_FEATURES: usize = 768;

const COLOR_STRIDE: usize = 384;
const PIECE_STRIDE: usize = 64;

/// Maximum active features in any legal position (at most 32 pieces).
pub const MAX_ACTIVE: usize = 32;

/// Feature index for `piece` on `sq64`, seen from `view` whose king stands
/// on `view_king_sq64`. Squares are 0..63 in board coordinates.
#[inline]
pub fn feature_index(view: Color, view_king_sq64: u8, piece: u8, sq64: u8) -> usize {
    let mut sq = sq64 as usize;
    // Mirror files when this perspective's king is on files e-h.
    if view_king_sq64 & 4 != 0 {
        sq ^= 7;
    }
    // Flip ranks for the black perspective.
    if view == BLACK {
        sq ^= 56;
    }
    let theirs = (piece_color(piece) != view) as usize;
    theirs * COLOR_STRIDE + piece_class(piece) * PIECE_STRIDE + sq
}
