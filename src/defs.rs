//! Basic types and constants shared by the whole engine.
//!
//! The board uses a 0x88 mailbox: a 128-cell array where the high nibble of a
//! square index is the rank and the low nibble is the file. Half the index
//! space is off the board, so `sq & 0x88 != 0` detects invalid squares with a
//! single mask test.

use crate::mv::Move;

pub type Color = u8;

pub const WHITE: Color = 0;
pub const BLACK: Color = 1;
pub const COLOR_COUNT: usize = 2;

/// Piece codes: color in the lowest bit, piece class in the remaining bits.
/// `BLANK` is zero so a cleared board cell is itself a valid code.
pub const BLANK: u8 = 0;
pub const W_PAWN: u8 = 2;
pub const B_PAWN: u8 = 3;
pub const W_KNIGHT: u8 = 4;
pub const B_KNIGHT: u8 = 5;
pub const W_BISHOP: u8 = 6;
pub const B_BISHOP: u8 = 7;
pub const W_ROOK: u8 = 8;
pub const B_ROOK: u8 = 9;
pub const W_QUEEN: u8 = 10;
pub const B_QUEEN: u8 = 11;
pub const W_KING: u8 = 12;
pub const B_KING: u8 = 13;

/// Piece classes, i.e. `piece_class(code)` results.
pub const PAWN: usize = 0;
pub const KNIGHT: usize = 1;
pub const BISHOP: usize = 2;
pub const ROOK: usize = 3;
pub const QUEEN: usize = 4;
pub const KING: usize = 5;
pub const PIECE_CLASS_COUNT: usize = 6;

/// Non-king piece classes tracked in `Position::material_count`.
pub const MATERIAL_CLASS_COUNT: usize = 5;

/// Sentinel for "no square". Off the board under the 0x88 mask.
pub const SQ_NONE: u8 = 0x7F;

/// Castling sides, indexing `Position::castling_rights[color][side]`.
pub const QUEENSIDE: usize = 0;
pub const KINGSIDE: usize = 1;

// 0x88 direction offsets.
pub const NORTH: i16 = 16;
pub const SOUTH: i16 = -16;
pub const EAST: i16 = 1;
pub const WEST: i16 = -1;
pub const NORTHEAST: i16 = 17;
pub const SOUTHEAST: i16 = -15;
pub const NORTHWEST: i16 = 15;
pub const SOUTHWEST: i16 = -17;

/// Sliding-attack rays: orthogonals first, then diagonals.
pub const ATTACK_RAYS: [i16; 8] = [
    EAST, WEST, SOUTH, NORTH, SOUTHEAST, SOUTHWEST, NORTHEAST, NORTHWEST,
];

pub const KNIGHT_OFFSETS: [i16; 8] = [
    2 * EAST + NORTH,
    2 * EAST + SOUTH,
    2 * SOUTH + EAST,
    2 * SOUTH + WEST,
    2 * WEST + SOUTH,
    2 * WEST + NORTH,
    2 * NORTH + WEST,
    2 * NORTH + EAST,
];

#[inline(always)]
pub fn out_of_board(sq: u8) -> bool {
    sq & 0x88 != 0
}

#[inline(always)]
pub fn rank_of(sq: u8) -> u8 {
    sq >> 4
}

#[inline(always)]
pub fn file_of(sq: u8) -> u8 {
    sq & 0xF
}

/// Vertical mirror: swaps the two colors' halves of the board.
#[inline(always)]
pub fn flip(sq: u8) -> u8 {
    sq ^ 0x70
}

#[inline(always)]
pub fn piece_color(piece: u8) -> Color {
    piece & 1
}

/// Piece class 0..=5 (pawn..king). Caller must not pass `BLANK`.
#[inline(always)]
pub fn piece_class(piece: u8) -> usize {
    debug_assert!(piece >= W_PAWN);
    (piece >> 1) as usize - 1
}

#[inline(always)]
pub fn make_piece(class: usize, color: Color) -> u8 {
    (((class + 1) << 1) as u8) | color
}

/// 0x88 square to 0..63 index (rank-major, a1 = 0).
#[inline(always)]
pub fn to_sq64(sq: u8) -> u8 {
    ((sq >> 4) << 3) | (sq & 7)
}

/// 0..63 index back to its 0x88 square.
#[inline(always)]
pub fn from_sq64(sq64: u8) -> u8 {
    ((sq64 >> 3) << 4) | (sq64 & 7)
}

/// 0x88 square from file and rank, both 0..8.
#[inline(always)]
pub fn square(file: u8, rank: u8) -> u8 {
    (rank << 4) | file
}

/// Maximum depth of a single search, bounding the accumulator stack.
pub const MAX_SEARCH_DEPTH: usize = 128;

/// Capacity of the per-worker game history. Must exceed the longest
/// conceivable game plus the search depth on top of it.
pub const GAME_HIST_SIZE: usize = 1000;

/// One ply of the game/search line: the hash of the position the move was
/// played from, the move itself, and the piece that moved.
#[derive(Clone, Copy, Default)]
pub struct GameHistory {
    pub position_key: u64,
    pub played_move: Move,
    pub piece_moved: u8,
}

// Zobrist keys: one 64-bit key per (color, class, square64), plus side to
// move, castling rights, and en-passant file.
pub struct Zobrist {
    pub pieces: [[[u64; 64]; PIECE_CLASS_COUNT]; COLOR_COUNT],
    pub castling: [[u64; 2]; COLOR_COUNT],
    pub en_passant: [u64; 8],
    pub side: u64,
}

pub fn get_zobrist_keys() -> Zobrist {
    let mut keys = Zobrist {
        pieces: [[[0; 64]; PIECE_CLASS_COUNT]; COLOR_COUNT],
        castling: [[0; 2]; COLOR_COUNT],
        en_passant: [0; 8],
        side: 0x123456789ABCDEF0,
    };

    // Fixed-seed xorshift so hashes are stable across runs and platforms.
    let mut seed = 0x9876543210FEDCBAu64;
    let mut next_rand = || {
        seed ^= seed << 13;
        seed ^= seed >> 7;
        seed ^= seed << 17;
        seed
    };

    for c in 0..COLOR_COUNT {
        for p in 0..PIECE_CLASS_COUNT {
            for s in 0..64 {
                keys.pieces[c][p][s] = next_rand();
            }
        }
    }
    for c in 0..COLOR_COUNT {
        for s in 0..2 {
            keys.castling[c][s] = next_rand();
        }
    }
    for f in 0..8 {
        keys.en_passant[f] = next_rand();
    }

    keys
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn square_conversions_round_trip() {
        for rank in 0..8u8 {
            for file in 0..8u8 {
                let sq = square(file, rank);
                assert!(!out_of_board(sq));
                assert_eq!(rank_of(sq), rank);
                assert_eq!(file_of(sq), file);
                assert_eq!(from_sq64(to_sq64(sq)), sq);
            }
        }
    }

    #[test]
    fn off_board_mask_rejects_padding() {
        for sq in 0..=0xFFu8 {
            let valid = rank_of(sq) < 8 && file_of(sq) < 8 && sq < 0x80;
            assert_eq!(!out_of_board(sq), valid, "sq {:#x}", sq);
        }
    }

    #[test]
    fn flip_mirrors_ranks() {
        assert_eq!(flip(square(4, 0)), square(4, 7)); // e1 <-> e8
        assert_eq!(flip(flip(0x23)), 0x23);
    }

    #[test]
    fn piece_codes_round_trip() {
        for class in PAWN..=KING {
            for color in [WHITE, BLACK] {
                let pc = make_piece(class, color);
                assert_eq!(piece_class(pc), class);
                assert_eq!(piece_color(pc), color);
            }
        }
    }
}
