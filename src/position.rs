//! The board representation: a 0x88 mailbox position with running material
//! counts, castling rights, king squares and the Zobrist hash over all
//! game-relevant state.

use crate::defs::*;
use crate::mv::Move;
use anyhow::{bail, Context, Result};

lazy_static::lazy_static! {
    pub static ref ZOBRIST: Zobrist = get_zobrist_keys();
}

pub const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

#[derive(Clone)]
pub struct Position {
    /// 0x88 mailbox; valid cells hold a piece code or `BLANK`.
    pub board: [u8; 128],
    /// Live counts of non-king pieces, `[color][class]`.
    pub material_count: [[u8; MATERIAL_CLASS_COUNT]; COLOR_COUNT],
    /// `[color][QUEENSIDE/KINGSIDE]`.
    pub castling_rights: [[bool; 2]; COLOR_COUNT],
    pub kingpos: [u8; COLOR_COUNT],
    /// En-passant target square, or `SQ_NONE`.
    pub ep_square: u8,
    pub side: Color,
    /// Plies since the last capture or pawn move (fifty-move rule).
    pub halfmoves: u8,
}

impl Position {
    pub fn empty() -> Self {
        Position {
            board: [BLANK; 128],
            material_count: [[0; MATERIAL_CLASS_COUNT]; COLOR_COUNT],
            castling_rights: [[false; 2]; COLOR_COUNT],
            kingpos: [SQ_NONE; COLOR_COUNT],
            ep_square: SQ_NONE,
            side: WHITE,
            halfmoves: 0,
        }
    }

    pub fn startpos() -> Self {
        Self::from_fen(START_FEN).expect("start position FEN is valid")
    }

    pub fn from_fen(fen: &str) -> Result<Self> {
        let mut pos = Self::empty();
        let mut fields = fen.split_whitespace();

        let placement = fields.next().context("FEN missing piece placement")?;
        let mut rank = 7u8;
        let mut file = 0u8;
        for c in placement.chars() {
            match c {
                '/' => {
                    if rank == 0 {
                        bail!("FEN has too many ranks");
                    }
                    rank -= 1;
                    file = 0;
                }
                '1'..='8' => file += c as u8 - b'0',
                _ => {
                    let piece = match c {
                        'P' => W_PAWN,
                        'p' => B_PAWN,
                        'N' => W_KNIGHT,
                        'n' => B_KNIGHT,
                        'B' => W_BISHOP,
                        'b' => B_BISHOP,
                        'R' => W_ROOK,
                        'r' => B_ROOK,
                        'Q' => W_QUEEN,
                        'q' => B_QUEEN,
                        'K' => W_KING,
                        'k' => B_KING,
                        _ => bail!("bad FEN piece character {:?}", c),
                    };
                    if file > 7 {
                        bail!("FEN rank overflows");
                    }
                    pos.put_piece(piece, square(file, rank));
                    file += 1;
                }
            }
        }

        pos.side = match fields.next() {
            Some("w") | None => WHITE,
            Some("b") => BLACK,
            Some(s) => bail!("bad FEN side {:?}", s),
        };

        if let Some(castling) = fields.next() {
            for c in castling.chars() {
                match c {
                    'K' => pos.castling_rights[WHITE as usize][KINGSIDE] = true,
                    'Q' => pos.castling_rights[WHITE as usize][QUEENSIDE] = true,
                    'k' => pos.castling_rights[BLACK as usize][KINGSIDE] = true,
                    'q' => pos.castling_rights[BLACK as usize][QUEENSIDE] = true,
                    '-' => {}
                    _ => bail!("bad FEN castling flag {:?}", c),
                }
            }
        }

        if let Some(ep) = fields.next() {
            if ep != "-" {
                let b = ep.as_bytes();
                if b.len() != 2 || !(b'a'..=b'h').contains(&b[0]) || !(b'1'..=b'8').contains(&b[1])
                {
                    bail!("bad FEN en-passant square {:?}", ep);
                }
                pos.ep_square = square(b[0] - b'a', b[1] - b'1');
            }
        }

        if let Some(hm) = fields.next() {
            pos.halfmoves = hm.parse().context("bad FEN halfmove clock")?;
        }

        if pos.kingpos[WHITE as usize] == SQ_NONE || pos.kingpos[BLACK as usize] == SQ_NONE {
            bail!("FEN position is missing a king");
        }
        Ok(pos)
    }

    #[inline]
    pub fn piece_on(&self, sq: u8) -> u8 {
        debug_assert!(!out_of_board(sq));
        self.board[sq as usize]
    }

    fn put_piece(&mut self, piece: u8, sq: u8) {
        debug_assert_eq!(self.board[sq as usize], BLANK);
        self.board[sq as usize] = piece;
        let class = piece_class(piece);
        if class == KING {
            self.kingpos[piece_color(piece) as usize] = sq;
        } else {
            self.material_count[piece_color(piece) as usize][class] += 1;
        }
    }

    fn remove_piece(&mut self, sq: u8) {
        let piece = self.board[sq as usize];
        debug_assert_ne!(piece, BLANK);
        self.board[sq as usize] = BLANK;
        let class = piece_class(piece);
        if class != KING {
            self.material_count[piece_color(piece) as usize][class] -= 1;
        }
    }

    /// Zobrist hash over piece placement, side to move, castling rights and
    /// en-passant file. Identical positions hash identically regardless of
    /// the move order that produced them.
    pub fn hash(&self) -> u64 {
        let mut h = 0u64;
        for rank in 0..8u8 {
            for file in 0..8u8 {
                let sq = square(file, rank);
                let piece = self.board[sq as usize];
                if piece != BLANK {
                    h ^= ZOBRIST.pieces[piece_color(piece) as usize][piece_class(piece)]
                        [to_sq64(sq) as usize];
                }
            }
        }
        for c in 0..COLOR_COUNT {
            for s in 0..2 {
                if self.castling_rights[c][s] {
                    h ^= ZOBRIST.castling[c][s];
                }
            }
        }
        if self.ep_square != SQ_NONE {
            h ^= ZOBRIST.en_passant[file_of(self.ep_square) as usize];
        }
        if self.side == BLACK {
            h ^= ZOBRIST.side;
        }
        h
    }

    /// Is `sq` attacked by any piece of color `by`?
    pub fn is_square_attacked(&self, sq: u8, by: Color) -> bool {
        // Pawns: the attacking pawn sits one diagonal step towards its own side.
        let pawn_dir = if by == WHITE { NORTH } else { SOUTH };
        let pawn = make_piece(PAWN, by);
        for side_step in [EAST, WEST] {
            let from = sq as i16 - pawn_dir + side_step;
            if (0..128).contains(&from) && !out_of_board(from as u8) {
                if self.board[from as usize] == pawn {
                    return true;
                }
            }
        }

        let knight = make_piece(KNIGHT, by);
        for off in KNIGHT_OFFSETS {
            let from = sq as i16 + off;
            if (0..128).contains(&from) && !out_of_board(from as u8) {
                if self.board[from as usize] == knight {
                    return true;
                }
            }
        }

        // Sliders and the king share the eight rays: orthogonals first,
        // then diagonals.
        for (i, dir) in ATTACK_RAYS.iter().enumerate() {
            let diagonal = i >= 4;
            let mut from = sq as i16 + dir;
            let mut dist = 1;
            while (0..128).contains(&from) && !out_of_board(from as u8) {
                let piece = self.board[from as usize];
                if piece != BLANK {
                    if piece_color(piece) == by {
                        let class = piece_class(piece);
                        let reaches = match class {
                            QUEEN => true,
                            ROOK => !diagonal,
                            BISHOP => diagonal,
                            KING => dist == 1,
                            _ => false,
                        };
                        if reaches {
                            return true;
                        }
                    }
                    break;
                }
                from += dir;
                dist += 1;
            }
        }
        false
    }

    #[inline]
    pub fn in_check(&self, color: Color) -> bool {
        self.is_square_attacked(self.kingpos[color as usize], color ^ 1)
    }

    fn clear_castling_for_square(&mut self, sq: u8) {
        match sq {
            s if s == square(0, 0) => self.castling_rights[WHITE as usize][QUEENSIDE] = false,
            s if s == square(7, 0) => self.castling_rights[WHITE as usize][KINGSIDE] = false,
            s if s == square(4, 0) => self.castling_rights[WHITE as usize] = [false, false],
            s if s == square(0, 7) => self.castling_rights[BLACK as usize][QUEENSIDE] = false,
            s if s == square(7, 7) => self.castling_rights[BLACK as usize][KINGSIDE] = false,
            s if s == square(4, 7) => self.castling_rights[BLACK as usize] = [false, false],
            _ => {}
        }
    }

    /// Apply `mv` in place and report whether the result is legal (the
    /// mover's king not left attacked). The search operates on copies: an
    /// illegal result is simply discarded, never rolled back.
    pub fn make_move(&mut self, mv: Move) -> bool {
        let from = mv.from_sq();
        let to = mv.to_sq();
        let piece = self.board[from as usize];
        debug_assert_ne!(piece, BLANK);
        debug_assert_eq!(piece_color(piece), self.side);
        let color = self.side;
        let class = piece_class(piece);

        // Identify the captured square; for en passant it is not the target.
        let mut captured_sq = SQ_NONE;
        if self.board[to as usize] != BLANK {
            captured_sq = to;
        } else if class == PAWN && file_of(from) != file_of(to) {
            captured_sq = square(file_of(to), rank_of(from));
        }

        if class == PAWN || captured_sq != SQ_NONE {
            self.halfmoves = 0;
        } else {
            self.halfmoves = self.halfmoves.saturating_add(1);
        }

        if captured_sq != SQ_NONE {
            self.clear_castling_for_square(captured_sq);
            self.remove_piece(captured_sq);
        }

        self.remove_piece(from);
        let placed = match mv.prom() {
            Some(p) => make_piece(p, color),
            None => piece,
        };
        self.put_piece(placed, to);

        // Castling: the rook jumps in the same ply.
        if class == KING && file_of(from).abs_diff(file_of(to)) == 2 {
            let rank = rank_of(from);
            let (rook_from, rook_to) = if file_of(to) == 6 {
                (square(7, rank), square(5, rank))
            } else {
                (square(0, rank), square(3, rank))
            };
            let rook = self.board[rook_from as usize];
            debug_assert_eq!(rook, make_piece(ROOK, color));
            self.remove_piece(rook_from);
            self.put_piece(rook, rook_to);
        }

        self.clear_castling_for_square(from);

        self.ep_square = if class == PAWN && rank_of(from).abs_diff(rank_of(to)) == 2 {
            square(file_of(from), (rank_of(from) + rank_of(to)) / 2)
        } else {
            SQ_NONE
        };

        self.side = color ^ 1;
        !self.in_check(color)
    }

    pub fn print(&self) {
        println!("  +---+---+---+---+---+---+---+---+");
        for rank in (0..8u8).rev() {
            print!("{} |", rank + 1);
            for file in 0..8u8 {
                let piece = self.board[square(file, rank) as usize];
                if piece == BLANK {
                    print!("   |");
                } else {
                    let c = b"pnbrqk"[piece_class(piece)];
                    let c = if piece_color(piece) == WHITE {
                        c.to_ascii_uppercase()
                    } else {
                        c
                    };
                    print!(" {} |", c as char);
                }
            }
            println!("\n  +---+---+---+---+---+---+---+---+");
        }
        println!("    a   b   c   d   e   f   g   h");
        println!();
        println!(
            "Side to move: {}",
            if self.side == WHITE { "White" } else { "Black" }
        );
        println!("Hash: {:016X}", self.hash());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn startpos_material_and_kings() {
        let pos = Position::startpos();
        for c in 0..COLOR_COUNT {
            assert_eq!(pos.material_count[c], [8, 2, 2, 2, 1]);
        }
        assert_eq!(pos.kingpos[WHITE as usize], square(4, 0));
        assert_eq!(pos.kingpos[BLACK as usize], square(4, 7));
        assert_eq!(pos.side, WHITE);
        assert!(pos.castling_rights.iter().flatten().all(|&r| r));
    }

    #[test]
    fn fen_rejects_garbage() {
        assert!(Position::from_fen("").is_err());
        assert!(Position::from_fen("9/8/8/8/8/8/8/8 w - - 0 1").is_err());
        assert!(Position::from_fen("8/8/8/8/8/8/8/8 w - - 0 1").is_err()); // no kings
    }

    #[test]
    fn hash_is_move_order_independent() {
        // 1. Nf3 Nf6 2. Nc3 and 1. Nc3 Nf6 2. Nf3 transpose.
        let mut a = Position::startpos();
        assert!(a.make_move(Move::parse("g1f3").unwrap()));
        assert!(a.make_move(Move::parse("g8f6").unwrap()));
        assert!(a.make_move(Move::parse("b1c3").unwrap()));

        let mut b = Position::startpos();
        assert!(b.make_move(Move::parse("b1c3").unwrap()));
        assert!(b.make_move(Move::parse("g8f6").unwrap()));
        assert!(b.make_move(Move::parse("g1f3").unwrap()));

        assert_eq!(a.hash(), b.hash());
    }

    #[test]
    fn hash_distinguishes_side_and_castling() {
        let w = Position::from_fen("4k3/8/8/8/8/8/8/4K2R w K - 0 1").unwrap();
        let b = Position::from_fen("4k3/8/8/8/8/8/8/4K2R b K - 0 1").unwrap();
        let nc = Position::from_fen("4k3/8/8/8/8/8/8/4K2R w - - 0 1").unwrap();
        assert_ne!(w.hash(), b.hash());
        assert_ne!(w.hash(), nc.hash());
    }

    #[test]
    fn capture_updates_material() {
        let mut pos =
            Position::from_fen("4k3/8/8/3p4/4P3/8/8/4K3 w - - 0 1").unwrap();
        assert!(pos.make_move(Move::parse("e4d5").unwrap()));
        assert_eq!(pos.material_count[BLACK as usize][PAWN], 0);
        assert_eq!(pos.material_count[WHITE as usize][PAWN], 1);
        assert_eq!(pos.halfmoves, 0);
    }

    #[test]
    fn en_passant_removes_the_bypassed_pawn() {
        let mut pos =
            Position::from_fen("4k3/2p5/8/3P4/8/8/8/4K3 b - - 0 1").unwrap();
        assert!(pos.make_move(Move::parse("c7c5").unwrap()));
        assert_eq!(pos.ep_square, square(2, 5));
        assert!(pos.make_move(Move::parse("d5c6").unwrap()));
        assert_eq!(pos.material_count[BLACK as usize][PAWN], 0);
        assert_eq!(pos.board[square(2, 4) as usize], BLANK);
        assert_eq!(pos.board[square(2, 5) as usize], W_PAWN);
    }

    #[test]
    fn castling_moves_the_rook() {
        let mut pos =
            Position::from_fen("4k3/8/8/8/8/8/8/4K2R w K - 0 1").unwrap();
        assert!(pos.make_move(Move::parse("e1g1").unwrap()));
        assert_eq!(pos.board[square(6, 0) as usize], W_KING);
        assert_eq!(pos.board[square(5, 0) as usize], W_ROOK);
        assert_eq!(pos.board[square(7, 0) as usize], BLANK);
        assert!(!pos.castling_rights[WHITE as usize][KINGSIDE]);
    }

    #[test]
    fn promotion_changes_material() {
        let mut pos =
            Position::from_fen("4k3/P7/8/8/8/8/8/4K3 w - - 0 1").unwrap();
        assert!(pos.make_move(Move::parse("a7a8q").unwrap()));
        assert_eq!(pos.material_count[WHITE as usize][PAWN], 0);
        assert_eq!(pos.material_count[WHITE as usize][QUEEN], 1);
        assert_eq!(pos.board[square(0, 7) as usize], W_QUEEN);
    }

    #[test]
    fn illegal_move_is_reported() {
        // Moving the pinned rook exposes the king.
        let mut pos =
            Position::from_fen("4k3/8/8/8/8/8/4R3/4K3 w - - 0 1").unwrap();
        let mut pinned =
            Position::from_fen("4r1k1/8/8/8/8/8/4R3/4K3 w - - 0 1").unwrap();
        assert!(pos.make_move(Move::parse("e2a2").unwrap()));
        assert!(!pinned.make_move(Move::parse("e2a2").unwrap()));
    }

    #[test]
    fn attack_queries() {
        let pos =
            Position::from_fen("4k3/8/8/8/8/5n2/8/R3K3 w - - 0 1").unwrap();
        assert!(pos.is_square_attacked(square(0, 7), WHITE)); // Ra1-a8
        assert!(pos.is_square_attacked(square(4, 0), BLACK)); // Nf3xe1
        assert!(!pos.is_square_attacked(square(7, 4), WHITE));
    }
}
