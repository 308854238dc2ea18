use crate::defs::{
    file_of, from_sq64, rank_of, square, to_sq64, BISHOP, KNIGHT, QUEEN, ROOK,
};

/// A chess move packed into 16 bits.
///
/// Bit layout:
/// - 0-5: source square (0..63)
/// - 6-11: target square (0..63)
/// - 12-14: promotion class (0 = none, 1 = knight .. 4 = queen)
///
/// Castling and en passant carry no flag; `Position::make_move` recognises
/// them from the board context (king moving two files, pawn moving diagonally
/// onto an empty square).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Move(u16);

pub const MOVE_NONE: Move = Move(0);

impl Move {
    const SQ_MASK: u16 = 0x3F;
    const PROM_SHIFT: u32 = 12;

    /// Build a move from 0x88 squares.
    #[inline]
    pub fn new(from: u8, to: u8, prom: Option<usize>) -> Self {
        let s = to_sq64(from) as u16;
        let t = to_sq64(to) as u16;
        let p = match prom {
            Some(KNIGHT) => 1,
            Some(BISHOP) => 2,
            Some(ROOK) => 3,
            Some(QUEEN) => 4,
            _ => 0,
        };
        Move(s | (t << 6) | (p << Self::PROM_SHIFT))
    }

    /// Source square, 0x88.
    #[inline]
    pub fn from_sq(self) -> u8 {
        from_sq64((self.0 & Self::SQ_MASK) as u8)
    }

    /// Target square, 0x88.
    #[inline]
    pub fn to_sq(self) -> u8 {
        from_sq64(((self.0 >> 6) & Self::SQ_MASK) as u8)
    }

    /// Promotion piece class, if any.
    #[inline]
    pub fn prom(self) -> Option<usize> {
        match (self.0 >> Self::PROM_SHIFT) & 0x7 {
            1 => Some(KNIGHT),
            2 => Some(BISHOP),
            3 => Some(ROOK),
            4 => Some(QUEEN),
            _ => None,
        }
    }

    #[inline]
    pub fn is_none(self) -> bool {
        self.0 == 0
    }

    /// Raw 16-bit value, used by the transposition table packing.
    #[inline]
    pub fn raw(self) -> u16 {
        self.0
    }

    #[inline]
    pub fn from_raw(raw: u16) -> Self {
        Move(raw)
    }

    /// Parse a long-algebraic move like `e2e4` or `a7a8q`.
    pub fn parse(s: &str) -> Option<Self> {
        let b = s.as_bytes();
        if b.len() < 4 {
            return None;
        }
        let file_ok = |c: u8| (b'a'..=b'h').contains(&c);
        let rank_ok = |c: u8| (b'1'..=b'8').contains(&c);
        if !file_ok(b[0]) || !rank_ok(b[1]) || !file_ok(b[2]) || !rank_ok(b[3]) {
            return None;
        }
        let from = square(b[0] - b'a', b[1] - b'1');
        let to = square(b[2] - b'a', b[3] - b'1');
        let prom = match b.get(4) {
            Some(b'n') => Some(KNIGHT),
            Some(b'b') => Some(BISHOP),
            Some(b'r') => Some(ROOK),
            Some(b'q') => Some(QUEEN),
            _ => None,
        };
        Some(Move::new(from, to, prom))
    }
}

impl std::fmt::Display for Move {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let from = self.from_sq();
        let to = self.to_sq();
        write!(
            f,
            "{}{}{}{}",
            (file_of(from) + b'a') as char,
            (rank_of(from) + b'1') as char,
            (file_of(to) + b'a') as char,
            (rank_of(to) + b'1') as char,
        )?;
        if let Some(p) = self.prom() {
            let c = match p {
                KNIGHT => 'n',
                BISHOP => 'b',
                ROOK => 'r',
                _ => 'q',
            };
            write!(f, "{}", c)?;
        }
        Ok(())
    }
}

/// A fixed-capacity container for generated moves.
pub struct MoveList {
    pub moves: [Move; 256],
    pub count: usize,
}

impl MoveList {
    pub fn new() -> Self {
        MoveList {
            moves: [MOVE_NONE; 256],
            count: 0,
        }
    }

    #[inline]
    pub fn add(&mut self, m: Move) {
        debug_assert!(self.count < 256);
        self.moves[self.count] = m;
        self.count += 1;
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = Move> + '_ {
        self.moves[..self.count].iter().copied()
    }
}

impl Default for MoveList {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defs::square;

    #[test]
    fn move_fields_round_trip() {
        let m = Move::new(square(4, 1), square(4, 3), None); // e2e4
        assert_eq!(m.from_sq(), square(4, 1));
        assert_eq!(m.to_sq(), square(4, 3));
        assert_eq!(m.prom(), None);
        assert_eq!(m.to_string(), "e2e4");
    }

    #[test]
    fn promotion_encoding() {
        let m = Move::new(square(0, 6), square(0, 7), Some(QUEEN)); // a7a8q
        assert_eq!(m.prom(), Some(QUEEN));
        assert_eq!(m.to_string(), "a7a8q");
        assert_eq!(Move::parse("a7a8q"), Some(m));
    }

    #[test]
    fn parse_rejects_garbage() {
        assert_eq!(Move::parse("0000"), None);
        assert_eq!(Move::parse("e2"), None);
        assert_eq!(Move::parse("i2i4"), None);
    }

    #[test]
    fn raw_round_trip() {
        let m = Move::new(square(6, 0), square(5, 2), None); // g1f3
        assert_eq!(Move::from_raw(m.raw()), m);
    }
}
