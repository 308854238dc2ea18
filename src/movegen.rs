//! Pseudo-legal move generation on the 0x88 mailbox.
//!
//! Moves that leave the mover's own king attacked are still emitted; the
//! search discards them when `Position::make_move` reports them illegal.
//! Castling is the exception: it is only generated when the king's path is
//! not attacked, since the intermediate square never appears in any
//! resulting position.

use crate::defs::*;
use crate::mv::{Move, MoveList};
use crate::position::Position;

const PROMOTION_CLASSES: [usize; 4] = [QUEEN, ROOK, BISHOP, KNIGHT];

/// Generate all candidate moves for the side to move.
pub fn generate_moves(pos: &Position) -> MoveList {
    let mut list = MoveList::new();
    let color = pos.side;

    for rank in 0..8u8 {
        for file in 0..8u8 {
            let from = square(file, rank);
            let piece = pos.board[from as usize];
            if piece == BLANK || piece_color(piece) != color {
                continue;
            }
            match piece_class(piece) {
                PAWN => gen_pawn_moves(pos, from, &mut list),
                KNIGHT => gen_leaper_moves(pos, from, &KNIGHT_OFFSETS, &mut list),
                KING => gen_leaper_moves(pos, from, &ATTACK_RAYS, &mut list),
                BISHOP => gen_slider_moves(pos, from, &ATTACK_RAYS[4..], &mut list),
                ROOK => gen_slider_moves(pos, from, &ATTACK_RAYS[..4], &mut list),
                QUEEN => gen_slider_moves(pos, from, &ATTACK_RAYS, &mut list),
                _ => unreachable!(),
            }
        }
    }

    gen_castling(pos, &mut list);
    list
}

#[inline]
fn target_on_board(from: u8, offset: i16) -> Option<u8> {
    let to = from as i16 + offset;
    if (0..128).contains(&to) && !out_of_board(to as u8) {
        Some(to as u8)
    } else {
        None
    }
}

fn add_pawn_move(from: u8, to: u8, list: &mut MoveList) {
    if rank_of(to) == 0 || rank_of(to) == 7 {
        for class in PROMOTION_CLASSES {
            list.add(Move::new(from, to, Some(class)));
        }
    } else {
        list.add(Move::new(from, to, None));
    }
}

fn gen_pawn_moves(pos: &Position, from: u8, list: &mut MoveList) {
    let color = pos.side;
    let forward = if color == WHITE { NORTH } else { SOUTH };
    let start_rank = if color == WHITE { 1 } else { 6 };

    if let Some(to) = target_on_board(from, forward) {
        if pos.board[to as usize] == BLANK {
            add_pawn_move(from, to, list);
            if rank_of(from) == start_rank {
                let two = (to as i16 + forward) as u8;
                if pos.board[two as usize] == BLANK {
                    list.add(Move::new(from, two, None));
                }
            }
        }
    }

    for side_step in [EAST, WEST] {
        if let Some(to) = target_on_board(from, forward + side_step) {
            let target = pos.board[to as usize];
            if target != BLANK && piece_color(target) != color {
                add_pawn_move(from, to, list);
            } else if to == pos.ep_square {
                list.add(Move::new(from, to, None));
            }
        }
    }
}

fn gen_leaper_moves(pos: &Position, from: u8, offsets: &[i16], list: &mut MoveList) {
    for &off in offsets {
        if let Some(to) = target_on_board(from, off) {
            let target = pos.board[to as usize];
            if target == BLANK || piece_color(target) != pos.side {
                list.add(Move::new(from, to, None));
            }
        }
    }
}

fn gen_slider_moves(pos: &Position, from: u8, dirs: &[i16], list: &mut MoveList) {
    for &dir in dirs {
        let mut cur = from;
        while let Some(to) = target_on_board(cur, dir) {
            let target = pos.board[to as usize];
            if target == BLANK {
                list.add(Move::new(from, to, None));
            } else {
                if piece_color(target) != pos.side {
                    list.add(Move::new(from, to, None));
                }
                break;
            }
            cur = to;
        }
    }
}

fn gen_castling(pos: &Position, list: &mut MoveList) {
    let color = pos.side;
    let rank = if color == WHITE { 0 } else { 7 };
    let king_from = square(4, rank);
    if pos.kingpos[color as usize] != king_from {
        return;
    }
    let opp = color ^ 1;

    if pos.castling_rights[color as usize][KINGSIDE]
        && pos.board[square(5, rank) as usize] == BLANK
        && pos.board[square(6, rank) as usize] == BLANK
        && !pos.is_square_attacked(square(4, rank), opp)
        && !pos.is_square_attacked(square(5, rank), opp)
        && !pos.is_square_attacked(square(6, rank), opp)
    {
        list.add(Move::new(king_from, square(6, rank), None));
    }

    if pos.castling_rights[color as usize][QUEENSIDE]
        && pos.board[square(3, rank) as usize] == BLANK
        && pos.board[square(2, rank) as usize] == BLANK
        && pos.board[square(1, rank) as usize] == BLANK
        && !pos.is_square_attacked(square(4, rank), opp)
        && !pos.is_square_attacked(square(3, rank), opp)
        && !pos.is_square_attacked(square(2, rank), opp)
    {
        list.add(Move::new(king_from, square(2, rank), None));
    }
}
