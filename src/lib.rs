//! # Larch
//!
//! A UCI chess engine built on a 0x88 mailbox board, an incrementally
//! updated NNUE evaluator, and an alpha-beta search with a lock-free
//! transposition table.

pub mod defs;
pub mod movegen;
pub mod mv;
pub mod nnue;
pub mod position;
pub mod search;
pub mod uci;
