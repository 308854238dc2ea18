//! Larch entry point: load the network if one is available, then hand
//! control to the UCI loop.

use anyhow::Result;
use larch::nnue::{NnueNetwork, DEFAULT_NNUE_PATH};
use larch::uci::Uci;
use std::sync::Arc;

fn main() -> Result<()> {
    let path = std::env::args().nth(1).unwrap_or_else(|| DEFAULT_NNUE_PATH.to_string());

    let network = match NnueNetwork::load(&path) {
        Ok(net) => {
            println!("info string loaded network from {path}");
            Some(Arc::new(net))
        }
        Err(e) => {
            // Material-only evaluation still plays; a missing default file
            // is expected on a fresh install, a corrupt one is not.
            println!("info string no network ({e}), using material evaluation");
            None
        }
    };

    Uci::new(network).run()
}
