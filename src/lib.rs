//! Cells, bags of cells, dictionaries, TL-B models and the lite-server TL
//! codec for the TON blockchain.

pub mod cli;
pub mod crc;
pub mod models;
pub mod tl;
pub mod tvm;
pub mod utils;
