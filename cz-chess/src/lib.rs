//! cz-chess: chess rules adapter.
//!
//! Move generation, make/unmake and check detection are delegated to the
//! `chess` crate; this crate supplies the glue the training loop needs on
//! top of it: a flat from/to action encoding, observation planes from the
//! mover's point of view, draw rules the base crate does not track
//! (fifty-move, threefold repetition, insufficient material), a material
//! heuristic and SAN transcripts.

pub mod env;
pub mod san;

pub use env::ChessEnv;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");


#[cfg(test)]
mod env_tests;
