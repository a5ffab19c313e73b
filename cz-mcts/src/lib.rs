//! cz-mcts: PUCT Monte Carlo tree search with batched expansion.
//!
//! The tree is built for interleaved operation: `select` walks to a leaf and
//! fills an observation slot, the caller batches many such slots through the
//! network, and `expand` consumes one policy/value row. Node storage is an
//! arena of 32-bit ids owned by the tree; `reset` drops the arena wholesale.

pub mod arena;
pub mod node;
pub mod tree;

pub use arena::Arena;
pub use node::{Node, NodeId};
pub use tree::{SearchTree, TreeConfig, TreeError};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");


#[cfg(test)]
mod tree_tests;
