//! cz-selfplay: the self-play engine.
//!
//! A fleet of producer workers, each driving a fixed batch of search trees
//! against the shared reference model. Workers batch one observation per
//! tree into a single inference call, expand, and record training tuples
//! whose targets resolve when their game terminates.

pub mod engine;
pub mod worker;

pub use engine::{EngineError, Selfplay};
pub use worker::temperature;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");


#[cfg(test)]
mod engine_tests;
