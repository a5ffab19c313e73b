//! cz-net: the network service.
//!
//! Wraps a residual policy/value network behind a readers-writer discipline:
//! many producer threads run batched `infer` concurrently under the read
//! lock, while `train` and checkpoint `read` take the write lock. A
//! monotonic generation counter travels inside the parameter archive so a
//! promoted model carries its lineage across the file boundary.

pub mod model;
pub mod service;

pub use model::NetDims;
pub use service::{Network, NetworkError, TrainReport};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
