//! cz-core: shared interfaces for the training loop.
//!
//! This crate holds everything the other crates agree on without pulling in
//! heavy dependencies: the [`Environment`] trait implemented by game rule
//! adapters, the batched [`Infer`] interface implemented by the network
//! service, the process-wide options store, and the run status codes.

pub mod env;
pub mod infer;
pub mod options;
pub mod status;
pub mod ttt;

pub use env::Environment;
pub use infer::{Infer, InferError};
pub use options::ConfigError;
pub use status::{Status, StatusCode};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_nonempty() {
        assert!(!VERSION.is_empty());
    }
}
