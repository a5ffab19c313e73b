//! Batched inference interface.
//!
//! Producers and the evaluation gate talk to a model through this trait so
//! tests can substitute cheap stub evaluators for the real network service.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum InferError {
    /// Non-finite values detected in inference inputs or outputs.
    #[error("inference produced non-finite values")]
    InferenceFailed,
    /// The backend failed for another reason.
    #[error("inference backend: {0}")]
    Backend(String),
}

/// A policy/value evaluator over batches of observations.
pub trait Infer {
    /// Evaluate `batch` observations packed into `obs`.
    ///
    /// On success `policy` holds `batch` rows of non-negative entries summing
    /// to one and `value` holds `batch` scalars in `[-1, 1]`.
    fn infer(
        &self,
        obs: &[f32],
        batch: usize,
        policy: &mut [f32],
        value: &mut [f32],
    ) -> Result<(), InferError>;

    /// Monotonic generation counter of the underlying parameters.
    fn generation(&self) -> u32;
}

/// Uniform policy and zero value. Baseline stub for tests and smoke runs.
pub struct UniformInfer {
    pol_size: usize,
}

impl UniformInfer {
    pub fn new(pol_size: usize) -> Self {
        Self { pol_size }
    }
}

impl Infer for UniformInfer {
    fn infer(
        &self,
        _obs: &[f32],
        batch: usize,
        policy: &mut [f32],
        value: &mut [f32],
    ) -> Result<(), InferError> {
        let u = 1.0 / self.pol_size as f32;
        policy[..batch * self.pol_size].fill(u);
        value[..batch].fill(0.0);
        Ok(())
    }

    fn generation(&self) -> u32 {
        0
    }
}
