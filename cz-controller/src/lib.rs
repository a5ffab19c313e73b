//! cz-controller: the generation controller.
//!
//! Consumer workers watch replay-buffer progress. Once the trajectory target
//! is reached, a worker clones the reference network, trains the clone on a
//! buffer sample, runs the evaluation match, and promotes the candidate
//! through the model file only on acceptance. The reference is never touched
//! on any failure path.

pub mod metrics;
mod targets;
pub mod worker;

use std::sync::atomic::AtomicUsize;
use std::sync::Arc;
use std::thread::JoinHandle;

use cz_core::{options, Environment, Status};
use cz_net::Network;
use cz_replay::ReplayBuffer;

use crate::worker::ConsumerCtx;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub struct Controller {
    workers: Vec<JoinHandle<()>>,
}

impl Controller {
    /// Spawn the consumer pool. Call after the self-play engine has set the
    /// run status to `Running`; workers drain as soon as it leaves that
    /// state.
    pub fn start<E: Environment>(
        model: Arc<Network>,
        replay: Arc<ReplayBuffer>,
        status: Arc<Status>,
        partials: Arc<Vec<AtomicUsize>>,
    ) -> Self {
        let n_workers = options::get_int("training_threads", 1).max(1) as usize;

        let workers = (0..n_workers)
            .map(|id| {
                let ctx = ConsumerCtx {
                    id,
                    model: Arc::clone(&model),
                    replay: Arc::clone(&replay),
                    status: Arc::clone(&status),
                    partials: Arc::clone(&partials),
                };
                std::thread::spawn(move || worker::consumer_main::<E>(ctx))
            })
            .collect();

        Self { workers }
    }

    /// Join every consumer. They exit on their own once the run status
    /// leaves `Running`.
    pub fn stop(mut self) {
        for w in self.workers.drain(..) {
            let _ = w.join();
        }
    }
}
