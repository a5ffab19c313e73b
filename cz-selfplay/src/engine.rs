//! Engine lifecycle and the PGN handoff.

use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use cz_core::{options, Environment, Infer, Status, StatusCode};
use cz_replay::ReplayBuffer;
use thiserror::Error;

use crate::worker::{self, WorkerCtx};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("start() called while {0}")]
    NotStopped(&'static str),
    #[error("stop() called while {0}")]
    NotRunning(&'static str),
}

/// One-shot transcript request, claimed by whichever worker finishes a game
/// next.
pub(crate) struct PgnRequest {
    pub wanted: AtomicBool,
    pub slot: Mutex<Option<String>>,
}

pub struct Selfplay<E: Environment, M: Infer + Send + Sync + 'static> {
    model: Arc<M>,
    replay: Arc<ReplayBuffer>,
    status: Arc<Status>,
    pgn: Arc<PgnRequest>,
    partials: Arc<Vec<AtomicUsize>>,
    workers: Vec<JoinHandle<()>>,
    _env: PhantomData<E>,
}

impl<E: Environment, M: Infer + Send + Sync + 'static> Selfplay<E, M> {
    pub fn new(model: Arc<M>, status: Arc<Status>) -> Self {
        let capacity = options::get_int("replaybuffer_size", 512).max(1) as usize;
        let replay = Arc::new(ReplayBuffer::new(E::OBS_SIZE, E::POL_SIZE, capacity));

        Self {
            model,
            replay,
            status,
            pgn: Arc::new(PgnRequest {
                wanted: AtomicBool::new(false),
                slot: Mutex::new(None),
            }),
            partials: Arc::new(Vec::new()),
            workers: Vec::new(),
            _env: PhantomData,
        }
    }

    pub fn replay_buffer(&self) -> Arc<ReplayBuffer> {
        Arc::clone(&self.replay)
    }

    pub fn status(&self) -> Arc<Status> {
        Arc::clone(&self.status)
    }

    /// Per-worker counts of trajectories still waiting on a game result.
    pub fn partials(&self) -> Arc<Vec<AtomicUsize>> {
        Arc::clone(&self.partials)
    }

    /// Spawn the producer workers. Legal only from `Stopped`.
    pub fn start(&mut self) -> Result<(), EngineError> {
        let code = self.status.code();
        if code != StatusCode::Stopped {
            return Err(EngineError::NotStopped(code.as_str()));
        }
        self.status.set_code(StatusCode::Running);

        let n_workers = options::get_int("inference_threads", 1).max(1) as usize;
        self.partials = Arc::new((0..n_workers).map(|_| AtomicUsize::new(0)).collect());

        for id in 0..n_workers {
            let ctx = WorkerCtx {
                id,
                model: Arc::clone(&self.model),
                replay: Arc::clone(&self.replay),
                status: Arc::clone(&self.status),
                pgn: Arc::clone(&self.pgn),
                partials: Arc::clone(&self.partials),
            };
            self.workers
                .push(std::thread::spawn(move || worker::producer_main::<E, M>(ctx)));
        }

        Ok(())
    }

    /// Cooperative shutdown: flip to `Waiting`, join every worker, then mark
    /// `Stopped`. Legal only from `Running`.
    pub fn stop(&mut self) -> Result<(), EngineError> {
        let code = self.status.code();
        if code != StatusCode::Running {
            return Err(EngineError::NotRunning(code.as_str()));
        }

        self.status.set_code(StatusCode::Waiting);
        for w in self.workers.drain(..) {
            let _ = w.join();
        }
        self.status.set_code(StatusCode::Stopped);
        Ok(())
    }

    /// Block until any worker finishes a game and hand over its transcript.
    ///
    /// Returns `None` if the engine stops before another game completes.
    pub fn request_pgn(&self) -> Option<String> {
        self.pgn.wanted.store(true, Ordering::SeqCst);

        loop {
            if let Some(pgn) = self.pgn.slot.lock().unwrap().take() {
                return Some(pgn);
            }
            if self.status.code() == StatusCode::Stopped {
                self.pgn.wanted.store(false, Ordering::SeqCst);
                return None;
            }
            std::thread::sleep(Duration::from_millis(100));
        }
    }
}
