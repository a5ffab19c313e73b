//! cz-replay: bounded ring buffer of training tuples.
//!
//! Three contiguous arrays hold observations, visit distributions and target
//! values. A single write cursor wraps around the capacity, so the buffer
//! always retains the most recent `capacity` tuples. One mutex serializes
//! writers and batch readers; both copy through caller-supplied buffers
//! while holding it.

use std::sync::Mutex;

use rand::Rng;

pub struct ReplayBuffer {
    obs_size: usize,
    pol_size: usize,
    capacity: usize,
    inner: Mutex<Inner>,
}

struct Inner {
    obs: Vec<f32>,
    dist: Vec<f32>,
    value: Vec<f32>,
    cursor: usize,
    total: u64,
}

impl ReplayBuffer {
    pub fn new(obs_size: usize, pol_size: usize, capacity: usize) -> Self {
        assert!(capacity > 0, "replay buffer capacity must be > 0");
        Self {
            obs_size,
            pol_size,
            capacity,
            inner: Mutex::new(Inner {
                obs: vec![0.0; capacity * obs_size],
                dist: vec![0.0; capacity * pol_size],
                value: vec![0.0; capacity],
                cursor: 0,
                total: 0,
            }),
        }
    }

    /// Buffer capacity in tuples.
    pub fn size(&self) -> usize {
        self.capacity
    }

    /// Total tuples ever added (not clamped by capacity).
    pub fn count(&self) -> u64 {
        self.inner.lock().unwrap().total
    }

    /// Append one tuple, overwriting the oldest once the ring has wrapped.
    pub fn add(&self, obs: &[f32], dist: &[f32], value: f32) {
        assert_eq!(obs.len(), self.obs_size);
        assert_eq!(dist.len(), self.pol_size);

        let mut inner = self.inner.lock().unwrap();
        let at = inner.cursor;

        inner.obs[at * self.obs_size..(at + 1) * self.obs_size].copy_from_slice(obs);
        inner.dist[at * self.pol_size..(at + 1) * self.pol_size].copy_from_slice(dist);
        inner.value[at] = value;

        inner.cursor = (at + 1) % self.capacity;
        inner.total += 1;
    }

    /// Uniformly sample `n` tuples with replacement into the output buffers.
    ///
    /// Sampling draws only from filled slots: the last `min(count, capacity)`
    /// adds. Panics if the buffer is empty.
    pub fn sample_batch<R: Rng>(
        &self,
        rng: &mut R,
        n: usize,
        out_obs: &mut [f32],
        out_dist: &mut [f32],
        out_value: &mut [f32],
    ) {
        let inner = self.inner.lock().unwrap();
        let filled = (inner.total as usize).min(self.capacity);
        assert!(filled > 0, "sample_batch on an empty replay buffer");

        for i in 0..n {
            let src = rng.gen_range(0..filled);

            out_obs[i * self.obs_size..(i + 1) * self.obs_size]
                .copy_from_slice(&inner.obs[src * self.obs_size..(src + 1) * self.obs_size]);
            out_dist[i * self.pol_size..(i + 1) * self.pol_size]
                .copy_from_slice(&inner.dist[src * self.pol_size..(src + 1) * self.pol_size]);
            out_value[i] = inner.value[src];
        }
    }

    /// Forget everything: the counter and cursor return to zero.
    pub fn clear(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.cursor = 0;
        inner.total = 0;
    }
}

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod buffer_tests;
