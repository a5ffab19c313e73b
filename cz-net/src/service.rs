//! The shared network handle.

use std::io::Cursor;
use std::path::Path;
use std::sync::RwLock;

use cz_core::{options, Infer, InferError};
use rand::seq::SliceRandom;
use rand::Rng;
use tch::nn::{self, OptimizerConfig};
use tch::{Device, Kind, Reduction, Tensor};
use thiserror::Error;

use crate::model::{NetDims, PolicyValueNet};

#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("torch: {0}")]
    Torch(#[from] tch::TchError),
    #[error("model persistence failed at {path}: {message}")]
    Persistence { path: String, message: String },
    #[error("inference produced non-finite values")]
    InferenceFailed,
    #[error("training diverged: non-finite loss")]
    TrainingFailed,
}

/// Loss summary from one `train` call.
#[derive(Debug, Clone, Copy)]
pub struct TrainReport {
    pub first_loss: f32,
    pub last_loss: f32,
}

struct Inner {
    vs: nn::VarStore,
    net: PolicyValueNet,
    /// Shallow handle onto the `generation` tensor registered in `vs`, so
    /// the counter rides inside the parameter archive.
    generation_cell: Tensor,
    generation: u32,
}

/// Reference- or candidate-network handle.
///
/// `infer` runs under the read lock and may be called from many producer
/// threads at once; `train` and checkpoint `read` take the write lock and
/// exclude everything else; `write` only needs the read lock.
pub struct Network {
    inner: RwLock<Inner>,
    device: Device,
    dims: NetDims,
    detect_anomaly: bool,
}

// Parameter tensors are only mutated under the write lock; libtorch forward
// passes on frozen parameters are safe from concurrent threads.
unsafe impl Send for Network {}
unsafe impl Sync for Network {}

impl Network {
    pub fn new(dims: NetDims) -> Result<Self, NetworkError> {
        let device = Device::cuda_if_available();
        let vs = nn::VarStore::new(device);
        let net = PolicyValueNet::new(&vs.root(), dims);
        let generation_cell = vs.root().zeros_no_train("generation", &[1]);

        Ok(Self {
            inner: RwLock::new(Inner {
                vs,
                net,
                generation_cell,
                generation: 0,
            }),
            device,
            dims,
            detect_anomaly: options::get_int("training_detect_anomaly", 0) != 0,
        })
    }

    pub fn dims(&self) -> NetDims {
        self.dims
    }

    pub fn device(&self) -> Device {
        self.device
    }

    /// Current generation of the underlying parameters.
    pub fn generation(&self) -> u32 {
        self.inner.read().unwrap().generation
    }

    /// Batched inference: `batch` observations in, `batch` policy rows and
    /// values out. Concurrent callers share the read lock.
    pub fn infer(
        &self,
        obs: &[f32],
        batch: usize,
        policy: &mut [f32],
        value: &mut [f32],
    ) -> Result<(), NetworkError> {
        let inner = self.inner.read().unwrap();
        let d = self.dims;

        if self.detect_anomaly && obs[..batch * (d.width * d.height * d.features) as usize]
            .iter()
            .any(|x| !x.is_finite())
        {
            return Err(NetworkError::InferenceFailed);
        }

        let inputs = Tensor::from_slice(&obs[..batch * (d.width * d.height * d.features) as usize])
            .reshape([batch as i64, d.width, d.height, d.features])
            .to_device(self.device);

        let (p, v) = tch::no_grad(|| inner.net.forward(&inputs, false));
        let p = p.to_device(Device::Cpu).contiguous();
        let v = v.to_device(Device::Cpu).contiguous();

        p.copy_data(&mut policy[..batch * d.psize as usize], batch * d.psize as usize);
        v.copy_data(&mut value[..batch], batch);

        if self.detect_anomaly
            && (policy[..batch * d.psize as usize]
                .iter()
                .any(|x| !x.is_finite())
                || value[..batch].iter().any(|x| !x.is_finite()))
        {
            return Err(NetworkError::InferenceFailed);
        }

        Ok(())
    }

    /// Run the configured SGD schedule over `n` sampled tuples and bump the
    /// generation. Exclusive: takes the write lock for the duration.
    pub fn train<R: Rng>(
        &self,
        rng: &mut R,
        obs: &[f32],
        dist: &[f32],
        target: &[f32],
        n: usize,
    ) -> Result<TrainReport, NetworkError> {
        let mut inner = self.inner.write().unwrap();
        let d = self.dims;
        let obs_size = (d.width * d.height * d.features) as usize;
        let psize = d.psize as usize;

        let lr = options::get_int("training_mlr", 200) as f64 / 1000.0;
        let epochs = options::get_int("training_epochs", 8).max(1);
        let batch_size = (options::get_int("training_batchsize", 256).max(1) as usize).min(n);

        let mut opt = nn::Sgd::default().build(&inner.vs, lr)?;

        let mut picker: Vec<usize> = (0..n).collect();
        let mut first_loss = 0.0f32;
        let mut last_loss = 0.0f32;

        for epoch in 0..epochs {
            picker.shuffle(rng);

            let mut epoch_loss = 0.0f32;
            let mut batches = 0u32;
            let mut base = 0usize;

            while base < n {
                let take = batch_size.min(n - base);
                let idx = &picker[base..base + take];
                base += take;

                let mut b_obs = Vec::with_capacity(take * obs_size);
                let mut b_dist = Vec::with_capacity(take * psize);
                let mut b_target = Vec::with_capacity(take);
                for &i in idx {
                    b_obs.extend_from_slice(&obs[i * obs_size..(i + 1) * obs_size]);
                    b_dist.extend_from_slice(&dist[i * psize..(i + 1) * psize]);
                    b_target.push(target[i]);
                }

                let inputs = Tensor::from_slice(&b_obs)
                    .reshape([take as i64, d.width, d.height, d.features])
                    .to_device(self.device);
                let target_p = Tensor::from_slice(&b_dist)
                    .reshape([take as i64, d.psize])
                    .to_device(self.device);
                let target_v = Tensor::from_slice(&b_target).to_device(self.device);

                let (p, v) = inner.net.forward(&inputs, true);

                let value_loss = v.mse_loss(&target_v, Reduction::Mean);
                let policy_loss = (target_p * (p + 1e-4).log()).sum(Kind::Float).neg();
                let loss = policy_loss + value_loss;

                let scalar = loss.double_value(&[]) as f32;
                if self.detect_anomaly && !scalar.is_finite() {
                    return Err(NetworkError::TrainingFailed);
                }

                opt.backward_step(&loss);
                epoch_loss += scalar;
                batches += 1;
            }

            epoch_loss /= batches.max(1) as f32;
            log::info!("epoch {}/{}: loss {:.4}", epoch + 1, epochs, epoch_loss);

            if epoch == 0 {
                first_loss = epoch_loss;
            }
            last_loss = epoch_loss;
        }

        inner.generation += 1;
        let g = inner.generation;
        inner
            .generation_cell
            .copy_(&Tensor::from_slice(&[g as f32]));

        Ok(TrainReport {
            first_loss,
            last_loss,
        })
    }

    /// Independent copy at the same generation, by round-tripping the
    /// parameter archive through memory.
    pub fn try_clone(&self) -> Result<Network, NetworkError> {
        let inner = self.inner.read().unwrap();

        let mut archive: Vec<u8> = Vec::new();
        inner.vs.save_to_stream(&mut archive)?;

        let copy = Network::new(self.dims)?;
        {
            let mut copy_inner = copy.inner.write().unwrap();
            copy_inner.vs.load_from_stream(Cursor::new(&archive))?;
            copy_inner.generation = inner.generation;
        }
        Ok(copy)
    }

    /// Persist the parameter archive (generation included) to `path`.
    pub fn write(&self, path: impl AsRef<Path>) -> Result<(), NetworkError> {
        let path = path.as_ref();
        let inner = self.inner.read().unwrap();
        inner.vs.save(path).map_err(|e| NetworkError::Persistence {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Replace the parameters from `path`. Exclusive with `infer` and
    /// `train`; producers observe the result through `generation()`.
    pub fn read(&self, path: impl AsRef<Path>) -> Result<(), NetworkError> {
        let path = path.as_ref();
        let mut inner = self.inner.write().unwrap();

        inner.vs.load(path).map_err(|e| NetworkError::Persistence {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        inner.generation = inner.generation_cell.double_value(&[0]) as u32;
        Ok(())
    }
}

impl Infer for Network {
    fn infer(
        &self,
        obs: &[f32],
        batch: usize,
        policy: &mut [f32],
        value: &mut [f32],
    ) -> Result<(), InferError> {
        Network::infer(self, obs, batch, policy, value).map_err(|e| match e {
            NetworkError::InferenceFailed => InferError::InferenceFailed,
            other => InferError::Backend(other.to_string()),
        })
    }

    fn generation(&self) -> u32 {
        Network::generation(self)
    }
}
