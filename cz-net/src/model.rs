//! Residual policy/value tower.

use cz_core::{options, Environment};
use tch::nn::{self, ConvConfig, ModuleT};
use tch::{Kind, Tensor};

/// Network shape: board geometry from the environment, tower size from the
/// options store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetDims {
    pub width: i64,
    pub height: i64,
    pub features: i64,
    pub psize: i64,
    pub filters: i64,
    pub residuals: i64,
}

impl NetDims {
    pub fn for_env<E: Environment>() -> Self {
        Self {
            width: E::WIDTH as i64,
            height: E::HEIGHT as i64,
            features: E::FEATURES as i64,
            psize: E::POL_SIZE as i64,
            filters: options::get_int("filters", 16),
            residuals: options::get_int("residuals", 4),
        }
    }
}

fn conv3x3(p: &nn::Path, cin: i64, cout: i64) -> nn::Conv2D {
    nn::conv2d(
        p,
        cin,
        cout,
        3,
        ConvConfig {
            padding: 1,
            ..Default::default()
        },
    )
}

struct Residual {
    conv1: nn::Conv2D,
    bn1: nn::BatchNorm,
    conv2: nn::Conv2D,
    bn2: nn::BatchNorm,
}

impl Residual {
    fn new(p: &nn::Path, filters: i64) -> Self {
        Self {
            conv1: conv3x3(&(p / "conv1"), filters, filters),
            bn1: nn::batch_norm2d(p / "bn1", filters, Default::default()),
            conv2: conv3x3(&(p / "conv2"), filters, filters),
            bn2: nn::batch_norm2d(p / "bn2", filters, Default::default()),
        }
    }

    fn forward(&self, xs: &Tensor, train: bool) -> Tensor {
        let skip = xs;
        let x = self.bn1.forward_t(&xs.apply(&self.conv1), train).relu();
        skip + self.bn2.forward_t(&x.apply(&self.conv2), train)
    }
}

pub struct PolicyValueNet {
    dims: NetDims,
    conv: nn::Conv2D,
    bn: nn::BatchNorm,
    residuals: Vec<Residual>,
    policy_conv: nn::Conv2D,
    policy_bn: nn::BatchNorm,
    policy_fc: nn::Linear,
    value_conv: nn::Conv2D,
    value_bn: nn::BatchNorm,
    value_fc1: nn::Linear,
    value_fc2: nn::Linear,
}

impl PolicyValueNet {
    pub fn new(p: &nn::Path, dims: NetDims) -> Self {
        let area = dims.width * dims.height;

        let residuals = (0..dims.residuals)
            .map(|i| Residual::new(&(p / format!("residual{}", i)), dims.filters))
            .collect();

        Self {
            dims,
            conv: conv3x3(&(p / "conv"), dims.features, dims.filters),
            bn: nn::batch_norm2d(p / "bn", dims.filters, Default::default()),
            residuals,
            policy_conv: nn::conv2d(p / "policy_conv", dims.filters, 32, 1, Default::default()),
            policy_bn: nn::batch_norm2d(p / "policy_bn", 32, Default::default()),
            policy_fc: nn::linear(p / "policy_fc", 32 * area, dims.psize, Default::default()),
            value_conv: nn::conv2d(p / "value_conv", dims.filters, 3, 1, Default::default()),
            value_bn: nn::batch_norm2d(p / "value_bn", 3, Default::default()),
            value_fc1: nn::linear(p / "value_fc1", 3 * area, 128, Default::default()),
            value_fc2: nn::linear(p / "value_fc2", 128, 1, Default::default()),
        }
    }

    /// Forward a `[batch, width, height, features]` tensor into a softmax
    /// policy `[batch, psize]` and a tanh value `[batch]`.
    pub fn forward(&self, xs: &Tensor, train: bool) -> (Tensor, Tensor) {
        let mut x = xs.permute([0, 3, 1, 2]);
        x = self.bn.forward_t(&x.apply(&self.conv), train).relu();

        for r in &self.residuals {
            x = r.forward(&x, train);
        }

        let ph = self
            .policy_bn
            .forward_t(&x.apply(&self.policy_conv), train)
            .relu()
            .flatten(1, -1)
            .apply(&self.policy_fc)
            .softmax(-1, Kind::Float);

        let vh = self
            .value_bn
            .forward_t(&x.apply(&self.value_conv), train)
            .relu()
            .flatten(1, -1)
            .apply(&self.value_fc1)
            .apply(&self.value_fc2)
            .tanh()
            .squeeze_dim(-1);

        (ph, vh)
    }

    pub fn dims(&self) -> NetDims {
        self.dims
    }
}
