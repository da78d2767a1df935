//! The Q-network: extractor, hidden stack and head.
use super::{relu_backward_inplace, relu_inplace, Conv2d, LayerNorm, Linear};
use crate::config::{ExtractorKind, PolicyConfig};
use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};

/// Number of board cells the convolutional extractor expects.
const CELLS: usize = 16;
/// Filters of the convolutional extractor.
const CONV_FILTERS: usize = 32;

/// A feed-forward action-value network.
///
/// Observations flow through an optional convolutional extractor, a stack of
/// fully connected hidden layers with ReLU activations (each optionally
/// normalized before the activation), and either a plain linear head or a
/// dueling head that recombines a state-value and an advantage stream as
/// `q = v + a - mean(a)`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QNetwork {
    in_dim: usize,
    n_actions: usize,
    extractor: Option<Conv2d>,
    hidden: Vec<Linear>,
    norms: Vec<LayerNorm>,
    value: Option<Linear>,
    advantage: Linear,
}

/// Intermediates of a forward pass needed by the backward pass.
pub struct ForwardCache {
    input: Vec<f32>,
    /// `acts[0]` is the input of the first hidden layer (the flat features
    /// or the activated extractor output); `acts[i + 1]` is the activated
    /// output of hidden layer `i`.
    acts: Vec<Vec<f32>>,
    norms: Vec<Option<super::linear::NormCache>>,
}

impl QNetwork {
    /// Builds a network for the given feature and action dimensions.
    pub fn new(
        in_dim: usize,
        n_actions: usize,
        config: &PolicyConfig,
        rng: &mut fastrand::Rng,
    ) -> Result<Self> {
        ensure!(in_dim > 0, "observation dimension must be positive");
        ensure!(n_actions > 0, "action dimension must be positive");

        let extractor = match config.extractor {
            ExtractorKind::Flat => None,
            ExtractorKind::Conv => {
                ensure!(
                    in_dim % CELLS == 0,
                    "convolutional extractor needs {} feature planes, got dimension {}",
                    CELLS,
                    in_dim
                );
                Some(Conv2d::new(in_dim / CELLS, CONV_FILTERS, rng))
            }
        };

        let mut dim = extractor.as_ref().map(Conv2d::out_dim).unwrap_or(in_dim);
        let mut hidden = Vec::with_capacity(config.layers.len());
        let mut norms = Vec::new();
        for &width in &config.layers {
            ensure!(width > 0, "hidden layer width must be positive");
            hidden.push(Linear::new(dim, width, rng));
            if config.layer_norm {
                norms.push(LayerNorm::new(width));
            }
            dim = width;
        }

        let value = config.dueling.then(|| Linear::new(dim, 1, rng));
        let advantage = Linear::new(dim, n_actions, rng);

        Ok(Self {
            in_dim,
            n_actions,
            extractor,
            hidden,
            norms,
            value,
            advantage,
        })
    }

    /// Number of input features.
    pub fn in_dim(&self) -> usize {
        self.in_dim
    }

    /// Number of action values produced.
    pub fn n_actions(&self) -> usize {
        self.n_actions
    }

    /// Action values for an observation.
    pub fn forward(&self, x: &[f32]) -> Vec<f32> {
        self.forward_cached(x).0
    }

    /// Action values plus the intermediates the backward pass needs.
    pub(crate) fn forward_cached(&self, x: &[f32]) -> (Vec<f32>, ForwardCache) {
        debug_assert_eq!(x.len(), self.in_dim);
        let mut acts = Vec::with_capacity(self.hidden.len() + 1);
        let mut norm_caches = Vec::with_capacity(self.hidden.len());

        let mut a = match &self.extractor {
            Some(conv) => {
                let mut y = conv.forward(x);
                relu_inplace(&mut y);
                y
            }
            None => x.to_vec(),
        };

        for (i, layer) in self.hidden.iter().enumerate() {
            let z = layer.forward(&a);
            let (mut n, cache) = match self.norms.get(i) {
                Some(norm) => {
                    let (n, c) = norm.forward(&z);
                    (n, Some(c))
                }
                None => (z, None),
            };
            relu_inplace(&mut n);
            norm_caches.push(cache);
            acts.push(a);
            a = n;
        }
        acts.push(a);

        let h = acts.last().map(Vec::as_slice).unwrap_or(x);
        let q = match &self.value {
            Some(value) => {
                let v = value.forward(h)[0];
                let adv = self.advantage.forward(h);
                let mean = adv.iter().sum::<f32>() / self.n_actions as f32;
                adv.iter().map(|a| v + a - mean).collect()
            }
            None => self.advantage.forward(h),
        };

        (
            q,
            ForwardCache {
                input: x.to_vec(),
                acts,
                norms: norm_caches,
            },
        )
    }

    /// Accumulates parameter gradients for the action-value gradient `dq`.
    pub(crate) fn backward(&mut self, cache: &ForwardCache, dq: &[f32]) {
        debug_assert_eq!(dq.len(), self.n_actions);
        let h = cache
            .acts
            .last()
            .map(Vec::as_slice)
            .unwrap_or(&cache.input);

        let mut d = match &mut self.value {
            Some(value) => {
                // q = v + a - mean(a), so dv sums dq and the mean component
                // of dq cancels out of the advantage stream.
                let dv: f32 = dq.iter().sum();
                let mean = dv / self.n_actions as f32;
                let da: Vec<f32> = dq.iter().map(|d| d - mean).collect();
                let mut dh = value.backward(h, &[dv]);
                for (a, b) in dh.iter_mut().zip(self.advantage.backward(h, &da)) {
                    *a += b;
                }
                dh
            }
            None => self.advantage.backward(h, dq),
        };

        for i in (0..self.hidden.len()).rev() {
            relu_backward_inplace(&mut d, &cache.acts[i + 1]);
            if let Some(norm_cache) = &cache.norms[i] {
                d = self.norms[i].backward(norm_cache, &d);
            }
            d = self.hidden[i].backward(&cache.acts[i], &d);
        }

        if let Some(conv) = &mut self.extractor {
            relu_backward_inplace(&mut d, &cache.acts[0]);
            conv.backward(&cache.input, &d);
        }
    }

    /// Applies the accumulated gradients scaled by `step` and zeroes them.
    pub(crate) fn apply_grads(&mut self, step: f32) {
        if let Some(conv) = &mut self.extractor {
            conv.apply_grads(step);
        }
        for layer in &mut self.hidden {
            layer.apply_grads(step);
        }
        for norm in &mut self.norms {
            norm.apply_grads(step);
        }
        if let Some(value) = &mut self.value {
            value.apply_grads(step);
        }
        self.advantage.apply_grads(step);
    }
}
