//! Fully connected layer and layer normalization.
use serde::{Deserialize, Serialize};

const NORM_EPS: f32 = 1e-5;

/// A fully connected layer, `y = W x + b`.
///
/// Gradient buffers are not part of the persisted parameters; they are
/// resized on first use after deserialization.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Linear {
    in_dim: usize,
    out_dim: usize,
    /// Row-major, `out_dim` rows of `in_dim` weights.
    w: Vec<f32>,
    b: Vec<f32>,
    #[serde(skip)]
    gw: Vec<f32>,
    #[serde(skip)]
    gb: Vec<f32>,
}

impl Linear {
    /// A layer with uniform `[-k, k]` weights, `k = 1 / sqrt(in_dim)`.
    pub fn new(in_dim: usize, out_dim: usize, rng: &mut fastrand::Rng) -> Self {
        let bound = 1.0 / (in_dim as f32).sqrt();
        let w = (0..in_dim * out_dim)
            .map(|_| (2.0 * rng.f32() - 1.0) * bound)
            .collect();
        Self {
            in_dim,
            out_dim,
            w,
            b: vec![0.0; out_dim],
            gw: vec![0.0; in_dim * out_dim],
            gb: vec![0.0; out_dim],
        }
    }

    pub fn out_dim(&self) -> usize {
        self.out_dim
    }

    pub fn forward(&self, x: &[f32]) -> Vec<f32> {
        debug_assert_eq!(x.len(), self.in_dim);
        let mut y = self.b.clone();
        for j in 0..self.out_dim {
            let row = &self.w[j * self.in_dim..(j + 1) * self.in_dim];
            y[j] += row.iter().zip(x).map(|(w, x)| w * x).sum::<f32>();
        }
        y
    }

    /// Accumulates parameter gradients for output gradient `dy` at the cached
    /// input `x`, and returns the input gradient.
    pub fn backward(&mut self, x: &[f32], dy: &[f32]) -> Vec<f32> {
        self.ensure_grads();
        let mut dx = vec![0.0; self.in_dim];
        for j in 0..self.out_dim {
            let d = dy[j];
            self.gb[j] += d;
            let row = &mut self.gw[j * self.in_dim..(j + 1) * self.in_dim];
            for i in 0..self.in_dim {
                row[i] += d * x[i];
                dx[i] += d * self.w[j * self.in_dim + i];
            }
        }
        dx
    }

    /// Applies `p -= step * grad` and zeroes the gradient buffers.
    pub fn apply_grads(&mut self, step: f32) {
        for (w, g) in self.w.iter_mut().zip(self.gw.iter_mut()) {
            *w -= step * *g;
            *g = 0.0;
        }
        for (b, g) in self.b.iter_mut().zip(self.gb.iter_mut()) {
            *b -= step * *g;
            *g = 0.0;
        }
    }

    fn ensure_grads(&mut self) {
        if self.gw.len() != self.w.len() {
            self.gw = vec![0.0; self.w.len()];
            self.gb = vec![0.0; self.b.len()];
        }
    }
}

/// Per-feature normalization with a learned gain and bias.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LayerNorm {
    dim: usize,
    gain: Vec<f32>,
    bias: Vec<f32>,
    #[serde(skip)]
    ggain: Vec<f32>,
    #[serde(skip)]
    gbias: Vec<f32>,
}

/// Intermediates of a [`LayerNorm`] forward pass needed by its backward pass.
#[derive(Clone, Debug)]
pub struct NormCache {
    inv_std: f32,
    xhat: Vec<f32>,
}

impl LayerNorm {
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            gain: vec![1.0; dim],
            bias: vec![0.0; dim],
            ggain: vec![0.0; dim],
            gbias: vec![0.0; dim],
        }
    }

    pub fn forward(&self, x: &[f32]) -> (Vec<f32>, NormCache) {
        debug_assert_eq!(x.len(), self.dim);
        let n = self.dim as f32;
        let mean = x.iter().sum::<f32>() / n;
        let var = x.iter().map(|v| (v - mean) * (v - mean)).sum::<f32>() / n;
        let inv_std = 1.0 / (var + NORM_EPS).sqrt();
        let xhat: Vec<f32> = x.iter().map(|v| (v - mean) * inv_std).collect();
        let y = xhat
            .iter()
            .zip(self.gain.iter().zip(&self.bias))
            .map(|(xh, (g, b))| g * xh + b)
            .collect();
        (y, NormCache { inv_std, xhat })
    }

    pub fn backward(&mut self, cache: &NormCache, dy: &[f32]) -> Vec<f32> {
        self.ensure_grads();
        let n = self.dim as f32;
        let dxhat: Vec<f32> = dy.iter().zip(&self.gain).map(|(d, g)| d * g).collect();
        for i in 0..self.dim {
            self.ggain[i] += dy[i] * cache.xhat[i];
            self.gbias[i] += dy[i];
        }
        let sum_dxhat = dxhat.iter().sum::<f32>();
        let sum_dxhat_xhat = dxhat.iter().zip(&cache.xhat).map(|(d, xh)| d * xh).sum::<f32>();
        dxhat
            .iter()
            .zip(&cache.xhat)
            .map(|(d, xh)| cache.inv_std / n * (n * d - sum_dxhat - xh * sum_dxhat_xhat))
            .collect()
    }

    pub fn apply_grads(&mut self, step: f32) {
        for (p, g) in self.gain.iter_mut().zip(self.ggain.iter_mut()) {
            *p -= step * *g;
            *g = 0.0;
        }
        for (p, g) in self.bias.iter_mut().zip(self.gbias.iter_mut()) {
            *p -= step * *g;
            *g = 0.0;
        }
    }

    fn ensure_grads(&mut self) {
        if self.ggain.len() != self.dim {
            self.ggain = vec![0.0; self.dim];
            self.gbias = vec![0.0; self.dim];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{LayerNorm, Linear};

    // A purely linear map, so central differences are exact up to float
    // rounding.
    #[test]
    fn test_linear_gradients_match_finite_differences() {
        let mut rng = fastrand::Rng::with_seed(1);
        let mut layer = Linear::new(3, 2, &mut rng);
        let x = [0.5, -1.0, 2.0];
        let dy = [1.0, -0.5];

        let dx = layer.backward(&x, &dy);

        let h = 1e-3;
        let loss = |l: &Linear| -> f32 {
            l.forward(&x).iter().zip(&dy).map(|(y, d)| y * d).sum()
        };
        for k in 0..layer.w.len() {
            let mut plus = layer.clone();
            plus.w[k] += h;
            let mut minus = layer.clone();
            minus.w[k] -= h;
            let num = (loss(&plus) - loss(&minus)) / (2.0 * h);
            assert!((layer.gw[k] - num).abs() < 1e-3, "weight {}", k);
        }
        for i in 0..3 {
            let mut xp = x;
            xp[i] += h;
            let mut xm = x;
            xm[i] -= h;
            let lp: f32 = layer.forward(&xp).iter().zip(&dy).map(|(y, d)| y * d).sum();
            let lm: f32 = layer.forward(&xm).iter().zip(&dy).map(|(y, d)| y * d).sum();
            assert!((dx[i] - (lp - lm) / (2.0 * h)).abs() < 1e-3, "input {}", i);
        }
    }

    #[test]
    fn test_layer_norm_output_is_standardized() {
        let norm = LayerNorm::new(4);
        let (y, _) = norm.forward(&[1.0, 2.0, 3.0, 4.0]);
        let mean = y.iter().sum::<f32>() / 4.0;
        let var = y.iter().map(|v| (v - mean) * (v - mean)).sum::<f32>() / 4.0;
        assert!(mean.abs() < 1e-5);
        assert!((var - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_layer_norm_gradient_matches_finite_differences() {
        let mut norm = LayerNorm::new(4);
        norm.gain = vec![1.5, 0.5, 2.0, 1.0];
        let x = [0.3, -0.7, 1.2, 0.1];
        let dy = [1.0, -2.0, 0.5, 0.25];

        let (_, cache) = norm.forward(&x);
        let dx = norm.backward(&cache, &dy);

        let h = 1e-3;
        for i in 0..4 {
            let mut xp = x;
            xp[i] += h;
            let mut xm = x;
            xm[i] -= h;
            let lp: f32 = norm.forward(&xp).0.iter().zip(&dy).map(|(y, d)| y * d).sum();
            let lm: f32 = norm.forward(&xm).0.iter().zip(&dy).map(|(y, d)| y * d).sum();
            let num = (lp - lm) / (2.0 * h);
            assert!((dx[i] - num).abs() < 1e-2, "input {}: {} vs {}", i, dx[i], num);
        }
    }
}
