//! Convolutional feature extractor over the 4x4 board.
use serde::{Deserialize, Serialize};

/// Side length of the board the extractor convolves over.
const BOARD: usize = 4;
/// Kernel side length.
const KERNEL: usize = 2;
/// Side length of the output feature map (valid padding, stride 1).
const OUT: usize = BOARD - KERNEL + 1;

/// A single 2x2 valid convolution over a 4x4 board with `in_channels`
/// feature planes per cell.
///
/// The input is the flat observation vector in cell-major layout,
/// `x[cell * in_channels + channel]` with `cell = row * 4 + col`. The output
/// is filter-major, `y[(filter * 3 + row) * 3 + col]`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Conv2d {
    in_channels: usize,
    filters: usize,
    /// `filters * in_channels * KERNEL * KERNEL` weights.
    w: Vec<f32>,
    b: Vec<f32>,
    #[serde(skip)]
    gw: Vec<f32>,
    #[serde(skip)]
    gb: Vec<f32>,
}

impl Conv2d {
    pub fn new(in_channels: usize, filters: usize, rng: &mut fastrand::Rng) -> Self {
        let fan_in = in_channels * KERNEL * KERNEL;
        let bound = 1.0 / (fan_in as f32).sqrt();
        let w = (0..filters * fan_in)
            .map(|_| (2.0 * rng.f32() - 1.0) * bound)
            .collect();
        Self {
            in_channels,
            filters,
            w,
            b: vec![0.0; filters],
            gw: vec![0.0; filters * fan_in],
            gb: vec![0.0; filters],
        }
    }

    pub fn out_dim(&self) -> usize {
        self.filters * OUT * OUT
    }

    fn weight_ix(&self, f: usize, ch: usize, dr: usize, dc: usize) -> usize {
        ((f * self.in_channels + ch) * KERNEL + dr) * KERNEL + dc
    }

    fn input_ix(&self, row: usize, col: usize, ch: usize) -> usize {
        (row * BOARD + col) * self.in_channels + ch
    }

    /// Pre-activation feature map.
    pub fn forward(&self, x: &[f32]) -> Vec<f32> {
        debug_assert_eq!(x.len(), BOARD * BOARD * self.in_channels);
        let mut y = vec![0.0; self.out_dim()];
        for f in 0..self.filters {
            for r in 0..OUT {
                for c in 0..OUT {
                    let mut acc = self.b[f];
                    for ch in 0..self.in_channels {
                        for dr in 0..KERNEL {
                            for dc in 0..KERNEL {
                                acc += self.w[self.weight_ix(f, ch, dr, dc)]
                                    * x[self.input_ix(r + dr, c + dc, ch)];
                            }
                        }
                    }
                    y[(f * OUT + r) * OUT + c] = acc;
                }
            }
        }
        y
    }

    /// Accumulates parameter gradients for the pre-activation gradient `dy`
    /// at the cached input `x`. The extractor is the first layer, so no input
    /// gradient is produced.
    pub fn backward(&mut self, x: &[f32], dy: &[f32]) {
        self.ensure_grads();
        for f in 0..self.filters {
            for r in 0..OUT {
                for c in 0..OUT {
                    let d = dy[(f * OUT + r) * OUT + c];
                    self.gb[f] += d;
                    for ch in 0..self.in_channels {
                        for dr in 0..KERNEL {
                            for dc in 0..KERNEL {
                                let ix = self.weight_ix(f, ch, dr, dc);
                                self.gw[ix] += d * x[self.input_ix(r + dr, c + dc, ch)];
                            }
                        }
                    }
                }
            }
        }
    }

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

#[cfg(test)]
mod tests {
    use super::{Conv2d, OUT};

    #[test]
    fn test_output_shape() {
        let mut rng = fastrand::Rng::with_seed(2);
        let conv = Conv2d::new(3, 8, &mut rng);
        let x = vec![0.25; 4 * 4 * 3];
        assert_eq!(conv.forward(&x).len(), 8 * OUT * OUT);
    }

    #[test]
    fn test_single_filter_sums_its_window() {
        let mut rng = fastrand::Rng::with_seed(3);
        let mut conv = Conv2d::new(1, 1, &mut rng);
        conv.w = vec![1.0; 4];
        conv.b = vec![0.0];
        // One nonzero cell at row 0, col 1; it is covered by the windows at
        // (0,0) and (0,1) only.
        let mut x = vec![0.0; 16];
        x[1] = 2.0;
        let y = conv.forward(&x);
        assert_eq!(y[0], 2.0);
        assert_eq!(y[1], 2.0);
        assert_eq!(y[2], 0.0);
        assert!(y[3..].iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_gradients_match_finite_differences() {
        let mut rng = fastrand::Rng::with_seed(4);
        let mut conv = Conv2d::new(2, 2, &mut rng);
        let x: Vec<f32> = (0..32).map(|i| (i as f32 - 16.0) / 8.0).collect();
        let dy: Vec<f32> = (0..conv.out_dim()).map(|i| ((i % 5) as f32 - 2.0) / 2.0).collect();

        conv.backward(&x, &dy);

        let h = 1e-3;
        let loss = |c: &Conv2d| -> f32 {
            c.forward(&x).iter().zip(&dy).map(|(y, d)| y * d).sum()
        };
        for k in 0..conv.w.len() {
            let mut plus = conv.clone();
            plus.w[k] += h;
            let mut minus = conv.clone();
            minus.w[k] -= h;
            let num = (loss(&plus) - loss(&minus)) / (2.0 * h);
            assert!((conv.gw[k] - num).abs() < 1e-2, "weight {}", k);
        }
    }
}
