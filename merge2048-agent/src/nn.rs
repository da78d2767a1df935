//! Pure-Rust Q-network trained by stochastic gradient descent.
//!
//! The network runs one sample at a time; an optimization step accumulates
//! gradients over a batch and applies the averaged update at the end.
mod conv;
mod linear;
mod qnet;

pub(crate) use conv::Conv2d;
pub(crate) use linear::{LayerNorm, Linear};
pub use qnet::QNetwork;

pub(crate) fn relu_inplace(x: &mut [f32]) {
    for v in x.iter_mut() {
        if *v < 0.0 {
            *v = 0.0;
        }
    }
}

/// Masks `d` by the ReLU that produced `out`.
pub(crate) fn relu_backward_inplace(d: &mut [f32], out: &[f32]) {
    for (dv, o) in d.iter_mut().zip(out) {
        if *o <= 0.0 {
            *dv = 0.0;
        }
    }
}
