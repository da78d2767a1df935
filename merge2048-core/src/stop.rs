//! Cooperative cancellation of a training run.
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// A single-shot cooperative stop flag shared with [`Agent::learn`].
///
/// The flag is typically raised from a SIGINT handler. The agent's learning
/// loop observes it between environment steps and returns
/// [`HarnessError::Interrupted`], which the trainer converts into a graceful
/// stop. Raising the flag more than once has no further effect.
///
/// [`Agent::learn`]: crate::Agent::learn
/// [`HarnessError::Interrupted`]: crate::error::HarnessError::Interrupted
#[derive(Clone, Debug, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    /// Creates a signal in the not-stopped state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Raises the signal.
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Returns `true` once [`stop`](Self::stop) has been called.
    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
