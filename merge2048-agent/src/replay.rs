//! Prioritized experience replay.
use segment_tree::{ops::Add, SegmentPoint};

/// Priority floor added to TD errors so no transition starves.
const PRIORITY_EPS: f32 = 1e-6;

/// Anneals the importance-sampling exponent from `beta0` to 1 over a fixed
/// number of optimization steps.
#[derive(Clone, Debug)]
pub(crate) struct BetaSchedule {
    beta0: f32,
    n_opts_final: usize,
    n_opts: usize,
}

impl BetaSchedule {
    fn new(beta0: f32) -> Self {
        Self {
            beta0,
            n_opts_final: 1,
            n_opts: 0,
        }
    }

    fn beta(&self) -> f32 {
        if self.n_opts >= self.n_opts_final {
            1.0
        } else {
            self.beta0 + (1.0 - self.beta0) * (self.n_opts as f32 / self.n_opts_final as f32)
        }
    }
}

/// Indices and importance-sampling weights of one sampled batch.
pub struct SampledBatch {
    /// Buffer slots of the sampled transitions.
    pub ixs: Vec<usize>,
    /// Importance weights, normalized so the largest in the batch is 1.
    pub weights: Vec<f32>,
}

/// A ring buffer of transitions sampled proportionally to priority.
///
/// Priorities are stored as `p^alpha` in a sum tree, which gives O(log n)
/// priority updates and prefix-sum queries; sampling draws one stratified
/// value per batch slot and inverts the prefix sum by bisection.
pub struct ReplayBuffer {
    capacity: usize,
    obs_dim: usize,
    obs: Vec<f32>,
    next_obs: Vec<f32>,
    acts: Vec<usize>,
    rewards: Vec<f32>,
    dones: Vec<bool>,
    priorities: SegmentPoint<f32, Add>,
    max_priority: f32,
    alpha: f32,
    beta: BetaSchedule,
    len: usize,
    next_ix: usize,
    rng: fastrand::Rng,
}

impl ReplayBuffer {
    /// An empty buffer for `capacity` transitions of `obs_dim` features.
    pub fn new(capacity: usize, obs_dim: usize, alpha: f32, beta0: f32, seed: u64) -> Self {
        Self {
            capacity,
            obs_dim,
            obs: vec![0.0; capacity * obs_dim],
            next_obs: vec![0.0; capacity * obs_dim],
            acts: vec![0; capacity],
            rewards: vec![0.0; capacity],
            dones: vec![false; capacity],
            priorities: SegmentPoint::build(vec![0.0; capacity], Add),
            max_priority: 1.0,
            alpha,
            beta: BetaSchedule::new(beta0),
            len: 0,
            next_ix: 0,
            rng: fastrand::Rng::with_seed(seed),
        }
    }

    /// Number of stored transitions.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the buffer holds no transitions.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Sets the number of optimization steps over which the weight exponent
    /// anneals to 1.
    pub fn set_beta_horizon(&mut self, n_opts_final: usize) {
        self.beta.n_opts_final = n_opts_final.max(1);
    }

    /// Appends a transition, overwriting the oldest once full. New
    /// transitions enter at the running maximum priority so each is sampled
    /// at least once before its priority is corrected.
    pub fn push(&mut self, obs: &[f32], act: usize, reward: f32, next_obs: &[f32], done: bool) {
        debug_assert_eq!(obs.len(), self.obs_dim);
        debug_assert_eq!(next_obs.len(), self.obs_dim);
        let ix = self.next_ix;
        self.obs[ix * self.obs_dim..(ix + 1) * self.obs_dim].copy_from_slice(obs);
        self.next_obs[ix * self.obs_dim..(ix + 1) * self.obs_dim].copy_from_slice(next_obs);
        self.acts[ix] = act;
        self.rewards[ix] = reward;
        self.dones[ix] = done;
        self.priorities.modify(ix, self.max_priority.powf(self.alpha));

        self.next_ix = (self.next_ix + 1) % self.capacity;
        self.len = (self.len + 1).min(self.capacity);
    }

    /// Draws `batch_size` transitions, stratified over the priority mass.
    pub fn sample(&mut self, batch_size: usize) -> SampledBatch {
        debug_assert!(self.len > 0);
        let total = self.priorities.query(0, self.len);
        let beta = self.beta.beta();
        self.beta.n_opts += 1;

        let mut ixs = Vec::with_capacity(batch_size);
        let mut weights = Vec::with_capacity(batch_size);
        let mut max_weight = 0.0f32;
        for k in 0..batch_size {
            let lo = total * k as f32 / batch_size as f32;
            let hi = total * (k + 1) as f32 / batch_size as f32;
            let u = lo + self.rng.f32() * (hi - lo);
            let ix = self.find(u.min(total * (1.0 - f32::EPSILON)));
            let prob = self.priorities.query(ix, ix + 1) / total;
            let weight = (self.len as f32 * prob).powf(-beta);
            max_weight = max_weight.max(weight);
            ixs.push(ix);
            weights.push(weight);
        }
        for w in weights.iter_mut() {
            *w /= max_weight;
        }
        SampledBatch { ixs, weights }
    }

    /// Re-priorities the sampled transitions from their TD errors.
    pub fn update_priorities(&mut self, ixs: &[usize], td_errors: &[f32]) {
        for (&ix, td) in ixs.iter().zip(td_errors) {
            let priority = td.abs() + PRIORITY_EPS;
            self.priorities.modify(ix, priority.powf(self.alpha));
            self.max_priority = self.max_priority.max(priority);
        }
    }

    /// Observation of the transition in slot `ix`.
    pub fn obs(&self, ix: usize) -> &[f32] {
        &self.obs[ix * self.obs_dim..(ix + 1) * self.obs_dim]
    }

    /// Successor observation of the transition in slot `ix`.
    pub fn next_obs(&self, ix: usize) -> &[f32] {
        &self.next_obs[ix * self.obs_dim..(ix + 1) * self.obs_dim]
    }

    /// Action index of the transition in slot `ix`.
    pub fn act(&self, ix: usize) -> usize {
        self.acts[ix]
    }

    /// Reward of the transition in slot `ix`.
    pub fn reward(&self, ix: usize) -> f32 {
        self.rewards[ix]
    }

    /// Whether the transition in slot `ix` ended its episode.
    pub fn done(&self, ix: usize) -> bool {
        self.dones[ix]
    }

    /// Smallest index whose priority prefix sum exceeds `u`.
    fn find(&self, u: f32) -> usize {
        let (mut lo, mut hi) = (0, self.len - 1);
        while lo < hi {
            let mid = (lo + hi) / 2;
            if self.priorities.query(0, mid + 1) > u {
                hi = mid;
            } else {
                lo = mid + 1;
            }
        }
        lo
    }
}
