//! Configuration of [`ReplayBuffer`](super::ReplayBuffer).
use super::{TransitionSchema, WeightNormalizer};
use crate::error::RecallError;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    default::Default,
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of prioritized experience replay (PER).
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct PerConfig {
    /// Exponent of prioritization. `0` gives uniform sampling.
    pub alpha: f32,

    /// Initial value of the importance sampling exponent $\beta$.
    pub beta_0: f32,

    /// Final value of $\beta$.
    pub beta_final: f32,

    /// Optimization steps after which $\beta$ reaches `beta_final`.
    pub n_opts_final: usize,

    /// Probability that a draw ignores priorities and picks a slot uniformly.
    pub uniform_sample_prob: f32,

    /// How importance weights are normalized.
    pub normalize: WeightNormalizer,
}

impl Default for PerConfig {
    fn default() -> Self {
        Self {
            alpha: 0.6,
            beta_0: 0.4,
            beta_final: 1.0,
            n_opts_final: 500_000,
            uniform_sample_prob: 1e-3,
            normalize: WeightNormalizer::Batch,
        }
    }
}

impl PerConfig {
    /// Sets the prioritization exponent `alpha`.
    pub fn alpha(mut self, alpha: f32) -> Self {
        self.alpha = alpha;
        self
    }

    /// Sets the initial importance sampling exponent `beta_0`.
    pub fn beta_0(mut self, beta_0: f32) -> Self {
        self.beta_0 = beta_0;
        self
    }

    /// Sets the final importance sampling exponent `beta_final`.
    pub fn beta_final(mut self, beta_final: f32) -> Self {
        self.beta_final = beta_final;
        self
    }

    /// Sets the number of optimization steps to reach `beta_final`.
    pub fn n_opts_final(mut self, n_opts_final: usize) -> Self {
        self.n_opts_final = n_opts_final;
        self
    }

    /// Sets the probability of a uniform draw.
    pub fn uniform_sample_prob(mut self, uniform_sample_prob: f32) -> Self {
        self.uniform_sample_prob = uniform_sample_prob;
        self
    }

    /// Sets the method for normalizing importance weights.
    pub fn normalize(mut self, normalize: WeightNormalizer) -> Self {
        self.normalize = normalize;
        self
    }

    pub(crate) fn check(&self) -> Result<(), RecallError> {
        if !(self.alpha >= 0.0 && self.alpha.is_finite()) {
            return Err(RecallError::InvalidConfig(format!(
                "alpha must be finite and non-negative, got {}",
                self.alpha
            )));
        }
        for (name, v) in [
            ("beta_0", self.beta_0),
            ("beta_final", self.beta_final),
            ("uniform_sample_prob", self.uniform_sample_prob),
        ]
        .iter()
        {
            if !(0.0..=1.0).contains(v) {
                return Err(RecallError::InvalidConfig(format!(
                    "{} must be in [0, 1], got {}",
                    name, v
                )));
            }
        }
        Ok(())
    }
}

/// Configuration of [`ReplayBuffer`](super::ReplayBuffer).
///
/// ```
/// use recall_core::replay_buffer::{PerConfig, ReplayBufferConfig, TransitionSchema};
///
/// let config = ReplayBufferConfig::default()
///     .capacity(100_000)
///     .batch_size(64)
///     .schema(TransitionSchema::new(&[4, 80, 80], &[]))
///     .per_config(Some(PerConfig::default().alpha(0.6)));
/// ```
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct ReplayBufferConfig {
    /// Maximum number of transitions held by the buffer.
    pub capacity: usize,

    /// Batch size the learner will request. Checked against `capacity` at construction.
    pub batch_size: usize,

    /// Random seed of the sampler.
    pub seed: u64,

    /// Fields of the stored transitions.
    pub schema: TransitionSchema,

    /// If `None`, transitions are sampled uniformly.
    pub per_config: Option<PerConfig>,
}

impl Default for ReplayBufferConfig {
    fn default() -> Self {
        Self {
            capacity: 10000,
            batch_size: 32,
            seed: 42,
            schema: TransitionSchema::default(),
            per_config: None,
        }
    }
}

impl ReplayBufferConfig {
    /// Sets the capacity of the replay buffer.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sets the batch size.
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Sets the random seed for sampling.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Sets the transition schema.
    pub fn schema(mut self, schema: TransitionSchema) -> Self {
        self.schema = schema;
        self
    }

    /// Sets the configuration of prioritized experience replay.
    pub fn per_config(mut self, per_config: Option<PerConfig>) -> Self {
        self.per_config = per_config;
        self
    }

    /// Checks the values, as done when a buffer is built.
    pub fn check(&self) -> Result<(), RecallError> {
        if self.capacity == 0 || self.batch_size == 0 || self.batch_size > self.capacity {
            return Err(RecallError::CapacityConfig {
                buffer_size: self.capacity,
                batch_size: self.batch_size,
            });
        }
        match &self.per_config {
            Some(per_config) => per_config.check(),
            None => Ok(()),
        }
    }

    /// Loads the configuration from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves the configuration to a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}
