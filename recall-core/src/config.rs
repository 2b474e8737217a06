//! Flat training configuration.
use crate::{
    agent::{AgentKind, ReplayKind},
    coordinator::CoordinatorConfig,
    error::RecallError,
    replay_buffer::{NStepProcessorConfig, PerConfig, ReplayBufferConfig, TransitionSchema},
};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of an agent and its training schedule as one flat mapping.
///
/// Keys not listed here, such as network or optimizer settings, are ignored, so the
/// agent and training sections of an experiment file can be merged and loaded as is.
///
/// ```
/// use recall_core::{AgentKind, TrainConfig};
///
/// let config: TrainConfig = serde_yaml::from_str(
///     "
///     name: per
///     buffer_size: 100000
///     batch_size: 64
///     start_train_step: 100000
///     target_update_period: 500
///     update_period: 4
///     num_worker: 16
///     learning_rate: 0.0000625
///     ",
/// )
/// .unwrap();
/// assert_eq!(config.name, AgentKind::Per);
/// assert_eq!(config.alpha, 0.6);
/// ```
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct TrainConfig {
    /// The algorithm.
    pub name: AgentKind,

    /// Capacity of the replay buffer.
    pub buffer_size: usize,

    /// Batch size.
    pub batch_size: usize,

    /// Exponent of prioritization.
    #[serde(default = "default_alpha")]
    pub alpha: f32,

    /// Initial exponent of importance weights.
    #[serde(default = "default_beta")]
    pub beta: f32,

    /// Learner updates after which the exponent of importance weights reaches `1`.
    #[serde(default = "default_n_opts_final")]
    pub n_opts_final: usize,

    /// Probability of a uniform draw in prioritized sampling.
    #[serde(default = "default_uniform_sample_prob")]
    pub uniform_sample_prob: f32,

    /// Global step from which learning is allowed.
    pub start_train_step: usize,

    /// Interval of learning steps in global steps.
    pub update_period: usize,

    /// Interval of target network publication in learner updates.
    pub target_update_period: usize,

    /// Number of workers.
    #[serde(default = "default_num_worker")]
    pub num_worker: usize,

    /// Number of steps of n-step returns.
    #[serde(default)]
    pub n_step: Option<usize>,

    /// Discount factor.
    #[serde(default = "default_gamma")]
    pub gamma: f32,

    /// Random seed.
    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_alpha() -> f32 {
    0.6
}

fn default_beta() -> f32 {
    0.4
}

fn default_n_opts_final() -> usize {
    500_000
}

fn default_uniform_sample_prob() -> f32 {
    1e-3
}

fn default_num_worker() -> usize {
    1
}

fn default_gamma() -> f32 {
    0.99
}

fn default_seed() -> u64 {
    42
}

impl TrainConfig {
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

    /// Checks all values.
    pub fn check(&self) -> Result<(), RecallError> {
        self.coordinator_config()?;
        self.n_step_config()?;
        self.replay_buffer_config(&[1], &[]).map(|_| ())
    }

    /// Configuration of the replay buffer for transitions of the given shapes.
    ///
    /// Prioritized replay is enabled for `per` and `rainbow`; the schema requires
    /// n-step returns for `multistep` and `rainbow`.
    pub fn replay_buffer_config(
        &self,
        state_shape: &[usize],
        action_shape: &[usize],
    ) -> Result<ReplayBufferConfig, RecallError> {
        let per_config = match self.name.replay_kind() {
            ReplayKind::Prioritized => Some(
                PerConfig::default()
                    .alpha(self.alpha)
                    .beta_0(self.beta)
                    .n_opts_final(self.n_opts_final)
                    .uniform_sample_prob(self.uniform_sample_prob),
            ),
            ReplayKind::Uniform | ReplayKind::OnPolicy => None,
        };
        let schema = TransitionSchema::new(state_shape, action_shape)
            .n_step_return(self.name.uses_n_step());
        let config = ReplayBufferConfig::default()
            .capacity(self.buffer_size)
            .batch_size(self.batch_size)
            .seed(self.seed)
            .schema(schema)
            .per_config(per_config);
        config.check()?;
        Ok(config)
    }

    /// Configuration of the coordinator.
    pub fn coordinator_config(&self) -> Result<CoordinatorConfig, RecallError> {
        let config = CoordinatorConfig::default()
            .start_train_step(self.start_train_step)
            .update_period(self.update_period)
            .target_update_period(self.target_update_period)
            .num_worker(self.num_worker);
        config.check()?;
        Ok(config)
    }

    /// Configuration of n-step processing, for agents using n-step returns.
    ///
    /// `n_step` defaults to `1` when not given.
    pub fn n_step_config(&self) -> Result<Option<NStepProcessorConfig>, RecallError> {
        if !self.name.uses_n_step() {
            return Ok(None);
        }
        let n_step = self.n_step.unwrap_or(1);
        if n_step == 0 {
            return Err(RecallError::InvalidConfig(
                "n_step must be positive".to_string(),
            ));
        }
        Ok(Some(
            NStepProcessorConfig::default()
                .n_step(n_step)
                .gamma(self.gamma),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    const RAINBOW: &str = "
name: rainbow
network: rainbow
learning_rate: 0.0000625
gamma: 0.99
buffer_size: 50000
batch_size: 32
start_train_step: 25000
target_update_period: 1000
n_step: 3
alpha: 0.6
beta: 0.4
uniform_sample_prob: 0.001
v_min: -10
v_max: 10
update_period: 8
num_worker: 16
";

    #[test]
    fn test_split_rainbow() -> Result<()> {
        let config: TrainConfig = serde_yaml::from_str(RAINBOW)?;
        let rb = config.replay_buffer_config(&[4, 80, 80], &[])?;
        assert_eq!(rb.capacity, 50000);
        assert!(rb.schema.n_step_return);
        assert_eq!(rb.per_config.as_ref().map(|c| c.alpha), Some(0.6));

        let co = config.coordinator_config()?;
        assert_eq!(co.update_period, 8);
        assert_eq!(co.num_worker, 16);

        let ns = config.n_step_config()?;
        assert_eq!(ns.map(|c| c.n_step), Some(3));
        Ok(())
    }

    #[test]
    fn test_uniform_for_dqn() -> Result<()> {
        let mut config: TrainConfig = serde_yaml::from_str(RAINBOW)?;
        config.name = AgentKind::Dqn;
        let rb = config.replay_buffer_config(&[4], &[])?;
        assert!(rb.per_config.is_none());
        assert!(!rb.schema.n_step_return);
        assert_eq!(config.n_step_config()?, None);
        Ok(())
    }

    #[test]
    fn test_invalid_values() -> Result<()> {
        let mut config: TrainConfig = serde_yaml::from_str(RAINBOW)?;
        config.batch_size = 100_000;
        assert!(matches!(
            config.check(),
            Err(RecallError::CapacityConfig { .. })
        ));

        let mut config: TrainConfig = serde_yaml::from_str(RAINBOW)?;
        config.n_step = Some(0);
        assert!(matches!(config.check(), Err(RecallError::InvalidConfig(_))));

        let mut config: TrainConfig = serde_yaml::from_str(RAINBOW)?;
        config.target_update_period = 0;
        assert!(matches!(config.check(), Err(RecallError::InvalidConfig(_))));
        Ok(())
    }

    #[test]
    fn test_save_load() -> Result<()> {
        let config: TrainConfig = serde_yaml::from_str(RAINBOW)?;
        let dir = TempDir::new("train_config")?;
        let path = dir.path().join("train_config.yaml");
        config.save(&path)?;
        assert_eq!(config, TrainConfig::load(&path)?);
        Ok(())
    }
}
