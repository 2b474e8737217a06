//! Agent kinds and the interface of learners.
use crate::{coordinator::TargetSnapshot, replay_buffer::TransitionBatch};
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Learning algorithms known to the library.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AgentKind {
    /// Deep Q-network.
    Dqn,
    /// Double DQN.
    Double,
    /// DQN with prioritized experience replay.
    Per,
    /// DQN with n-step returns.
    Multistep,
    /// Rainbow, combining prioritized replay and n-step returns among others.
    Rainbow,
    /// Proximal policy optimization.
    Ppo,
    /// Soft actor-critic.
    Sac,
    /// Maximum a posteriori policy optimization.
    Mpo,
}

/// How an agent consumes experience.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReplayKind {
    /// Replay buffer sampled uniformly.
    Uniform,
    /// Replay buffer sampled by priority.
    Prioritized,
    /// Rollouts consumed once, in order.
    OnPolicy,
}

impl AgentKind {
    /// The replay strategy of the algorithm.
    pub fn replay_kind(&self) -> ReplayKind {
        match self {
            Self::Dqn | Self::Double | Self::Multistep | Self::Sac => ReplayKind::Uniform,
            Self::Per | Self::Rainbow => ReplayKind::Prioritized,
            Self::Ppo | Self::Mpo => ReplayKind::OnPolicy,
        }
    }

    /// Returns `true` if stored transitions carry n-step returns.
    pub fn uses_n_step(&self) -> bool {
        matches!(self, Self::Multistep | Self::Rainbow)
    }

    /// Name used in configuration files.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Dqn => "dqn",
            Self::Double => "double",
            Self::Per => "per",
            Self::Multistep => "multistep",
            Self::Rainbow => "rainbow",
            Self::Ppo => "ppo",
            Self::Sac => "sac",
            Self::Mpo => "mpo",
        }
    }
}

/// Result of an optimization step.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OptOutput {
    /// Value of the loss.
    pub loss: f32,

    /// TD errors of the batch items, in batch order.
    ///
    /// Used as new priorities by prioritized replay.
    pub td_errors: Option<Vec<f32>>,
}

/// A learner updating its parameters from batches.
///
/// The loss of each algorithm is computed by the implementor; the library only moves
/// batches, parameters and priorities around.
pub trait Learner {
    /// Parameters of the online network, as a value copy.
    type Params: Clone + Send + Sync + 'static;

    /// The algorithm.
    fn kind(&self) -> AgentKind;

    /// Returns a copy of the current parameters.
    fn params(&self) -> Self::Params;

    /// Performs an optimization step with a batch and the target parameters.
    fn opt(
        &mut self,
        batch: &TransitionBatch,
        target: &TargetSnapshot<Self::Params>,
    ) -> Result<OptOutput>;
}
