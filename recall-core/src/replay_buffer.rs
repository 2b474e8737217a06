//! Replay buffer with uniform and prioritized sampling.
mod base;
mod batch;
mod config;
mod iw_scheduler;
mod sampler;
mod step_proc;
mod sum_tree;
mod transition;
pub use base::ReplayBuffer;
pub use batch::TransitionBatch;
pub use config::{PerConfig, ReplayBufferConfig};
pub use iw_scheduler::IwScheduler;
pub use sampler::{PrioritizedSampler, Sampler, UniformSampler};
pub use step_proc::{NStepProcessor, NStepProcessorConfig};
pub use sum_tree::{SumTree, WeightNormalizer};
pub use transition::{Transition, TransitionSchema};
