#![warn(missing_docs)]
//! Experience storage and actor/learner coordination for reinforcement learning.
//!
//! * [`replay_buffer::ReplayBuffer`] stores [`replay_buffer::Transition`]s in a ring
//!   buffer shared by any number of producers and sampled by a learner, uniformly or by
//!   priority.
//! * [`coordinator::Coordinator`] decides when the learner may draw a batch and
//!   publishes target network snapshots.
//! * [`Learner`] is the interface of the algorithms consuming batches.
pub mod agent;
pub mod checkpoint;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod replay_buffer;
pub mod stats;

mod base;
pub use agent::{AgentKind, Learner, OptOutput, ReplayKind};
pub use base::{ExperienceBufferBase, ReplayBufferBase};
pub use config::TrainConfig;
