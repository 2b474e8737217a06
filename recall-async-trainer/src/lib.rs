//! Asynchronous training with multiple actors feeding a shared replay buffer.
//!
//! * Each [`Actor`] runs a [`Producer`] on its own thread and sends chunks of
//!   transitions ([`PushedItemMessage`]) through a [`ReplayBufferProxy`].
//! * The [`AsyncTrainer`] stores the chunks into the replay buffer on a dedicated
//!   thread, while its learner loop samples batches and runs optimization steps
//!   as scheduled by the [`Coordinator`](recall_core::coordinator::Coordinator).
//! * The learner publishes its model info ([`SyncModel::ModelInfo`]) to the actors
//!   every `sync_interval` optimization steps.
//!
//! [`train_async`] wires these together.
mod actor;
mod actor_manager;
mod async_trainer;
mod error;
mod messages;
mod replay_buffer_proxy;
mod sync_model;
mod util;
pub use actor::{actor_stats_fmt, Actor, ActorStat, Producer};
pub use actor_manager::{ActorManager, ActorManagerConfig};
pub use async_trainer::{AsyncTrainStat, AsyncTrainer, AsyncTrainerConfig};
pub use error::AsyncTrainerError;
pub use messages::PushedItemMessage;
pub use replay_buffer_proxy::{ReplayBufferProxy, ReplayBufferProxyConfig};
pub use sync_model::SyncModel;
pub use util::train_async;
