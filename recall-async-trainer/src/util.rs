//! Utility function.
use crate::{
    actor_stats_fmt, ActorManager, ActorManagerConfig, ActorStat, AsyncTrainStat, AsyncTrainer,
    AsyncTrainerConfig, Producer, SyncModel,
};
use anyhow::Result;
use crossbeam_channel::bounded;
use log::info;
use recall_core::{
    coordinator::{CoordinatorConfig, TargetNetwork},
    replay_buffer::ReplayBufferConfig,
    Learner,
};
use std::sync::{atomic::AtomicBool, Arc};

/// Runs asynchronous training.
///
/// This function runs [`ActorManager`] and [`AsyncTrainer`] on threads.
/// These communicate using [`crossbeam_channel`].
///
/// * `learner` - The learner to be trained.
/// * `producers` - One per actor. They must share the structure of the model
///   ([`SyncModel::ModelInfo`]) with the learner, while exploration parameters can be
///   different.
/// * `replay_buffer_config` - Configuration of the replay buffer.
/// * `coordinator_config` - Learning schedule. `num_worker` is usually the number of
///   producers.
/// * `actor_man_config` - Configuration of [`ActorManager`].
/// * `async_trainer_config` - Configuration of [`AsyncTrainer`].
pub fn train_async<L, P>(
    learner: &mut L,
    producers: Vec<P>,
    replay_buffer_config: &ReplayBufferConfig,
    coordinator_config: &CoordinatorConfig,
    actor_man_config: &ActorManagerConfig,
    async_trainer_config: &AsyncTrainerConfig,
) -> Result<(AsyncTrainStat, Vec<ActorStat>)>
where
    L: Learner + SyncModel,
    L::ModelInfo: Send + Sync + 'static,
    P: Producer<ModelInfo = L::ModelInfo> + 'static,
{
    // Shared flag to stop actor threads
    let stop = Arc::new(AtomicBool::new(false));

    // Chunks of transitions pushed to the replay buffer
    let (item_s, item_r) = bounded(actor_man_config.channel_capacity.max(1));

    // Model info read by the actors
    let model = TargetNetwork::new(learner.model_info().1);

    let mut trainer = AsyncTrainer::build(
        async_trainer_config,
        replay_buffer_config,
        coordinator_config,
        stop.clone(),
    )?;
    let mut actors = ActorManager::<P>::build(actor_man_config, stop, model.clone());

    // Starts sampling and training
    actors.run(producers, item_s);
    let stats = trainer.train(learner, item_r, &model);
    let actor_stats = actors.stop_and_join();
    let (stats, actor_stats) = (stats?, actor_stats?);

    info!("Stats of async trainer");
    info!("{}", stats.fmt());
    info!("Stats of generated samples in actors");
    info!("{}", actor_stats_fmt(&actor_stats));

    Ok((stats, actor_stats))
}
