use crate::{AsyncTrainStat, AsyncTrainerConfig, AsyncTrainerError, PushedItemMessage, SyncModel};
use anyhow::Result;
use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{info, warn};
use recall_core::{
    coordinator::{Coordinator, CoordinatorConfig, TargetNetwork},
    replay_buffer::{ReplayBuffer, ReplayBufferConfig, Transition},
    Learner, ReplayBufferBase,
};
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::JoinHandle,
    time::SystemTime,
};

#[cfg_attr(doc, aquamarine::aquamarine)]
/// Manages asynchronous training loop in a single machine.
///
/// It will be used with [`ActorManager`](crate::ActorManager).
///
/// ```mermaid
/// flowchart LR
///     A0[Actor 0] -->|PushedItemMessage| C{{channel}}
///     A1[Actor n] -->|PushedItemMessage| C
///     C --> B[replay buffer thread]
///     B -->|store| R[(ReplayBuffer)]
///     B -->|stored count| L[learner loop]
///     R -->|sample| L
///     L -->|update_priority| R
///     L -->|target snapshot| L
///     L -->|model info| A0
///     L -->|model info| A1
/// ```
///
/// * The replay buffer thread stores each incoming chunk and reports the number of
///   stored transitions to the learner loop. Storing and sampling run concurrently on
///   the shared [`ReplayBuffer`].
/// * The learner loop feeds the counts to the [`Coordinator`], which tells how many
///   optimization steps are due. For each of them, a batch is sampled, the learner is
///   called with the current target snapshot, and TD errors are fed back as priorities.
/// * Every `sync_interval` optimization steps, the learner's model info is published
///   to the actors.
/// * Training stops after `max_opts` optimization steps, or when all actors have
///   stopped.
pub struct AsyncTrainer {
    config: AsyncTrainerConfig,

    coordinator_config: CoordinatorConfig,

    batch_size: usize,

    buffer: Arc<ReplayBuffer>,

    /// Shared with the actors.
    stop: Arc<AtomicBool>,
}

impl AsyncTrainer {
    /// Creates [AsyncTrainer] and the replay buffer.
    pub fn build(
        config: &AsyncTrainerConfig,
        replay_buffer_config: &ReplayBufferConfig,
        coordinator_config: &CoordinatorConfig,
        stop: Arc<AtomicBool>,
    ) -> Result<Self> {
        config.check()?;
        coordinator_config.check()?;
        let buffer = ReplayBuffer::build(replay_buffer_config)?;
        Ok(Self {
            config: config.clone(),
            coordinator_config: coordinator_config.clone(),
            batch_size: replay_buffer_config.batch_size,
            buffer: Arc::new(buffer),
            stop,
        })
    }

    /// The replay buffer.
    pub fn buffer(&self) -> &Arc<ReplayBuffer> {
        &self.buffer
    }

    /// Runs a thread storing pushed items into the replay buffer.
    ///
    /// The thread ends when every sender of the channel has been dropped and returns
    /// the number of stored transitions.
    fn run_replay_buffer_thread(
        &self,
        receiver: Receiver<PushedItemMessage<Transition>>,
        stored: Sender<usize>,
    ) -> JoinHandle<Result<usize>> {
        let buffer = self.buffer.clone();
        let stop = self.stop.clone();

        std::thread::spawn(move || {
            let mut n_samples = 0;
            for msg in receiver.iter() {
                let n = msg.pushed_items.len();
                if let Err(e) = buffer.store(msg.pushed_items) {
                    stop.store(true, Ordering::Release);
                    return Err(e.into());
                }
                n_samples += n;
                // The learner loop may have finished.
                let _ = stored.send(n);
            }
            info!("Stopped thread for replay buffer");
            Ok(n_samples)
        })
    }

    /// Runs training loop.
    ///
    /// `receiver` gets chunks of transitions from the actors and `model` is the cell from
    /// which the actors read the learner's model info. On return, the stop flag is set
    /// and every chunk sent by the actors has been stored.
    pub fn train<L>(
        &mut self,
        learner: &mut L,
        receiver: Receiver<PushedItemMessage<Transition>>,
        model: &TargetNetwork<L::ModelInfo>,
    ) -> Result<AsyncTrainStat>
    where
        L: Learner + SyncModel,
    {
        let (stored_s, stored_r) = unbounded();
        let handle = self.run_replay_buffer_thread(receiver, stored_s);
        let time = SystemTime::now();

        let result = self.learn(learner, stored_r, model);
        self.stop.store(true, Ordering::Release);

        let n_samples = match handle.join() {
            Ok(n_samples) => n_samples?,
            Err(_) => return Err(AsyncTrainerError::ReplayBufferPanicked.into()),
        };
        let (n_opts, n_target_updates) = result?;

        let duration = time.elapsed()?;
        let secs = duration.as_secs_f32();
        let stat = AsyncTrainStat {
            samples_per_sec: n_samples as f32 / secs,
            duration,
            opt_per_sec: n_opts as f32 / secs,
            n_opts,
            n_samples,
            n_target_updates,
        };
        Ok(stat)
    }

    /// Learner loop. Returns the number of optimization steps and target updates.
    fn learn<L>(
        &mut self,
        learner: &mut L,
        stored: Receiver<usize>,
        model: &TargetNetwork<L::ModelInfo>,
    ) -> Result<(usize, usize)>
    where
        L: Learner + SyncModel,
    {
        let mut coordinator = Coordinator::new(&self.coordinator_config, learner.params())?;
        let mut n_opts = 0;
        let mut n_target_updates = 0;
        let mut loss_sum = 0f32;

        while n_opts < self.config.max_opts {
            let n = match stored.recv() {
                Ok(n) => n,
                Err(_) => {
                    warn!("All actors stopped after {} optimization steps", n_opts);
                    break;
                }
            };

            for _ in 0..coordinator.on_transitions(n) {
                let batch = self.buffer.batch(self.batch_size)?;
                let target = coordinator.target_snapshot();
                let out = learner.opt(&batch, &target)?;
                if let (Some(td_errors), Some(_)) = (out.td_errors.as_ref(), batch.weight.as_ref()) {
                    self.buffer.update_priority(&batch.ix_sample, td_errors)?;
                }
                n_opts += 1;
                loss_sum += out.loss;

                if coordinator.record_opt(|| learner.params()).is_some() {
                    n_target_updates += 1;
                }
                if n_opts % self.config.sync_interval == 0 {
                    let (opt_steps, model_info) = learner.model_info();
                    let version = model.publish(model_info, opt_steps);
                    info!("Published model version {} to actors", version);
                }
                if n_opts % self.config.record_interval == 0 {
                    info!(
                        "opt_steps = {}, loss = {}, buffer size = {}",
                        n_opts,
                        loss_sum / self.config.record_interval as f32,
                        self.buffer.size()
                    );
                    loss_sum = 0.0;
                }
                if n_opts == self.config.max_opts {
                    break;
                }
            }
        }

        Ok((n_opts, n_target_updates))
    }
}
