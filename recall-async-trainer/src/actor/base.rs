use crate::{ActorStat, PushedItemMessage, ReplayBufferProxy, ReplayBufferProxyConfig, SyncModel};
use anyhow::Result;
use crossbeam_channel::Sender;
use log::{debug, info};
use recall_core::{coordinator::TargetNetwork, replay_buffer::Transition, ExperienceBufferBase};
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::SystemTime,
};

/// Generates transitions by interacting with an environment.
///
/// Exploration and environment handling are up to the implementor. A call to
/// [`Producer::produce`] is one environment step; it may return no transition, e.g.
/// while an n-step window is being filled, or several at the end of an episode.
pub trait Producer: SyncModel + Send {
    /// Performs an environment step.
    fn produce(&mut self) -> Result<Vec<Transition>>;
}

/// Runs a [`Producer`], sending its transitions to the replay buffer.
///
/// Before each environment step, the actor syncs the producer with the model published
/// by the learner if a newer version is available.
pub struct Actor<P: Producer> {
    id: usize,

    /// Stops sampling process if this field is set to `true`.
    stop: Arc<AtomicBool>,

    /// Model published by the learner.
    model: TargetNetwork<P::ModelInfo>,

    replay_buffer_config: ReplayBufferProxyConfig,
}

impl<P> Actor<P>
where
    P: Producer,
    P::ModelInfo: Send + Sync + 'static,
{
    /// Creates an actor.
    pub fn build(
        id: usize,
        replay_buffer_config: ReplayBufferProxyConfig,
        stop: Arc<AtomicBool>,
        model: TargetNetwork<P::ModelInfo>,
    ) -> Self {
        Self {
            id,
            stop,
            model,
            replay_buffer_config,
        }
    }

    fn sync(&self, producer: &mut P, version: &mut Option<usize>) {
        let snapshot = self.model.snapshot();
        if *version != Some(snapshot.version) {
            producer.sync_model(&snapshot.params);
            *version = Some(snapshot.version);
            debug!(
                "Actor {} synced to model version {} ({} opt steps)",
                self.id, snapshot.version, snapshot.opt_steps
            );
        }
    }

    /// Runs sampling loop until the stop flag becomes `true`.
    ///
    /// Transitions still buffered in the proxy are sent before returning.
    pub fn run(
        &self,
        mut producer: P,
        sender: Sender<PushedItemMessage<Transition>>,
    ) -> Result<ActorStat> {
        let buffer =
            ReplayBufferProxy::build_with_sender(self.id, &self.replay_buffer_config, sender);
        let time = SystemTime::now();
        let mut env_steps = 0;
        let mut n_transitions = 0;
        let mut version = None;
        info!("Starts actor {}", self.id);

        while !self.stop.load(Ordering::Acquire) {
            self.sync(&mut producer, &mut version);
            let trs = producer.produce()?;
            env_steps += 1;
            n_transitions += trs.len();
            buffer.push(trs)?;
        }
        buffer.flush()?;

        let stat = ActorStat {
            env_steps,
            n_transitions,
            model_version: version.unwrap_or(0),
            duration: time.elapsed()?,
        };
        info!(
            "Stopped actor {} after {} environment steps",
            self.id, stat.env_steps
        );
        Ok(stat)
    }
}
