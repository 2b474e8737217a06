use crate::{
    Actor, ActorManagerConfig, ActorStat, AsyncTrainerError, Producer, PushedItemMessage,
    ReplayBufferProxyConfig,
};
use anyhow::Result;
use crossbeam_channel::Sender;
use log::info;
use recall_core::{coordinator::TargetNetwork, replay_buffer::Transition};
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::JoinHandle,
};

/// Manages [`Actor`]s.
///
/// Each actor runs on its own thread with its own [`Producer`]. Actors share
/// * the stop flag, set by the [`AsyncTrainer`] when training is over,
/// * the cell holding the model published by the [`AsyncTrainer`],
/// * the sender of the channel to the replay buffer thread.
///
/// [`AsyncTrainer`]: crate::AsyncTrainer
pub struct ActorManager<P: Producer> {
    /// Number of samples to be buffered in each actor before being pushed to the replay buffer.
    ///
    /// This parameter is used as `n_buffer` in [`ReplayBufferProxyConfig`].
    n_buffer: usize,

    /// Thread handles.
    threads: Vec<JoinHandle<Result<ActorStat>>>,

    /// Flag to stop training
    stop: Arc<AtomicBool>,

    /// Model published by the learner.
    model: TargetNetwork<P::ModelInfo>,
}

impl<P> ActorManager<P>
where
    P: Producer + 'static,
    P::ModelInfo: Send + Sync + 'static,
{
    /// Builds a [`ActorManager`].
    pub fn build(
        config: &ActorManagerConfig,
        stop: Arc<AtomicBool>,
        model: TargetNetwork<P::ModelInfo>,
    ) -> Self {
        Self {
            n_buffer: config.n_buffer,
            threads: vec![],
            stop,
            model,
        }
    }

    /// Runs a thread for each producer.
    ///
    /// `sender` is dropped once every actor has a clone, so that the channel closes when
    /// the last actor stops.
    pub fn run(&mut self, producers: Vec<P>, sender: Sender<PushedItemMessage<Transition>>) {
        for (id, producer) in producers.into_iter().enumerate() {
            let actor = Actor::<P>::build(
                id,
                ReplayBufferProxyConfig {
                    n_buffer: self.n_buffer,
                },
                self.stop.clone(),
                self.model.clone(),
            );
            let sender = sender.clone();
            let stop = self.stop.clone();
            let handle = std::thread::spawn(move || {
                let stat = actor.run(producer, sender);
                if stat.is_err() {
                    // Lets the trainer and the other actors finish.
                    stop.store(true, Ordering::Release);
                }
                stat
            });
            self.threads.push(handle);
        }
        info!("Started {} actors", self.threads.len());
    }

    /// Number of actor threads.
    pub fn n_actors(&self) -> usize {
        self.threads.len()
    }

    /// Stops actor threads.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    /// Waits until all actors finish.
    ///
    /// Returns the first error of the actors, if any.
    pub fn join(self) -> Result<Vec<ActorStat>> {
        let mut stats = vec![];
        let mut first_err = None;
        for (id, h) in self.threads.into_iter().enumerate() {
            match h.join() {
                Ok(Ok(stat)) => stats.push(stat),
                Ok(Err(e)) => {
                    if first_err.is_none() {
                        first_err = Some(e);
                    }
                }
                Err(_) => {
                    if first_err.is_none() {
                        first_err = Some(AsyncTrainerError::ActorPanicked(id).into());
                    }
                }
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(stats),
        }
    }

    /// Stops and joins actors.
    pub fn stop_and_join(self) -> Result<Vec<ActorStat>> {
        self.stop();
        self.join()
    }
}
